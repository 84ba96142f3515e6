//! `date_tz` lookup plugin.
//!
//! Converts date strings between timezones.
//!
//! # Usage
//!
//! ```text
//! opslookup run date_tz "08-25-2023 05:57:37" \
//!     -O in_tz=America/New_York -O out_tz=UTC
//! ```
//!
//! # Options
//!
//! - `format` (string): input date format (default: `%m-%d-%Y %H:%M:%S`)
//! - `out_format` (string): output format; `format` is used when not set
//! - `in_tz` (string, required): IANA timezone of the input
//! - `out_tz` (string, required): IANA timezone of the output

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use serde_json::Value;
use tracing::debug;

use super::{Lookup, LookupContext, LookupError, LookupResult, Options};

/// Converts date strings between timezones
#[derive(Debug, Clone, Default)]
pub struct DateTzLookup;

impl DateTzLookup {
    /// Create a new DateTzLookup instance
    pub fn new() -> Self {
        Self
    }
}

fn parse_tz(options: &Options, key: &str) -> LookupResult<Tz> {
    let name = options
        .get(key)
        .ok_or_else(|| LookupError::MissingArgument(key.to_string()))?;
    name.parse()
        .map_err(|_| LookupError::InvalidArguments(format!("unknown timezone '{name}'")))
}

impl Lookup for DateTzLookup {
    fn name(&self) -> &'static str {
        "date_tz"
    }

    fn description(&self) -> &'static str {
        "Converts a date string from one timezone to another"
    }

    fn run(
        &self,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let format = options.get_or("format", &ctx.config.date.format);
        let out_format = match options.get("out_format") {
            Some(f) if !f.is_empty() => f.to_string(),
            _ => format.clone(),
        };
        let in_tz = parse_tz(options, "in_tz")?;
        let out_tz = parse_tz(options, "out_tz")?;

        let mut ret = Vec::new();
        for term in terms {
            debug!("date_tz lookup term: {term}");
            let naive = NaiveDateTime::parse_from_str(term, &format).map_err(|_| {
                LookupError::ParseError(format!(
                    "input date string '{term}' does not match date format '{format}'"
                ))
            })?;
            let localized = naive.and_local_timezone(in_tz).single().ok_or_else(|| {
                LookupError::InvalidArguments(format!(
                    "'{term}' is ambiguous or nonexistent in timezone {in_tz}"
                ))
            })?;
            let converted = localized.with_timezone(&out_tz);
            ret.push(Value::String(converted.format(&out_format).to_string()));
        }
        Ok(ret)
    }
}
