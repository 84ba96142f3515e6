//! `timedelta` lookup plugin.
//!
//! Adds or subtracts a time delta from date strings.
//!
//! # Usage
//!
//! ```text
//! opslookup run timedelta "08-25-2023 05:57:37" \
//!     -O delta='+16 days' -O format='%m-%d-%Y %H:%M:%S'
//! ```
//!
//! # Options
//!
//! - `delta` (string, required): sign, amount and unit, e.g. `+16 days` or
//!   `-30 minutes`; units are days, seconds, microseconds, milliseconds,
//!   minutes, hours, weeks
//! - `format` (string): input date format (default: `%Y-%m-%dT%H:%M:%S%.f%z`)
//! - `out_format` (string): output format; `format` is used when not set

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

use super::{Lookup, LookupContext, LookupError, LookupResult, Options};

/// Adds or subtracts a time delta from date strings
#[derive(Debug, Clone, Default)]
pub struct TimedeltaLookup;

impl TimedeltaLookup {
    /// Create a new TimedeltaLookup instance
    pub fn new() -> Self {
        Self
    }
}

/// Parse a delta string such as `+16 days` into a signed duration
pub(crate) fn parse_delta(delta: &str) -> LookupResult<Duration> {
    let sign = delta.chars().next().ok_or_else(|| {
        LookupError::InvalidArguments("delta cannot be empty".to_string())
    })?;
    if sign != '+' && sign != '-' {
        return Err(LookupError::InvalidArguments(format!(
            "the amount should be prepended with sign '+' or '-', not '{sign}'"
        )));
    }

    let mut parts = delta[1..].split(' ');
    let amount_str = parts.next().unwrap_or("");
    let amount: i64 = amount_str.parse().map_err(|_| {
        LookupError::InvalidArguments(format!(
            "the amount should be an integer, '{amount_str}' cannot be converted"
        ))
    })?;
    let unit = parts.next().ok_or_else(|| {
        LookupError::InvalidArguments(format!("unit not found in delta '{delta}'"))
    })?;

    let span = match unit {
        "days" => Duration::try_days(amount),
        "seconds" => Duration::try_seconds(amount),
        "microseconds" => Some(Duration::microseconds(amount)),
        "milliseconds" => Duration::try_milliseconds(amount),
        "minutes" => Duration::try_minutes(amount),
        "hours" => Duration::try_hours(amount),
        "weeks" => Duration::try_weeks(amount),
        _ => {
            return Err(LookupError::InvalidArguments(format!(
                "the unit should be one of 'days', 'seconds', 'microseconds', \
                 'milliseconds', 'minutes', 'hours' or 'weeks', not '{unit}'"
            )))
        }
    };
    let span = span.ok_or_else(|| {
        LookupError::InvalidArguments(format!("delta '{delta}' is out of range"))
    })?;

    Ok(if sign == '-' { -span } else { span })
}

/// A parsed date string: offset-aware when the format carries one
enum Stamp {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl Stamp {
    fn parse(term: &str, format: &str) -> LookupResult<Self> {
        if let Ok(aware) = DateTime::parse_from_str(term, format) {
            return Ok(Stamp::Aware(aware));
        }
        NaiveDateTime::parse_from_str(term, format)
            .map(Stamp::Naive)
            .map_err(|_| {
                LookupError::ParseError(format!(
                    "input date string '{term}' does not match date format '{format}'"
                ))
            })
    }

    fn shift(self, span: Duration) -> Self {
        match self {
            Stamp::Aware(dt) => Stamp::Aware(dt + span),
            Stamp::Naive(dt) => Stamp::Naive(dt + span),
        }
    }

    fn format(&self, format: &str) -> String {
        match self {
            Stamp::Aware(dt) => dt.format(format).to_string(),
            Stamp::Naive(dt) => dt.format(format).to_string(),
        }
    }
}

impl Lookup for TimedeltaLookup {
    fn name(&self) -> &'static str {
        "timedelta"
    }

    fn description(&self) -> &'static str {
        "Adds or subtracts a time delta from a date string"
    }

    fn run(
        &self,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let format = options.get_or("format", &ctx.config.date.timedelta_format);
        let out_format = match options.get("out_format") {
            Some(f) if !f.is_empty() => f.to_string(),
            _ => format.clone(),
        };
        let delta = options
            .get("delta")
            .ok_or_else(|| LookupError::MissingArgument("delta".to_string()))?;
        let span = parse_delta(delta)?;

        let mut ret = Vec::new();
        for term in terms {
            debug!("timedelta lookup term: {term}");
            let shifted = Stamp::parse(term, &format)?.shift(span);
            ret.push(Value::String(shifted.format(&out_format)));
        }
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run_one(term: &str, pairs: &[(&str, &str)]) -> LookupResult<String> {
        let lookup = TimedeltaLookup::new();
        let ctx = LookupContext::default();
        let mut options = Options::new();
        for (key, value) in pairs {
            options.set(*key, *value);
        }
        let results = lookup.run(&[term.to_string()], &options, &ctx)?;
        Ok(results[0].as_str().unwrap().to_string())
    }

    #[test]
    fn test_add_days() {
        let result = run_one(
            "08-25-2023 05:57:37",
            &[("delta", "+16 days"), ("format", "%m-%d-%Y %H:%M:%S")],
        )
        .unwrap();
        assert_eq!(result, "09-10-2023 05:57:37");
    }

    #[test]
    fn test_subtract_minutes() {
        let result = run_one(
            "08-25-2023 00:10:00",
            &[("delta", "-30 minutes"), ("format", "%m-%d-%Y %H:%M:%S")],
        )
        .unwrap();
        assert_eq!(result, "08-24-2023 23:40:00");
    }

    #[test]
    fn test_default_format_with_offset() {
        let result = run_one("2023-08-25T05:57:37.000000+0200", &[("delta", "+1 hours")]).unwrap();
        assert_eq!(result, "2023-08-25T06:57:37+0200");
    }

    #[test]
    fn test_out_format() {
        let result = run_one(
            "08-25-2023 05:57:37",
            &[
                ("delta", "+1 weeks"),
                ("format", "%m-%d-%Y %H:%M:%S"),
                ("out_format", "%Y-%m-%d"),
            ],
        )
        .unwrap();
        assert_eq!(result, "2023-09-01");
    }

    #[test]
    fn test_delta_validation() {
        assert!(matches!(
            parse_delta("16 days"),
            Err(LookupError::InvalidArguments(_))
        ));
        assert!(matches!(
            parse_delta("+x days"),
            Err(LookupError::InvalidArguments(_))
        ));
        assert!(matches!(
            parse_delta("+16"),
            Err(LookupError::InvalidArguments(_))
        ));
        assert!(matches!(
            parse_delta("+16 fortnights"),
            Err(LookupError::InvalidArguments(_))
        ));
        assert!(matches!(
            parse_delta(""),
            Err(LookupError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_missing_delta_option() {
        let result = run_one("08-25-2023 05:57:37", &[("format", "%m-%d-%Y %H:%M:%S")]);
        assert!(matches!(result, Err(LookupError::MissingArgument(_))));
    }

    #[test]
    fn test_format_mismatch() {
        let result = run_one("not a date", &[("delta", "+1 days")]);
        assert!(matches!(result, Err(LookupError::ParseError(_))));
    }
}
