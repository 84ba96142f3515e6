//! `ping` lookup plugin.
//!
//! Probes hosts with the system `ping` utility and reports the average
//! round-trip time. Per term the result is:
//!
//! - the average RTT as a number in the chosen unit when the host answers
//! - `null` when the host is unreachable
//! - `false` when the name does not resolve or the output cannot be parsed
//!
//! # Usage
//!
//! ```text
//! opslookup run ping example.com -O timeout=2 -O unit=ms
//! ```
//!
//! # Options
//!
//! - `timeout` (int): per-packet timeout in seconds (default: 4)
//! - `ttl` (int): time-to-live, 1-255; out-of-range values revert to 64
//! - `size` (int): payload size in bytes, 1-65500; out-of-range values
//!   revert to 56
//! - `unit` (string): `s` or `ms` (default: `s`; invalid values revert)

use regex::Regex;
use serde_json::{Number, Value};
use std::process::Command;
use tracing::debug;

use super::{Lookup, LookupContext, LookupError, LookupResult, Options};

/// Probes hosts with the system ping utility
#[derive(Debug, Clone, Default)]
pub struct PingLookup;

impl PingLookup {
    /// Create a new PingLookup instance
    pub fn new() -> Self {
        Self
    }
}

/// Average round-trip time in milliseconds from ping output, e.g.
/// `rtt min/avg/max/mdev = 0.035/0.042/0.052/0.007 ms`
pub(crate) fn parse_average_rtt(output: &str) -> Option<f64> {
    let re = Regex::new(r"(?m)^(?:rtt|round-trip) [^=]*= *[0-9.]+/([0-9.]+)/").ok()?;
    re.captures(output)?.get(1)?.as_str().parse().ok()
}

fn clamped(value: i64, min: i64, max: i64, default: i64, what: &str) -> i64 {
    if value < min || value > max {
        debug!("{what} is outside the allowed range, using the default of {default}");
        default
    } else {
        value
    }
}

impl Lookup for PingLookup {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn description(&self) -> &'static str {
        "Pings a host and returns the average round-trip time"
    }

    fn run(
        &self,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let defaults = &ctx.config.ping;
        let timeout = options.get_i64("timeout", defaults.timeout)?;
        let ttl = clamped(options.get_i64("ttl", defaults.ttl)?, 1, 255, 64, "TTL");
        let size = clamped(options.get_i64("size", defaults.size)?, 1, 65500, 56, "size");
        let unit = match options.get_or("unit", &defaults.unit).to_lowercase() {
            u if u == "s" || u == "ms" => u,
            other => {
                debug!("unit can only be 's' or 'ms', not '{other}'; using 's'");
                "s".to_string()
            }
        };

        let mut ret = Vec::new();
        for term in terms {
            debug!("pinging: {term}");
            if term.is_empty() || term.starts_with('-') {
                return Err(LookupError::InvalidArguments(format!(
                    "invalid ping target: '{term}'"
                )));
            }

            let output = Command::new("ping")
                .args(["-c", "4"])
                .args(["-W", &timeout.to_string()])
                .args(["-t", &ttl.to_string()])
                .args(["-s", &size.to_string()])
                .arg(term)
                .output()
                .map_err(|e| {
                    LookupError::CommandFailed(format!("failed to execute ping: {e}"))
                })?;

            let stdout = String::from_utf8_lossy(&output.stdout);
            let result = if output.status.success() {
                match parse_average_rtt(&stdout) {
                    Some(avg_ms) => {
                        let value = if unit == "s" { avg_ms / 1000.0 } else { avg_ms };
                        Number::from_f64(value).map(Value::Number).unwrap_or_else(|| {
                            debug!("cannot represent ping result: {value}");
                            Value::Bool(false)
                        })
                    }
                    None => {
                        debug!("cannot parse output: {stdout}");
                        Value::Bool(false)
                    }
                }
            } else if output.status.code() == Some(1) {
                debug!("{term} unreachable");
                Value::Null
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if stderr.contains("Name or service not known")
                    || stdout.contains("Name or service not known")
                {
                    debug!("{term} - name or service not known");
                } else {
                    debug!("ping failed: {stderr}");
                }
                Value::Bool(false)
            };
            ret.push(result);
        }
        Ok(ret)
    }
}
