//! `sccm_host` lookup plugin.
//!
//! Fetches host information from an SCCM AdminService endpoint. Two OData
//! queries are merged per term: the device record and the WMI system record.
//!
//! # Usage
//!
//! ```text
//! opslookup run sccm_host web01 \
//!     -O server=sccm.example.net -O username=svc -O password=...
//! ```
//!
//! # Options
//!
//! - `server` (string): SCCM server address
//! - `fields` (string): comma-separated fields to project with `$select`
//! - `username` / `password` (string): credentials; fall back to the
//!   `SCCM_USERNAME` / `SCCM_PASSWORD` environment variables
//! - `validate_certs` (bool): validate TLS certificates (default: false)

use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use super::{Lookup, LookupContext, LookupError, LookupResult, Options};

/// Fetches host information from an SCCM AdminService endpoint
#[derive(Debug, Clone, Default)]
pub struct SccmHostLookup;

/// Fields from the option string, or the configured default
fn fields_list(options: &Options, default: &[String]) -> Vec<String> {
    match options.get("fields") {
        Some(value) => value
            .split(',')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect(),
        None => default.to_vec(),
    }
}

impl SccmHostLookup {
    /// Create a new SccmHostLookup instance
    pub fn new() -> Self {
        Self
    }

    /// Query one AdminService collection and return the first matching
    /// object, or an empty object
    fn api_call(
        &self,
        client: &reqwest::blocking::Client,
        username: &str,
        password: &str,
        endpoint: &str,
        filter: &str,
        fields: &[String],
    ) -> LookupResult<Value> {
        let mut url = url::Url::parse(endpoint)
            .map_err(|e| LookupError::InvalidArguments(format!("invalid endpoint: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            if !fields.is_empty() {
                pairs.append_pair("$select", &fields.join(","));
            }
            pairs.append_pair("$filter", filter);
        }
        debug!("fetching host info from {url}");

        let response = client
            .get(url.clone())
            .basic_auth(username, Some(password))
            .send()
            .map_err(|e| LookupError::Http(format!("request to {url} failed: {e}")))?;
        let status = response.status();
        debug!("response status code {status}");
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LookupError::Http(format!(
                "http error {}: {}",
                status.as_u16(),
                body
            )));
        }

        let results: Value = response
            .json()
            .map_err(|e| LookupError::Http(format!("failed to decode response: {e}")))?;
        let values = results
            .get("value")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        debug!("{} host(s) found", values.len());
        Ok(values.into_iter().next().unwrap_or(Value::Object(Map::new())))
    }
}

impl Lookup for SccmHostLookup {
    fn name(&self) -> &'static str {
        "sccm_host"
    }

    fn description(&self) -> &'static str {
        "Fetches host information from an SCCM server"
    }

    fn run(
        &self,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let server = options
            .get("server")
            .map(str::to_string)
            .or_else(|| ctx.config.sccm.server.clone())
            .ok_or_else(|| LookupError::MissingArgument("server".to_string()))?;
        let fields = fields_list(options, &ctx.config.sccm.fields);
        let username = options.require_with_env("username", "SCCM_USERNAME")?;
        let password = options.require_with_env("password", "SCCM_PASSWORD")?;
        let validate_certs = options.get_bool("validate_certs", false)?;

        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(!validate_certs)
            .timeout(Duration::from_secs(ctx.timeout_secs))
            .build()
            .map_err(|e| LookupError::Http(format!("failed to create HTTP client: {e}")))?;

        let mut ret = Vec::new();
        for term in terms {
            let device = self.api_call(
                &client,
                &username,
                &password,
                &format!("https://{server}/AdminService/v1/Device"),
                &format!("Name eq '{term}'"),
                &fields,
            )?;
            let system = self.api_call(
                &client,
                &username,
                &password,
                &format!("https://{server}/AdminService/wmi/SMS_R_System"),
                &format!("name eq '{term}'"),
                &fields,
            )?;

            // the WMI record wins on overlapping fields
            let mut merged = device.as_object().cloned().unwrap_or_default();
            if let Some(system) = system.as_object() {
                for (key, value) in system {
                    merged.insert(key.clone(), value.clone());
                }
            }
            ret.push(Value::Object(merged));
        }
        Ok(ret)
    }
}
