//! `netscaler_adc_servers_from_vservers` lookup plugin.
//!
//! Resolves the backend servers behind named virtual servers on a specific
//! device, skipping the manager inventory step: terms are vserver names as
//! they appear on the device.
//!
//! # Usage
//!
//! ```text
//! opslookup run netscaler_adc_servers_from_vservers shop_cs \
//!     -O adc_hostname=adc1.example.net -O vserver_type=cs \
//!     -O url=https://shop.example.com/ -O username=svc -O password=...
//! ```
//!
//! # Options
//!
//! - `adc_hostname` (string, required): hostname of the device
//! - `vserver_type` (string, required): `lb` or `cs`
//! - `url` (string, required): candidate URL used to evaluate
//!   content-switching policies
//! - `username` / `password` (string): device credentials; fall back to the
//!   `ADM_USERNAME` / `ADM_PASSWORD` environment variables
//! - `validate_certs` (bool): validate TLS certificates (default: false)

use serde_json::Value;
use tracing::info;

use super::{Lookup, LookupContext, LookupError, LookupResult, Options};
use crate::netscaler::nitro::HttpNitroClient;
use crate::netscaler::resolve;

/// Resolves the backend servers behind named vservers on a device
#[derive(Debug, Clone, Default)]
pub struct AdcServersFromVserversLookup;

impl AdcServersFromVserversLookup {
    /// Create a new AdcServersFromVserversLookup instance
    pub fn new() -> Self {
        Self
    }
}

impl Lookup for AdcServersFromVserversLookup {
    fn name(&self) -> &'static str {
        "netscaler_adc_servers_from_vservers"
    }

    fn description(&self) -> &'static str {
        "Resolves which backend servers are behind a named vserver"
    }

    fn run(
        &self,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let adc_hostname = options
            .get("adc_hostname")
            .ok_or_else(|| LookupError::MissingArgument("adc_hostname".to_string()))?
            .to_string();
        let url = options
            .get("url")
            .ok_or_else(|| LookupError::MissingArgument("url".to_string()))?
            .to_string();
        let vserver_type = options
            .get("vserver_type")
            .ok_or_else(|| LookupError::MissingArgument("vserver_type".to_string()))?;
        if vserver_type != "lb" && vserver_type != "cs" {
            return Err(LookupError::InvalidArguments(format!(
                "vserver_type should be 'lb' or 'cs', not '{vserver_type}'"
            )));
        }
        // the URL is only evaluated against policies, but a malformed one
        // would silently match nothing
        resolve::protocol_for_url(&url)?;

        let username = options.require_with_env("username", "ADM_USERNAME")?;
        let password = options.require_with_env("password", "ADM_PASSWORD")?;
        let validate_certs = options.get_bool("validate_certs", ctx.config.adm.validate_certs)?;
        let api = HttpNitroClient::new(&username, &password, validate_certs, ctx.timeout_secs)?;

        let mut ret = Vec::new();
        for term in terms {
            info!("looking up servers for vserver: {term}");
            let target = resolve::resolve_target_lbvserver(
                &api,
                &adc_hostname,
                term,
                vserver_type,
                &url,
            )?;
            let servers = resolve::backends_for_lbvserver(&api, &adc_hostname, &target)?;
            ret.push(Value::Array(servers));
        }
        Ok(ret)
    }
}
