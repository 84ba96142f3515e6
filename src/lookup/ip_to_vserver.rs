//! `ip_to_vserver` lookup plugin.
//!
//! Finds the virtual server configured for an IP address: per term, a list
//! with the first matching vserver record (content-switch entries preferred
//! over plain load balancers), or an empty list.
//!
//! # Usage
//!
//! ```text
//! opslookup run ip_to_vserver 203.0.113.10 \
//!     -O adm_hostname=adm.example.net -O username=svc -O password=...
//! ```
//!
//! # Options
//!
//! - `adm_hostname` (string): hostname of the manager appliance
//! - `protocol` (string): vserver protocol filter (default: SSL)
//! - `username` / `password` (string): manager credentials; fall back to the
//!   `ADM_USERNAME` / `ADM_PASSWORD` environment variables
//! - `validate_certs` (bool): validate TLS certificates (default: false)

use serde_json::Value;
use std::net::IpAddr;
use tracing::info;

use super::{Lookup, LookupContext, LookupError, LookupResult, Options};
use crate::netscaler::{resolve, AdmSettings};

/// Finds the virtual server configured for an IP address
#[derive(Debug, Clone, Default)]
pub struct IpToVserverLookup;

impl IpToVserverLookup {
    /// Create a new IpToVserverLookup instance
    pub fn new() -> Self {
        Self
    }
}

impl Lookup for IpToVserverLookup {
    fn name(&self) -> &'static str {
        "ip_to_vserver"
    }

    fn description(&self) -> &'static str {
        "Finds the virtual server configured for an IP address"
    }

    fn run(
        &self,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let adm = AdmSettings::from_options(options, ctx)?;
        let protocol = options.get_or("protocol", &ctx.config.adm.protocol);
        let api = adm.client(ctx)?;
        let domain = adm.domain();

        let mut ret = Vec::new();
        for term in terms {
            info!("ip_to_vserver lookup term: {term}");
            let ip: IpAddr = term.parse().map_err(|_| {
                LookupError::InvalidArguments(format!("invalid IP address: '{term}'"))
            })?;
            let record = resolve::first_vserver_for_ip(
                &api,
                &adm.hostname,
                &domain,
                &ip.to_string(),
                &protocol,
            )?;
            ret.push(Value::Array(record.into_iter().collect()));
        }
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_ip_is_an_error() {
        let lookup = IpToVserverLookup::new();
        let mut options = Options::new();
        options.set("adm_hostname", "adm.example.net");
        options.set("username", "svc");
        options.set("password", "secret");
        let ctx = LookupContext::default();

        let result = lookup.run(&["203.0.113.300".to_string()], &options, &ctx);
        assert!(matches!(result, Err(LookupError::InvalidArguments(_))));
    }
}
