//! `resolve_ns_proxy` lookup plugin.
//!
//! Maps a URL to the proxy devices fronting it: per term, an object keyed by
//! device hostname with the lb/cs vserver names that device hosts for the
//! URL's resolved addresses. Unlike `ip_to_adc` the device names are reported
//! unqualified, exactly as the manager inventory carries them.
//!
//! # Usage
//!
//! ```text
//! opslookup run resolve_ns_proxy https://shop.example.com/ \
//!     -O adm_hostname=adm.example.net -O username=svc -O password=...
//! ```
//!
//! # Options
//!
//! - `adm_hostname` (string): hostname of the manager appliance
//! - `username` / `password` (string): manager credentials; fall back to the
//!   `ADM_USERNAME` / `ADM_PASSWORD` environment variables
//! - `validate_certs` (bool): validate TLS certificates (default: false)

use serde_json::Value;
use tracing::info;

use super::ip_to_adc::DeviceVservers;
use super::{Lookup, LookupContext, LookupResult, Options};
use crate::dns;
use crate::netscaler::{resolve, AdmSettings};

/// Maps a URL to the proxy devices fronting it
#[derive(Debug, Clone, Default)]
pub struct NsProxyLookup;

impl NsProxyLookup {
    /// Create a new NsProxyLookup instance
    pub fn new() -> Self {
        Self
    }
}

impl Lookup for NsProxyLookup {
    fn name(&self) -> &'static str {
        "resolve_ns_proxy"
    }

    fn description(&self) -> &'static str {
        "Maps a URL to the proxy devices and vservers fronting it"
    }

    fn run(
        &self,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let adm = AdmSettings::from_options(options, ctx)?;
        let api = adm.client(ctx)?;

        let mut ret = Vec::new();
        for term in terms {
            info!("resolve_ns_proxy lookup term: {term}");
            let protocol = resolve::protocol_for_url(term)?;
            let hostname = resolve::url_hostname(term);

            let mut devices = DeviceVservers::default();
            for ip in dns::resolve_system_first(&hostname).address_strings() {
                let lb_vservers =
                    resolve::lb_vservers_for_ip(&api, &adm.hostname, &ip, protocol)?;
                let cs_vservers =
                    resolve::cs_vservers_for_ip(&api, &adm.hostname, &ip, protocol)?;
                if lb_vservers.is_empty() && cs_vservers.is_empty() {
                    info!("no lb or cs vservers found on the manager for {ip}");
                }
                for vserver in &lb_vservers {
                    devices.add_lb(
                        resolve::str_field(vserver, "hostname").to_string(),
                        resolve::str_field(vserver, "name").to_string(),
                    );
                }
                for vserver in &cs_vservers {
                    devices.add_cs(
                        resolve::str_field(vserver, "hostname").to_string(),
                        resolve::str_field(vserver, "name").to_string(),
                    );
                }
            }
            ret.push(devices.into_map());
        }
        Ok(ret)
    }
}
