//! `url_to_backend` lookup plugin.
//!
//! Resolves which backend servers are behind a URL: DNS-resolve the host,
//! find the matching virtual servers in the load-balancer manager inventory,
//! evaluate content-switching policies against the URL, then walk the
//! service and service-group bindings down to the server objects.
//!
//! # Usage
//!
//! ```text
//! opslookup run url_to_backend https://shop.example.com/ \
//!     -O adm_hostname=adm.example.net -O username=svc -O password=...
//! ```
//!
//! # Options
//!
//! - `adm_hostname` (string): hostname of the manager appliance
//! - `username` / `password` (string): manager credentials; fall back to the
//!   `ADM_USERNAME` / `ADM_PASSWORD` environment variables
//! - `validate_certs` (bool): validate TLS certificates (default: false)
//!
//! Returns one list of backend server objects per term. A hostname that does
//! not resolve yields an empty list for that term.

use serde_json::Value;
use tracing::info;

use super::{Lookup, LookupContext, LookupResult, Options};
use crate::dns;
use crate::netscaler::{resolve, AdmSettings};

/// Resolves the backend servers behind a URL
#[derive(Debug, Clone, Default)]
pub struct UrlToBackendLookup;

impl UrlToBackendLookup {
    /// Create a new UrlToBackendLookup instance
    pub fn new() -> Self {
        Self
    }
}

impl Lookup for UrlToBackendLookup {
    fn name(&self) -> &'static str {
        "url_to_backend"
    }

    fn description(&self) -> &'static str {
        "Resolves which backend servers are servicing a URL"
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
            info!("url_to_backend lookup term: {term}");
            // validates the scheme up front so a bad term fails before DNS
            resolve::protocol_for_url(term)?;
            let hostname = resolve::url_hostname(term);
            let ips = dns::resolve_system_first(&hostname).address_strings();
            let servers = resolve::backends_for_url(&api, &adm.hostname, term, &ips)?;
            ret.push(Value::Array(servers));
        }
        Ok(ret)
    }
}
