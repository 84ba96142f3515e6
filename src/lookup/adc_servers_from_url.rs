//! `netscaler_adc_servers_from_url` lookup plugin.
//!
//! The detailed variant of [`url_to_backend`](super::url_to_backend): besides
//! the backend servers it reports the resolved addresses (with their owner
//! name) and the matched virtual servers, and it resolves the hostname
//! through a configurable external DNS server first.
//!
//! # Usage
//!
//! ```text
//! opslookup run netscaler_adc_servers_from_url https://shop.example.com/ \
//!     -O adm_hostname=adm.example.net -O username=svc -O password=... \
//!     -O external_dns=9.9.9.9
//! ```
//!
//! # Options
//!
//! - `adm_hostname` (string): hostname of the manager appliance
//! - `username` / `password` (string): manager credentials; fall back to the
//!   `ADM_USERNAME` / `ADM_PASSWORD` environment variables
//! - `external_dns` (string): nameserver tried before the system resolver
//!   (default: 8.8.8.8; empty string disables)
//! - `validate_certs` (bool): validate TLS certificates (default: false)
//!
//! Returns, per term, `{ip_address_list, vserver_list, server_list}`.

use serde_json::{json, Value};
use std::net::IpAddr;
use tracing::info;

use super::{Lookup, LookupContext, LookupError, LookupResult, Options};
use crate::dns;
use crate::netscaler::{resolve, AdmSettings};

/// Resolves addresses, virtual servers and backend servers behind a URL
#[derive(Debug, Clone, Default)]
pub struct AdcServersFromUrlLookup;

impl AdcServersFromUrlLookup {
    /// Create a new AdcServersFromUrlLookup instance
    pub fn new() -> Self {
        Self
    }

    fn external_dns(&self, options: &Options, ctx: &LookupContext) -> LookupResult<Option<IpAddr>> {
        let value = options.get_or("external_dns", &ctx.config.adm.external_dns);
        if value.is_empty() {
            return Ok(None);
        }
        value
            .parse()
            .map(Some)
            .map_err(|_| LookupError::InvalidArguments(format!("invalid external_dns: '{value}'")))
    }
}

impl Lookup for AdcServersFromUrlLookup {
    fn name(&self) -> &'static str {
        "netscaler_adc_servers_from_url"
    }

    fn description(&self) -> &'static str {
        "Resolves the addresses, vservers and backend servers servicing a URL"
    }

    fn run(
        &self,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let adm = AdmSettings::from_options(options, ctx)?;
        let external_dns = self.external_dns(options, ctx)?;
        let api = adm.client(ctx)?;
        let domain = adm.domain();

        let mut ret = Vec::new();
        for term in terms {
            info!("netscaler_adc_servers_from_url lookup term: {term}");
            let url = term.to_lowercase();
            let protocol = resolve::protocol_for_url(&url)?;
            let hostname = resolve::url_hostname(&url);
            let resolved = dns::resolve_nameserver_first(&hostname, external_dns);

            let mut ip_address_list = Vec::new();
            let mut vserver_list = Vec::new();
            let mut server_list = Vec::new();

            for ip in resolved.address_strings() {
                ip_address_list.push(json!({
                    "ip_address": ip,
                    "owner": resolved.owner,
                }));
                if let Some(record) =
                    resolve::first_vserver_for_ip(&api, &adm.hostname, &domain, &ip, protocol)?
                {
                    vserver_list.push(record);
                }
            }

            for vserver in &vserver_list {
                let device = resolve::str_field(vserver, "load_balancer");
                let target = resolve::resolve_target_lbvserver(
                    &api,
                    device,
                    resolve::str_field(vserver, "name"),
                    resolve::str_field(vserver, "type"),
                    &url,
                )?;
                server_list.extend(resolve::backends_for_lbvserver(&api, device, &target)?);
            }

            ret.push(json!({
                "ip_address_list": ip_address_list,
                "vserver_list": vserver_list,
                "server_list": server_list,
            }));
        }
        Ok(ret)
    }
}
