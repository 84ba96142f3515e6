//! Hostname resolution with resolver fallback.
//!
//! The resolution plugins never hard-fail on DNS: a hostname that cannot be
//! resolved yields an empty address list and the lookup continues with the
//! remaining terms. Two fallback orders exist because the plugins inherited
//! both behaviors:
//!
//! - [`resolve_system_first`]: system resolver, then a fixed public resolver;
//! - [`resolve_nameserver_first`]: an explicit nameserver, then the system
//!   resolver.

use std::net::IpAddr;
use tracing::{debug, info};
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::Resolver;

/// Public resolver used when the system resolver cannot answer
pub const PUBLIC_RESOLVER: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(8, 8, 8, 8));

/// Result of a hostname resolution
#[derive(Debug, Clone, Default)]
pub struct ResolvedHost {
    /// Resolved addresses, empty when the hostname could not be resolved
    pub addresses: Vec<IpAddr>,

    /// Canonical (owner) name of the answer records, when available
    pub owner: String,
}

impl ResolvedHost {
    /// Addresses formatted as strings, the form the manager API filters take
    pub fn address_strings(&self) -> Vec<String> {
        self.addresses.iter().map(ToString::to_string).collect()
    }
}

fn resolver_for(nameserver: Option<IpAddr>) -> Option<Resolver> {
    match nameserver {
        Some(ip) => {
            let servers = NameServerConfigGroup::from_ips_clear(&[ip], 53, true);
            let config = ResolverConfig::from_parts(None, Vec::new(), servers);
            Resolver::new(config, ResolverOpts::default()).ok()
        }
        None => Resolver::from_system_conf().ok(),
    }
}

fn lookup(hostname: &str, nameserver: Option<IpAddr>) -> Option<ResolvedHost> {
    match nameserver {
        Some(ns) => info!("trying to resolve {hostname} using {ns}"),
        None => info!("trying to resolve {hostname} using the system resolver"),
    }
    let resolver = resolver_for(nameserver)?;
    match resolver.lookup_ip(hostname) {
        Ok(answer) => {
            let owner = answer
                .as_lookup()
                .record_iter()
                .next()
                .map(|record| record.name().to_utf8().trim_end_matches('.').to_string())
                .unwrap_or_default();
            let addresses: Vec<IpAddr> = answer.iter().collect();
            if addresses.is_empty() {
                return None;
            }
            info!(
                "hostname {hostname} resolved to: {}",
                addresses
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            );
            Some(ResolvedHost { addresses, owner })
        }
        Err(e) => {
            debug!("error resolving {hostname}: {e}");
            None
        }
    }
}

/// Resolve via the system resolver, retrying through [`PUBLIC_RESOLVER`] on
/// failure. Total failure yields an empty address list.
pub fn resolve_system_first(hostname: &str) -> ResolvedHost {
    lookup(hostname, None)
        .or_else(|| lookup(hostname, Some(PUBLIC_RESOLVER)))
        .unwrap_or_default()
}

/// Resolve via an explicit nameserver, falling back to the system resolver.
/// Without a nameserver only the system resolver is consulted.
pub fn resolve_nameserver_first(hostname: &str, nameserver: Option<IpAddr>) -> ResolvedHost {
    match nameserver {
        Some(ns) => lookup(hostname, Some(ns))
            .or_else(|| lookup(hostname, None))
            .unwrap_or_default(),
        None => lookup(hostname, None).unwrap_or_default(),
    }
}
