//! # Opslookup - Lookup Plugins for IT-Operations Automation
//!
//! Opslookup is a collection of one-shot lookup plugins: each plugin takes one
//! or more input terms (a URL, IP address, hostname, date string, or free-text
//! note), calls a single external system, and returns structured data. There
//! is no shared runtime, no persistent state, and no concurrency; every
//! invocation is a short-lived, synchronous call.
//!
//! ## Plugin families
//!
//! - **Load-balancer resolution** (`url_to_backend`, `ip_to_adc`,
//!   `ip_to_vserver`, `resolve_ns_proxy`, `netscaler_adc_servers_from_url`,
//!   `netscaler_adc_servers_from_vservers`): walk a NetScaler manager/device
//!   configuration API to resolve which virtual servers and backend servers
//!   handle given traffic, evaluating content-switching policy rules along
//!   the way. This is the only part with a non-trivial algorithm; see
//!   [`netscaler::policy`] and [`netscaler::resolve`].
//! - **Directory and inventory** (`ldap_host`, `ldap_user`, `sccm_host`):
//!   single LDAP or HTTP queries reshaped into JSON.
//! - **Secrets** (`secrets_safe`): session-based secrets vault retrieval.
//! - **Local utilities** (`ping`, `date_tz`, `timedelta`, `worknotes_data`):
//!   an ICMP probe via the system ping utility and small text transforms.
//!
//! ## Quick example
//!
//! ```rust,ignore
//! use opslookup::lookup::{LookupContext, LookupRegistry, Options};
//!
//! let registry = LookupRegistry::with_builtins();
//! let ctx = LookupContext::default();
//! let mut options = Options::new();
//! options.set("delta", "+3 days");
//! options.set("format", "%m-%d-%Y %H:%M:%S");
//!
//! let results = registry.run(
//!     "timedelta",
//!     &["08-25-2023 05:57:37".to_string()],
//!     &options,
//!     &ctx,
//! )?;
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod dns;
pub mod lookup;
pub mod netscaler;

/// Convenient re-exports of the commonly used types.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::lookup::{
        Lookup, LookupContext, LookupError, LookupRegistry, LookupResult, Options,
    };
    pub use crate::netscaler::nitro::{HttpNitroClient, NitroApi};
}
