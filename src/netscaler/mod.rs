//! NetScaler management-plane access.
//!
//! Shared infrastructure for the load-balancer resolution plugins: the
//! configuration-API client ([`nitro`]), the content-switching policy rule
//! evaluator ([`policy`]), and the multi-hop resolution walk ([`resolve`]).

pub mod nitro;
pub mod policy;
pub mod resolve;

use crate::lookup::{LookupContext, LookupError, LookupResult, Options};
use self::nitro::HttpNitroClient;

/// Connection settings for the load-balancer manager (ADM), shared by every
/// resolution plugin.
#[derive(Debug, Clone)]
pub struct AdmSettings {
    /// Manager hostname
    pub hostname: String,

    /// API username
    pub username: String,

    /// API password
    pub password: String,

    /// Whether to validate TLS certificates on manager and device calls
    pub validate_certs: bool,
}

impl AdmSettings {
    /// Resolve the manager settings from plugin options, the configuration
    /// file, and the `ADM_USERNAME` / `ADM_PASSWORD` environment variables.
    pub fn from_options(options: &Options, ctx: &LookupContext) -> LookupResult<Self> {
        let hostname = options
            .get("adm_hostname")
            .map(str::to_string)
            .or_else(|| ctx.config.adm.hostname.clone())
            .ok_or_else(|| LookupError::MissingArgument("adm_hostname".to_string()))?;
        let username = options.require_with_env("username", "ADM_USERNAME")?;
        let password = options.require_with_env("password", "ADM_PASSWORD")?;
        let validate_certs = options.get_bool("validate_certs", ctx.config.adm.validate_certs)?;
        Ok(Self {
            hostname,
            username,
            password,
            validate_certs,
        })
    }

    /// Domain suffix used to qualify device hostnames from the manager
    /// inventory: the last two labels of the manager hostname.
    pub fn domain(&self) -> String {
        let labels: Vec<&str> = self.hostname.split('.').collect();
        if labels.len() >= 2 {
            labels[labels.len() - 2..].join(".")
        } else {
            self.hostname.clone()
        }
    }

    /// Build an API client for this manager and its devices
    pub fn client(&self, ctx: &LookupContext) -> LookupResult<HttpNitroClient> {
        HttpNitroClient::new(
            &self.username,
            &self.password,
            self.validate_certs,
            ctx.timeout_secs,
        )
    }
}
