//! Lookup plugin system.
//!
//! Every external-system adapter in this crate is a lookup plugin: a stateless
//! function from input terms plus options to structured JSON results, one
//! result per term. Plugins are registered in a [`LookupRegistry`] and invoked
//! by name.
//!
//! # Example
//!
//! ```rust,ignore
//! use opslookup::lookup::{LookupContext, LookupRegistry, Options};
//!
//! let registry = LookupRegistry::with_builtins();
//! let ctx = LookupContext::default();
//! let options = Options::new();
//!
//! let results = registry.run("ping", &["example.com".to_string()], &options, &ctx)?;
//! ```

pub mod adc_servers_from_url;
pub mod adc_servers_from_vservers;
pub mod date_tz;
pub mod ip_to_adc;
pub mod ip_to_vserver;
pub mod ldap_host;
pub mod ldap_user;
pub mod ns_proxy;
pub mod ping;
pub mod sccm_host;
pub mod secrets_safe;
pub mod timedelta;
pub mod url_to_backend;
pub mod worknotes;

pub use adc_servers_from_url::AdcServersFromUrlLookup;
pub use adc_servers_from_vservers::AdcServersFromVserversLookup;
pub use date_tz::DateTzLookup;
pub use ip_to_adc::IpToAdcLookup;
pub use ip_to_vserver::IpToVserverLookup;
pub use ldap_host::LdapHostLookup;
pub use ldap_user::LdapUserLookup;
pub use ns_proxy::NsProxyLookup;
pub use ping::PingLookup;
pub use sccm_host::SccmHostLookup;
pub use secrets_safe::SecretsSafeLookup;
pub use timedelta::TimedeltaLookup;
pub use url_to_backend::UrlToBackendLookup;
pub use worknotes::WorknotesLookup;

use crate::config::Config;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during lookup operations
#[derive(Error, Debug)]
pub enum LookupError {
    /// Lookup plugin not found
    #[error("Lookup plugin not found: {0}")]
    NotFound(String),

    /// Invalid arguments provided to lookup
    #[error("Invalid lookup arguments: {0}")]
    InvalidArguments(String),

    /// Missing required option
    #[error("Missing required option: {0}")]
    MissingArgument(String),

    /// HTTP error during a remote call
    #[error("HTTP error: {0}")]
    Http(String),

    /// LDAP error during a directory call
    #[error("LDAP error: {0}")]
    Ldap(String),

    /// DNS resolution error
    #[error("DNS error: {0}")]
    Dns(String),

    /// Command execution failed
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// Parse error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// IO error during lookup
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout during lookup
    #[error("Lookup timed out after {0} seconds")]
    Timeout(u64),

    /// Generic lookup error
    #[error("{0}")]
    Other(String),
}

/// Result type for lookup operations
pub type LookupResult<T> = Result<T, LookupError>;

/// Plugin options: a key/value map filled from `key=value` pairs, with
/// environment-variable fallback for credentials.
#[derive(Debug, Clone, Default)]
pub struct Options {
    values: HashMap<String, String>,
}

impl Options {
    /// Create an empty option set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from `key=value` strings
    pub fn from_pairs<I, S>(pairs: I) -> LookupResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                LookupError::InvalidArguments(format!(
                    "invalid option '{pair}', expected 'key=value'"
                ))
            })?;
            options.set(key, value);
        }
        Ok(options)
    }

    /// Set an option value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get an option value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get an option value, or a default
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Get an option value, falling back to an environment variable
    pub fn get_with_env(&self, key: &str, env: &str) -> Option<String> {
        self.get(key)
            .map(str::to_string)
            .or_else(|| std::env::var(env).ok())
    }

    /// Get a required option value, falling back to an environment variable
    pub fn require_with_env(&self, key: &str, env: &str) -> LookupResult<String> {
        self.get_with_env(key, env).ok_or_else(|| {
            LookupError::MissingArgument(format!("{key} (or environment variable {env})"))
        })
    }

    /// Get a boolean option value
    pub fn get_bool(&self, key: &str, default: bool) -> LookupResult<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(v)
                if v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes") =>
            {
                Ok(true)
            }
            Some(v)
                if v.eq_ignore_ascii_case("false") || v == "0" || v.eq_ignore_ascii_case("no") =>
            {
                Ok(false)
            }
            Some(v) => Err(LookupError::InvalidArguments(format!(
                "invalid boolean value for '{key}': '{v}'"
            ))),
        }
    }

    /// Get an integer option value
    pub fn get_i64(&self, key: &str, default: i64) -> LookupResult<i64> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| {
                LookupError::InvalidArguments(format!("invalid integer value for '{key}': '{v}'"))
            }),
        }
    }
}

/// Context for lookup plugin execution
#[derive(Debug, Clone)]
pub struct LookupContext {
    /// Loaded configuration with per-system option defaults
    pub config: Config,

    /// Timeout for network operations in seconds
    pub timeout_secs: u64,
}

impl Default for LookupContext {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupContext {
    /// Create a new lookup context with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            timeout_secs: 30,
        }
    }

    /// Set the configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the network timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Trait that all lookup plugins must implement
pub trait Lookup: Send + Sync {
    /// Returns the name of the lookup plugin
    fn name(&self) -> &'static str;

    /// Returns a description of what this lookup does
    fn description(&self) -> &'static str;

    /// Execute the lookup over the given terms.
    ///
    /// Returns one JSON value per term. Terms are processed independently,
    /// but a hard error (unreachable API, bad credentials, malformed option)
    /// aborts the whole lookup.
    fn run(
        &self,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>>;
}

/// Registry for looking up plugins by name
pub struct LookupRegistry {
    plugins: HashMap<String, Arc<dyn Lookup>>,
}

impl LookupRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    /// Create a registry with all built-in lookup plugins
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(UrlToBackendLookup::new()));
        registry.register(Arc::new(AdcServersFromUrlLookup::new()));
        registry.register(Arc::new(AdcServersFromVserversLookup::new()));
        registry.register(Arc::new(IpToAdcLookup::new()));
        registry.register(Arc::new(IpToVserverLookup::new()));
        registry.register(Arc::new(NsProxyLookup::new()));
        registry.register(Arc::new(LdapHostLookup::new()));
        registry.register(Arc::new(LdapUserLookup::new()));
        registry.register(Arc::new(SccmHostLookup::new()));
        registry.register(Arc::new(SecretsSafeLookup::new()));
        registry.register(Arc::new(PingLookup::new()));
        registry.register(Arc::new(DateTzLookup::new()));
        registry.register(Arc::new(TimedeltaLookup::new()));
        registry.register(Arc::new(WorknotesLookup::new()));

        registry
    }

    /// Register a lookup plugin
    pub fn register(&mut self, plugin: Arc<dyn Lookup>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    /// Get a lookup plugin by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Lookup>> {
        self.plugins.get(name).cloned()
    }

    /// Check if a lookup plugin exists
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Get all registered plugins as (name, description) pairs, sorted by name
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .plugins
            .values()
            .map(|p| (p.name(), p.description()))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }

    /// Execute a lookup by plugin name
    pub fn run(
        &self,
        name: &str,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let plugin = self
            .get(name)
            .ok_or_else(|| LookupError::NotFound(name.to_string()))?;
        plugin.run(terms, options, ctx)
    }
}

impl Default for LookupRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_registry_with_builtins() {
        let registry = LookupRegistry::with_builtins();

        for name in [
            "url_to_backend",
            "netscaler_adc_servers_from_url",
            "netscaler_adc_servers_from_vservers",
            "ip_to_adc",
            "ip_to_vserver",
            "resolve_ns_proxy",
            "ldap_host",
            "ldap_user",
            "sccm_host",
            "secrets_safe",
            "ping",
            "date_tz",
            "timedelta",
            "worknotes_data",
        ] {
            assert!(registry.contains(name), "missing builtin plugin {name}");
        }
        assert_eq!(registry.entries().len(), 14);
    }

    #[test]
    fn test_registry_not_found() {
        let registry = LookupRegistry::new();
        let ctx = LookupContext::default();

        let result = registry.run("nonexistent", &[], &Options::new(), &ctx);
        assert!(matches!(result, Err(LookupError::NotFound(_))));
    }

    #[test]
    fn test_options_from_pairs() {
        let options = Options::from_pairs(["timeout=5", "unit=ms"]).unwrap();
        assert_eq!(options.get("timeout"), Some("5"));
        assert_eq!(options.get("unit"), Some("ms"));
        assert_eq!(options.get("missing"), None);

        let result = Options::from_pairs(["no_equals"]);
        assert!(matches!(result, Err(LookupError::InvalidArguments(_))));
    }

    #[test]
    fn test_options_value_accessors() {
        let options = Options::from_pairs(["flag=true", "count=42", "bad=maybe"]).unwrap();

        assert!(options.get_bool("flag", false).unwrap());
        assert!(!options.get_bool("absent", false).unwrap());
        assert!(options.get_bool("bad", false).is_err());

        assert_eq!(options.get_i64("count", 0).unwrap(), 42);
        assert_eq!(options.get_i64("absent", 7).unwrap(), 7);
        assert!(options.get_i64("flag", 0).is_err());

        assert_eq!(options.get_or("absent", "fallback"), "fallback");
    }

    #[test]
    #[serial]
    fn test_options_env_fallback() {
        std::env::set_var("OPSLOOKUP_TEST_USERNAME", "from_env");

        let options = Options::new();
        assert_eq!(
            options
                .get_with_env("username", "OPSLOOKUP_TEST_USERNAME")
                .as_deref(),
            Some("from_env")
        );

        let mut options = Options::new();
        options.set("username", "explicit");
        assert_eq!(
            options
                .get_with_env("username", "OPSLOOKUP_TEST_USERNAME")
                .as_deref(),
            Some("explicit")
        );

        std::env::remove_var("OPSLOOKUP_TEST_USERNAME");
        let options = Options::new();
        assert!(matches!(
            options.require_with_env("username", "OPSLOOKUP_TEST_USERNAME"),
            Err(LookupError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_context_builder() {
        let ctx = LookupContext::new().with_timeout(60);
        assert_eq!(ctx.timeout_secs, 60);
    }
}
