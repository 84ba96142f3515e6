//! Configuration for opslookup.
//!
//! Plugin option defaults are loaded from a TOML file with one section per
//! external system, looked up in order:
//! - an explicit `--config` path
//! - `./opslookup.toml`
//! - `~/.opslookup.toml`
//!
//! Every value here is a default: explicit `key=value` plugin options always
//! win, and credentials may also come from environment variables (see the
//! individual plugins).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Load-balancer manager (ADM) settings
    pub adm: AdmConfig,

    /// LDAP directory settings
    pub ldap: LdapConfig,

    /// SCCM AdminService settings
    pub sccm: SccmConfig,

    /// Secrets vault settings
    pub secrets: SecretsConfig,

    /// Ping defaults
    pub ping: PingConfig,

    /// Date plugin defaults
    pub date: DateConfig,
}

/// Load-balancer manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmConfig {
    /// Hostname of the manager appliance
    pub hostname: Option<String>,

    /// External DNS server used to resolve public hostnames
    pub external_dns: String,

    /// Default protocol for vserver IP lookups
    pub protocol: String,

    /// Whether to validate the manager's TLS certificate
    pub validate_certs: bool,
}

impl Default for AdmConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            external_dns: "8.8.8.8".to_string(),
            protocol: "SSL".to_string(),
            validate_certs: false,
        }
    }
}

/// LDAP directory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LdapConfig {
    /// LDAP server address
    pub server: Option<String>,

    /// Base DN for computer searches
    pub server_base_dn: Option<String>,

    /// Base DN for group searches
    pub group_base_dn: Option<String>,

    /// Attributes returned by host searches
    pub host_attributes: Vec<String>,

    /// Attributes returned by user searches
    pub user_attributes: Vec<String>,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            server: None,
            server_base_dn: None,
            group_base_dn: None,
            host_attributes: [
                "cn",
                "description",
                "distinguishedName",
                "dNSHostName",
                "lastLogonTimestamp",
                "objectGUID",
                "objectSid",
                "operatingSystem",
                "operatingSystemVersion",
                "primaryGroupID",
            ]
            .map(String::from)
            .to_vec(),
            user_attributes: [
                "c",
                "cn",
                "co",
                "company",
                "department",
                "displayName",
                "distinguishedName",
                "employeeNumber",
                "givenName",
                "info",
                "l",
                "lastLogon",
                "mail",
                "manager",
                "mobile",
                "name",
                "physicalDeliveryOfficeName",
                "sAMAccountName",
                "sn",
                "streetAddress",
                "title",
                "userPrincipalName",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

/// SCCM AdminService settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SccmConfig {
    /// SCCM server address
    pub server: Option<String>,

    /// Fields to project with `$select` (empty = all fields)
    pub fields: Vec<String>,
}

/// Secrets vault settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Base URI of the vault
    pub uri: Option<String>,

    /// Default folder for secrets named without one
    pub folder: Option<String>,

    /// Path to a CA certificate file, or "false" to disable verification
    pub cert_verify: Option<String>,
}

/// Ping defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    /// Per-packet timeout in seconds
    pub timeout: i64,

    /// Time-to-live of the ICMP packets
    pub ttl: i64,

    /// ICMP payload size in bytes
    pub size: i64,

    /// Unit of the returned round-trip time ("s" or "ms")
    pub unit: String,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            timeout: 4,
            ttl: 64,
            size: 56,
            unit: "s".to_string(),
        }
    }
}

/// Date plugin defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DateConfig {
    /// Date format for `date_tz`
    pub format: String,

    /// Date format for `timedelta`
    pub timedelta_format: String,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            format: "%m-%d-%Y %H:%M:%S".to_string(),
            timedelta_format: "%Y-%m-%dT%H:%M:%S%.f%z".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the given path, or from the default locations.
    ///
    /// A missing file yields the built-in defaults; an unreadable or
    /// malformed file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                for candidate in Self::default_paths() {
                    if candidate.exists() {
                        return Self::from_file(&candidate);
                    }
                }
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("opslookup.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".opslookup.toml"));
        }
        paths
    }
}
