//! `ldap_host` lookup plugin.
//!
//! Fetches computer and related group information from an LDAP directory.
//! Per term: the first matching computer object plus every group whose CN
//! contains the term.
//!
//! # Usage
//!
//! ```text
//! opslookup run ldap_host web01 \
//!     -O server=ldap.example.net \
//!     -O server_base_dn=OU=Servers,DC=example,DC=net \
//!     -O group_base_dn=DC=example,DC=net \
//!     -O username='EXAMPLE\svc' -O password=...
//! ```
//!
//! # Options
//!
//! - `server` (string): LDAP server address
//! - `server_base_dn` (string): base DN for the computer search
//! - `group_base_dn` (string): base DN for the group search
//! - `username` / `password` (string): bind credentials; fall back to the
//!   `LDAP_USERNAME` / `LDAP_PASSWORD` environment variables
//! - `attributes` (string): comma-separated attribute list to return

use ldap3::{ldap_escape, LdapConn, LdapConnSettings, Scope, SearchEntry};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

use super::{Lookup, LookupContext, LookupError, LookupResult, Options};

/// Fetches computer and group information from an LDAP directory
#[derive(Debug, Clone, Default)]
pub struct LdapHostLookup;

impl LdapHostLookup {
    /// Create a new LdapHostLookup instance
    pub fn new() -> Self {
        Self
    }
}

/// Connect and bind to an LDAP server with a simple bind
pub(crate) fn bind(
    server: &str,
    username: &str,
    password: &str,
    timeout_secs: u64,
) -> LookupResult<LdapConn> {
    let url = if server.contains("://") {
        server.to_string()
    } else {
        format!("ldap://{server}")
    };
    debug!("connecting to LDAP server: {url} ...");
    let settings = LdapConnSettings::new().set_conn_timeout(Duration::from_secs(timeout_secs));
    let mut ldap = LdapConn::with_settings(settings, &url)
        .map_err(|e| LookupError::Ldap(format!("failed to connect to {url}: {e}")))?;
    ldap.simple_bind(username, password)
        .and_then(|r| r.success())
        .map_err(|e| LookupError::Ldap(format!("bind to {url} failed: {e}")))?;
    Ok(ldap)
}

/// Run a subtree search and construct the entries
pub(crate) fn search(
    ldap: &mut LdapConn,
    base_dn: &str,
    filter: &str,
    attributes: &[String],
) -> LookupResult<Vec<SearchEntry>> {
    debug!("searching {filter} under {base_dn}");
    let (entries, _result) = ldap
        .search(base_dn, Scope::Subtree, filter, attributes)
        .and_then(|r| r.success())
        .map_err(|e| LookupError::Ldap(format!("search '{filter}' failed: {e}")))?;
    Ok(entries
        .into_iter()
        .map(SearchEntry::construct)
        .filter(|entry| !entry.dn.is_empty())
        .collect())
}

/// Project the attributes of an entry into a JSON map. Single-valued
/// attributes become strings, multi-valued ones arrays; empty attributes are
/// omitted and binary values are base64-encoded.
pub(crate) fn entry_attributes(entry: &SearchEntry) -> Map<String, Value> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    let mut map = Map::new();
    for (attr, values) in &entry.attrs {
        match values.len() {
            0 => {}
            1 => {
                map.insert(attr.clone(), json!(values[0]));
            }
            _ => {
                map.insert(attr.clone(), json!(values));
            }
        }
    }
    for (attr, values) in &entry.bin_attrs {
        let encoded: Vec<String> = values.iter().map(|v| STANDARD.encode(v)).collect();
        match encoded.len() {
            0 => {}
            1 => {
                map.insert(attr.clone(), json!(encoded[0]));
            }
            _ => {
                map.insert(attr.clone(), json!(encoded));
            }
        }
    }
    map
}

/// Entry as a `{dn, attributes}` object
pub(crate) fn entry_value(entry: &SearchEntry) -> Value {
    json!({
        "dn": entry.dn,
        "attributes": entry_attributes(entry),
    })
}

/// Attribute list from the option string, or the configured default
pub(crate) fn attribute_list(options: &Options, default: &[String]) -> Vec<String> {
    match options.get("attributes") {
        Some(value) => value
            .split(',')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
        None => default.to_vec(),
    }
}

impl Lookup for LdapHostLookup {
    fn name(&self) -> &'static str {
        "ldap_host"
    }

    fn description(&self) -> &'static str {
        "Fetches computer and group information from an LDAP directory"
    }

    fn run(
        &self,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let server = options
            .get("server")
            .map(str::to_string)
            .or_else(|| ctx.config.ldap.server.clone())
            .ok_or_else(|| LookupError::MissingArgument("server".to_string()))?;
        let server_base_dn = options
            .get("server_base_dn")
            .map(str::to_string)
            .or_else(|| ctx.config.ldap.server_base_dn.clone())
            .ok_or_else(|| LookupError::MissingArgument("server_base_dn".to_string()))?;
        let group_base_dn = options
            .get("group_base_dn")
            .map(str::to_string)
            .or_else(|| ctx.config.ldap.group_base_dn.clone())
            .ok_or_else(|| LookupError::MissingArgument("group_base_dn".to_string()))?;
        let username = options.require_with_env("username", "LDAP_USERNAME")?;
        let password = options.require_with_env("password", "LDAP_PASSWORD")?;
        let attributes = attribute_list(options, &ctx.config.ldap.host_attributes);

        let mut ldap = bind(&server, &username, &password, ctx.timeout_secs)?;

        let mut ret = Vec::new();
        for term in terms {
            let escaped = ldap_escape(term.as_str());

            let filter = format!("(&(objectClass=computer)(name={escaped}))");
            let computers = search(&mut ldap, &server_base_dn, &filter, &attributes)?;
            let computer_info = computers.first().map(entry_value).ok_or_else(|| {
                LookupError::NotFound(format!("computer '{term}' not found in LDAP"))
            })?;

            let filter = format!("(&(objectClass=group)(cn=*{escaped}*))");
            let groups = search(&mut ldap, &group_base_dn, &filter, &attributes)?;
            let group_info: Vec<Value> = groups.iter().map(entry_value).collect();

            ret.push(json!({
                "computer_info": computer_info,
                "group_info": group_info,
            }));
        }
        let _ = ldap.unbind();
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn sample_entry() -> SearchEntry {
        SearchEntry {
            dn: "CN=web01,OU=Servers,DC=example,DC=net".to_string(),
            attrs: HashMap::from([
                ("cn".to_string(), vec!["web01".to_string()]),
                (
                    "description".to_string(),
                    vec!["frontend".to_string(), "production".to_string()],
                ),
                ("operatingSystem".to_string(), vec![]),
            ]),
            bin_attrs: HashMap::from([(
                "objectGUID".to_string(),
                vec![vec![0x01, 0x02, 0x03]],
            )]),
        }
    }

    #[test]
    fn test_entry_attributes_projection() {
        let map = entry_attributes(&sample_entry());
        assert_eq!(map.get("cn"), Some(&json!("web01")));
        assert_eq!(
            map.get("description"),
            Some(&json!(["frontend", "production"]))
        );
        // empty attributes are omitted
        assert!(!map.contains_key("operatingSystem"));
        // binary attributes are base64-encoded
        assert_eq!(map.get("objectGUID"), Some(&json!("AQID")));
    }

    #[test]
    fn test_entry_value_shape() {
        let value = entry_value(&sample_entry());
        assert_eq!(
            value.get("dn").and_then(Value::as_str),
            Some("CN=web01,OU=Servers,DC=example,DC=net")
        );
        assert!(value.get("attributes").is_some());
    }

    #[test]
    fn test_attribute_list_parsing() {
        let default = vec!["cn".to_string(), "dNSHostName".to_string()];

        let options = Options::new();
        assert_eq!(attribute_list(&options, &default), default);

        let mut options = Options::new();
        options.set("attributes", "cn, objectSid ,description");
        assert_eq!(
            attribute_list(&options, &default),
            vec!["cn", "objectSid", "description"]
        );
    }

    #[test]
    fn test_missing_server_is_an_error() {
        let lookup = LdapHostLookup::new();
        let mut options = Options::new();
        options.set("username", "svc");
        options.set("password", "secret");
        let ctx = LookupContext::default();

        let result = lookup.run(&["web01".to_string()], &options, &ctx);
        assert!(matches!(result, Err(LookupError::MissingArgument(_))));
    }
}
