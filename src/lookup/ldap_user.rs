//! `ldap_user` lookup plugin.
//!
//! Fetches user information from an LDAP directory: per term, every person
//! entry whose name contains the term, as flat attribute maps.
//!
//! # Usage
//!
//! ```text
//! opslookup run ldap_user a123456 \
//!     -O server=ldap.example.net -O username='EXAMPLE\svc' -O password=...
//! ```
//!
//! # Options
//!
//! - `server` (string): LDAP server address
//! - `base_dn` (string): base DN for the search; derived from the server
//!   domain when not set
//! - `username` / `password` (string): bind credentials; fall back to the
//!   `LDAP_USERNAME` / `LDAP_PASSWORD` environment variables
//! - `attributes` (string): comma-separated attribute list to return

use ldap3::ldap_escape;
use serde_json::{json, Value};
use tracing::debug;

use super::ldap_host::{attribute_list, bind, entry_attributes, search};
use super::{Lookup, LookupContext, LookupError, LookupResult, Options};

/// Fetches user information from an LDAP directory
#[derive(Debug, Clone, Default)]
pub struct LdapUserLookup;

impl LdapUserLookup {
    /// Create a new LdapUserLookup instance
    pub fn new() -> Self {
        Self
    }
}

/// Derive a base DN from the domain part of the server name:
/// `ldap.example.net` becomes `DC=example,DC=net`.
pub(crate) fn derived_base_dn(server: &str) -> LookupResult<String> {
    let labels: Vec<&str> = server.split('.').skip(1).collect();
    if labels.is_empty() {
        return Err(LookupError::InvalidArguments(format!(
            "cannot derive base_dn from server '{server}', set base_dn explicitly"
        )));
    }
    Ok(labels
        .iter()
        .map(|label| format!("DC={label}"))
        .collect::<Vec<_>>()
        .join(","))
}

impl Lookup for LdapUserLookup {
    fn name(&self) -> &'static str {
        "ldap_user"
    }

    fn description(&self) -> &'static str {
        "Fetches user information from an LDAP directory"
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
        let base_dn = match options.get("base_dn") {
            Some(dn) if !dn.is_empty() => dn.to_string(),
            _ => derived_base_dn(&server)?,
        };
        let username = options.require_with_env("username", "LDAP_USERNAME")?;
        let password = options.require_with_env("password", "LDAP_PASSWORD")?;
        let attributes = attribute_list(options, &ctx.config.ldap.user_attributes);

        let mut ldap = bind(&server, &username, &password, ctx.timeout_secs)?;

        let mut ret = Vec::new();
        for term in terms {
            let escaped = ldap_escape(term.as_str());
            let filter = format!("(&(objectClass=person)(name=*{escaped}*))");
            debug!("searching {filter}");
            let entries = search(&mut ldap, &base_dn, &filter, &attributes)?;

            let users: Vec<Value> = entries
                .iter()
                .map(|entry| Value::Object(entry_attributes(entry)))
                .collect();
            if users.is_empty() {
                ret.push(json!({}));
            } else {
                ret.push(json!({ "users": users }));
            }
        }
        let _ = ldap.unbind();
        Ok(ret)
    }
}
