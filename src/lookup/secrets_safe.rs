//! `secrets_safe` lookup plugin.
//!
//! Fetches credentials, text secrets, and files from a BeyondTrust
//! Secrets Safe instance. Terms are secret titles, optionally prefixed with
//! their folder (`folder/title`); the result is a single map keyed by the
//! requested titles:
//!
//! - `Credential` secrets yield `{username, password}`
//! - `Text` secrets yield `{text}`
//! - `File` secrets yield `{file}` with the content base64-encoded
//!
//! The vault API is session-based: sign in with the vendor `PS-Auth` header,
//! browse folders and secrets on the session cookie, sign out at the end.
//!
//! # Usage
//!
//! ```text
//! opslookup run secrets_safe 'AWX Vault/deploy_key' \
//!     -O bt_uri=https://vault.example.net/ -O bt_apikey=... \
//!     -O bt_username=svc -O bt_password=...
//! ```
//!
//! # Options
//!
//! - `bt_uri` (string): base URI of the vault; falls back to `BT_URI`
//! - `bt_folder` (string): default folder for titles named without one;
//!   falls back to `BT_FOLDER`
//! - `bt_username` / `bt_password` (string): service account; fall back to
//!   `BT_USERNAME` / `BT_PASSWORD`
//! - `bt_apikey` (string): API key; falls back to `BT_APIKEY`
//! - `bt_cert_verify` (string): path to a CA certificate file, or "false"
//!   to disable verification; falls back to `BT_CERT_VERIFY`

use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

use super::{Lookup, LookupContext, LookupError, LookupResult, Options};

/// Fetches credentials, text secrets, and files from a secrets vault
#[derive(Debug, Clone, Default)]
pub struct SecretsSafeLookup;

impl SecretsSafeLookup {
    /// Create a new SecretsSafeLookup instance
    pub fn new() -> Self {
        Self
    }
}

/// Session client for the Secrets Safe public API
struct SecretsSafeClient {
    client: reqwest::blocking::Client,
    base_uri: String,
    auth_header: String,
}

impl SecretsSafeClient {
    fn new(
        base_uri: &str,
        api_key: &str,
        username: &str,
        password: &str,
        cert_verify: Option<&str>,
        timeout_secs: u64,
    ) -> LookupResult<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(timeout_secs));
        match cert_verify {
            None => {
                builder = builder.danger_accept_invalid_certs(true);
            }
            Some(path) => {
                let pem = std::fs::read(path)?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    LookupError::InvalidArguments(format!("invalid CA certificate '{path}': {e}"))
                })?;
                builder = builder.add_root_certificate(cert);
            }
        }
        let client = builder
            .build()
            .map_err(|e| LookupError::Http(format!("failed to create HTTP client: {e}")))?;

        let base_uri = format!("{}BeyondTrust/api/public/v3", base_uri);
        debug!("base uri is: {base_uri}");
        Ok(Self {
            client,
            base_uri,
            auth_header: format!("PS-Auth key={api_key}; runas={username}; pwd=[{password}];"),
        })
    }

    fn decode(&self, response: reqwest::blocking::Response) -> LookupResult<Value> {
        let status = response.status();
        let url = response.url().clone();
        if !status.is_success() {
            return Err(LookupError::Http(format!(
                "response {} received from {url}",
                status.as_u16()
            )));
        }
        response
            .json()
            .map_err(|e| LookupError::Http(format!("could not parse vault response: {e}")))
    }

    fn get(&self, path: &str) -> LookupResult<Value> {
        let url = format!("{}/{path}", self.base_uri);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| LookupError::Http(format!("could not connect to {url}: {e}")))?;
        self.decode(response)
    }

    fn authenticate(&self) -> LookupResult<()> {
        debug!("authenticating to the vault API");
        let url = format!("{}/Auth/SignAppin", self.base_uri);
        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.auth_header)
            .send()
            .map_err(|e| LookupError::Http(format!("could not connect to {url}: {e}")))?;
        self.decode(response)?;
        debug!("successfully authenticated to the vault API");
        Ok(())
    }

    fn sign_out(&self) {
        debug!("signing out from the vault API");
        let url = format!("{}/Auth/SignOut", self.base_uri);
        if let Err(e) = self.client.post(&url).send() {
            debug!("sign-out failed: {e}");
        }
    }

    fn folders(&self) -> LookupResult<Vec<Value>> {
        debug!("getting the folder list");
        let folders = self.get("Secrets-Safe/Folders")?;
        folders
            .as_array()
            .cloned()
            .ok_or_else(|| LookupError::Http("unexpected folder list shape".to_string()))
    }

    fn secrets_in_folder(&self, folder_id: &str) -> LookupResult<Vec<Value>> {
        debug!("getting the secret list for folder {folder_id}");
        let secrets = self.get(&format!("Secrets-Safe/Folders/{folder_id}/secrets"))?;
        secrets
            .as_array()
            .cloned()
            .ok_or_else(|| LookupError::Http("unexpected secret list shape".to_string()))
    }

    fn secret(&self, secret_id: &str) -> LookupResult<Value> {
        debug!("getting secret {secret_id}");
        self.get(&format!("Secrets-Safe/Secrets/{secret_id}"))
    }

    fn secret_file(&self, secret_id: &str) -> LookupResult<String> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;

        debug!("downloading file secret {secret_id}");
        let url = format!(
            "{}/Secrets-Safe/Secrets/{secret_id}/file/download",
            self.base_uri
        );
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| LookupError::Http(format!("could not connect to {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Http(format!(
                "response {} received from {url}",
                status.as_u16()
            )));
        }
        let content = response
            .bytes()
            .map_err(|e| LookupError::Http(format!("could not read file secret: {e}")))?;
        Ok(STANDARD.encode(&content))
    }
}

/// Split a term into folder and title; the folder part is optional
pub(crate) fn split_term(term: &str) -> (Option<&str>, &str) {
    match term.rsplit_once('/') {
        Some((folder, title)) => {
            // only the last path component before the title counts
            let folder = folder.rsplit('/').next().unwrap_or(folder);
            (Some(folder), title)
        }
        None => (None, term),
    }
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Lookup for SecretsSafeLookup {
    fn name(&self) -> &'static str {
        "secrets_safe"
    }

    fn description(&self) -> &'static str {
        "Fetches credentials, text secrets, and files from a secrets vault"
    }

    fn run(
        &self,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let uri = options
            .get_with_env("bt_uri", "BT_URI")
            .or_else(|| ctx.config.secrets.uri.clone())
            .ok_or_else(|| LookupError::MissingArgument("bt_uri".to_string()))?;
        let default_folder = options
            .get_with_env("bt_folder", "BT_FOLDER")
            .or_else(|| ctx.config.secrets.folder.clone());
        let api_key = options.require_with_env("bt_apikey", "BT_APIKEY")?;
        let username = options.require_with_env("bt_username", "BT_USERNAME")?;
        let password = options.require_with_env("bt_password", "BT_PASSWORD")?;
        let cert_verify = options
            .get_with_env("bt_cert_verify", "BT_CERT_VERIFY")
            .or_else(|| ctx.config.secrets.cert_verify.clone())
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("false"));

        let vault = SecretsSafeClient::new(
            &uri,
            &api_key,
            &username,
            &password,
            cert_verify.as_deref(),
            ctx.timeout_secs,
        )?;
        vault.authenticate()?;
        let result = self.fetch_terms(&vault, terms, default_folder.as_deref());
        vault.sign_out();

        // all requested secrets travel in one map, keyed by the terms
        Ok(vec![Value::Object(result?)])
    }
}

impl SecretsSafeLookup {
    fn fetch_terms(
        &self,
        vault: &SecretsSafeClient,
        terms: &[String],
        default_folder: Option<&str>,
    ) -> LookupResult<Map<String, Value>> {
        let folders = vault.folders()?;
        let mut creds = Map::new();

        for term in terms {
            debug!("searching for {term}");
            let (folder, title) = split_term(term);
            let folder = match folder {
                Some(folder) => folder,
                None => default_folder.ok_or_else(|| {
                    LookupError::MissingArgument(
                        "bt_folder should be set if it is not specified in the secret name"
                            .to_string(),
                    )
                })?,
            };

            let folder_id = folders
                .iter()
                .find(|f| f.get("Name").and_then(Value::as_str) == Some(folder))
                .map(|f| id_string(f.get("Id").unwrap_or(&Value::Null)))
                .ok_or_else(|| {
                    LookupError::NotFound(format!("folder '{folder}' not found in the vault"))
                })?;

            let secrets = vault.secrets_in_folder(&folder_id)?;
            if secrets.is_empty() {
                return Err(LookupError::NotFound(
                    "unable to find any secrets with the parameters supplied".to_string(),
                ));
            }

            for secret in &secrets {
                if secret.get("Title").and_then(Value::as_str) != Some(title) {
                    continue;
                }
                let secret_id = id_string(secret.get("Id").unwrap_or(&Value::Null));
                let secret_type = secret.get("SecretType").and_then(Value::as_str).unwrap_or("");
                let entry = match secret_type {
                    "Credential" => {
                        let res = vault.secret(&secret_id)?;
                        json!({
                            "username": res.get("Username").cloned().unwrap_or(Value::Null),
                            "password": res.get("Password").cloned().unwrap_or(Value::Null),
                        })
                    }
                    "Text" => {
                        let res = vault.secret(&secret_id)?;
                        json!({ "text": res.get("Password").cloned().unwrap_or(Value::Null) })
                    }
                    "File" => {
                        json!({ "file": vault.secret_file(&secret_id)? })
                    }
                    other => {
                        return Err(LookupError::Other(format!(
                            "found a matching secret, but its type '{other}' is not supported"
                        )))
                    }
                };
                creds.insert(term.clone(), entry);
            }
        }
        Ok(creds)
    }
}
