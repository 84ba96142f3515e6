//! Client for the NetScaler configuration API.
//!
//! Both the manager (ADM) and the individual devices (ADC) expose the same
//! REST surface under `/nitro/v1/config/`. Every call here is a plain
//! authenticated GET; any non-success status aborts the lookup with a hard
//! error carrying the status code and response body.
//!
//! The [`NitroApi`] trait is the seam the resolution walk is written against,
//! so the multi-hop traversal can be exercised against fixture data.

use crate::lookup::{LookupError, LookupResult};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

/// Common prefix of all configuration resources
pub const API_PATH: &str = "/nitro/v1/config/";

/// Configuration resource names
pub mod resource {
    /// Manager inventory of load-balancing vservers
    pub const ADM_LB_VSERVER: &str = "ns_lbvserver";
    /// Manager inventory of content-switching vservers
    pub const ADM_CS_VSERVER: &str = "ns_csvserver";
    /// Load-balancing vserver on a device
    pub const LB_VSERVER: &str = "lbvserver";
    /// Content-switching vserver on a device
    pub const CS_VSERVER: &str = "csvserver";
    /// Policy bindings of a content-switching vserver
    pub const CS_POLICY_BINDING: &str = "csvserver_cspolicy_binding";
    /// Content-switching policy object
    pub const CS_POLICY: &str = "cspolicy";
    /// Service bindings of a load-balancing vserver
    pub const SERVICE_BINDING: &str = "lbvserver_service_binding";
    /// Service object
    pub const SERVICE: &str = "service";
    /// Service-group bindings of a load-balancing vserver
    pub const SERVICEGROUP_BINDING: &str = "lbvserver_servicegroup_binding";
    /// Members of a service group
    pub const SERVICEGROUP_MEMBER_BINDING: &str = "servicegroup_servicegroupmember_binding";
    /// Server object
    pub const SERVER: &str = "server";
}

/// Path for a manager inventory query filtered by vserver IP and protocol
pub fn inventory_path(resource: &str, ip: &str, protocol: &str) -> String {
    format!("{API_PATH}{resource}?filter=vsvr_ip_address:{ip},vsvr_type:{protocol}")
}

/// Path for a named configuration object
pub fn object_path(resource: &str, name: &str) -> String {
    format!("{API_PATH}{resource}/{name}")
}

/// Read access to the configuration API of a manager or device
pub trait NitroApi {
    /// GET `https://{host}{path}` and decode the JSON body
    fn get(&self, host: &str, path: &str) -> LookupResult<Value>;
}

/// HTTP implementation of [`NitroApi`] with basic authentication
pub struct HttpNitroClient {
    client: reqwest::blocking::Client,
    username: String,
    password: String,
}

impl HttpNitroClient {
    /// Build a client. Certificate validation is off unless requested; the
    /// appliances ship with self-signed certificates.
    pub fn new(
        username: &str,
        password: &str,
        validate_certs: bool,
        timeout_secs: u64,
    ) -> LookupResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(!validate_certs)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LookupError::Http(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl NitroApi for HttpNitroClient {
    fn get(&self, host: &str, path: &str) -> LookupResult<Value> {
        let url = format!("https://{host}{path}");
        debug!("fetching info from {url}");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LookupError::Http(format!("request to {url} timed out"))
                } else if e.is_connect() {
                    LookupError::Http(format!("connection to {host} failed: {e}"))
                } else {
                    LookupError::Http(format!("request to {url} failed: {e}"))
                }
            })?;

        let status = response.status();
        trace!("response status code {status}");
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LookupError::Http(format!(
                "http error {}: {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json()
            .map_err(|e| LookupError::Http(format!("failed to decode response from {url}: {e}")))
    }
}
