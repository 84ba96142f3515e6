//! `ip_to_adc` lookup plugin.
//!
//! Lists the load-balancer devices servicing an IP address, with the names
//! of the vservers each device hosts for that address.
//!
//! # Usage
//!
//! ```text
//! opslookup run ip_to_adc 203.0.113.10 \
//!     -O adm_hostname=adm.example.net -O username=svc -O password=...
//! ```
//!
//! # Options
//!
//! - `adm_hostname` (string): hostname of the manager appliance
//! - `protocol` (string): vserver protocol filter (default: SSL)
//! - `username` / `password` (string): manager credentials; fall back to the
//!   `ADM_USERNAME` / `ADM_PASSWORD` environment variables
//! - `validate_certs` (bool): validate TLS certificates (default: false)

use serde_json::{json, Map, Value};
use std::net::IpAddr;
use tracing::info;

use super::{Lookup, LookupContext, LookupError, LookupResult, Options};
use crate::netscaler::{resolve, AdmSettings};

/// Lists the load-balancer devices and vservers servicing an IP address
#[derive(Debug, Clone, Default)]
pub struct IpToAdcLookup;

impl IpToAdcLookup {
    /// Create a new IpToAdcLookup instance
    pub fn new() -> Self {
        Self
    }
}

/// Per-device accumulation of vserver names, in first-seen order
#[derive(Default)]
pub(crate) struct DeviceVservers {
    devices: Vec<(String, Vec<String>, Vec<String>)>,
}

impl DeviceVservers {
    pub(crate) fn add_lb(&mut self, device: String, vserver: String) {
        self.entry(device).1.push(vserver);
    }

    pub(crate) fn add_cs(&mut self, device: String, vserver: String) {
        self.entry(device).2.push(vserver);
    }

    fn entry(&mut self, device: String) -> &mut (String, Vec<String>, Vec<String>) {
        if let Some(pos) = self.devices.iter().position(|(name, _, _)| *name == device) {
            &mut self.devices[pos]
        } else {
            self.devices.push((device, Vec::new(), Vec::new()));
            self.devices.last_mut().unwrap()
        }
    }

    /// Render as a list of `{name, lb_vservers?, cs_vservers?}` objects;
    /// empty lists are omitted, matching the shape consumers expect
    pub(crate) fn into_list(self) -> Vec<Value> {
        self.devices
            .into_iter()
            .map(|(name, lb, cs)| {
                let mut object = Map::new();
                object.insert("name".to_string(), json!(name));
                if !lb.is_empty() {
                    object.insert("lb_vservers".to_string(), json!(lb));
                }
                if !cs.is_empty() {
                    object.insert("cs_vservers".to_string(), json!(cs));
                }
                Value::Object(object)
            })
            .collect()
    }

    /// Render as a map of device name to `{lb_vservers?, cs_vservers?}`
    pub(crate) fn into_map(self) -> Value {
        let mut result = Map::new();
        for (name, lb, cs) in self.devices {
            let mut object = Map::new();
            if !lb.is_empty() {
                object.insert("lb_vservers".to_string(), json!(lb));
            }
            if !cs.is_empty() {
                object.insert("cs_vservers".to_string(), json!(cs));
            }
            result.insert(name, Value::Object(object));
        }
        Value::Object(result)
    }
}

impl Lookup for IpToAdcLookup {
    fn name(&self) -> &'static str {
        "ip_to_adc"
    }

    fn description(&self) -> &'static str {
        "Lists the load-balancer devices and vservers servicing an IP address"
    }

    fn run(
        &self,
        terms: &[String],
        options: &Options,
        ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let adm = AdmSettings::from_options(options, ctx)?;
        let protocol = options.get_or("protocol", &ctx.config.adm.protocol);
        let api = adm.client(ctx)?;
        let domain = adm.domain();

        let mut ret = Vec::new();
        for term in terms {
            info!("ip_to_adc lookup term: {term}");
            let ip: IpAddr = term.parse().map_err(|_| {
                LookupError::InvalidArguments(format!("invalid IP address: '{term}'"))
            })?;

            let lb_vservers =
                resolve::lb_vservers_for_ip(&api, &adm.hostname, &ip.to_string(), &protocol)?;
            let cs_vservers =
                resolve::cs_vservers_for_ip(&api, &adm.hostname, &ip.to_string(), &protocol)?;
            if lb_vservers.is_empty() && cs_vservers.is_empty() {
                info!("no lb or cs vservers found on the manager for {ip}");
            }

            let mut devices = DeviceVservers::default();
            for vserver in &lb_vservers {
                let device = format!("{}.{}", resolve::str_field(vserver, "hostname"), domain);
                devices.add_lb(device, resolve::str_field(vserver, "name").to_string());
            }
            for vserver in &cs_vservers {
                let device = format!("{}.{}", resolve::str_field(vserver, "hostname"), domain);
                devices.add_cs(device, resolve::str_field(vserver, "name").to_string());
            }
            ret.push(Value::Array(devices.into_list()));
        }
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_device_grouping() {
        let mut devices = DeviceVservers::default();
        devices.add_lb("adc1.example.net".to_string(), "a_lb".to_string());
        devices.add_lb("adc1.example.net".to_string(), "b_lb".to_string());
        devices.add_cs("adc1.example.net".to_string(), "a_cs".to_string());
        devices.add_cs("adc2.example.net".to_string(), "c_cs".to_string());

        let list = devices.into_list();
        assert_eq!(
            list,
            vec![
                json!({
                    "name": "adc1.example.net",
                    "lb_vservers": ["a_lb", "b_lb"],
                    "cs_vservers": ["a_cs"],
                }),
                json!({
                    "name": "adc2.example.net",
                    "cs_vservers": ["c_cs"],
                }),
            ]
        );
    }

    #[test]
    fn test_invalid_ip_is_an_error() {
        let lookup = IpToAdcLookup::new();
        let mut options = Options::new();
        options.set("adm_hostname", "adm.example.net");
        options.set("username", "svc");
        options.set("password", "secret");
        let ctx = LookupContext::default();

        let result = lookup.run(&["not-an-ip".to_string()], &options, &ctx);
        assert!(matches!(result, Err(LookupError::InvalidArguments(_))));
    }
}
