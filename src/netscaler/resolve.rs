//! Multi-hop resolution over the configuration API.
//!
//! The resolution plugins all walk the same chain: manager inventory by IP,
//! content-switching policy evaluation on the owning device, then service and
//! service-group bindings down to the backend servers. The walk lives here
//! once, written against the [`NitroApi`] seam so it can be exercised with
//! fixture data.

use serde_json::{json, Value};
use tracing::{debug, trace};

use super::nitro::{self, resource, NitroApi};
use super::policy;
use crate::lookup::{LookupError, LookupResult};

/// Manager protocol tag for a URL scheme
pub fn protocol_for_url(url: &str) -> LookupResult<&'static str> {
    let lower = url.to_lowercase();
    if lower.starts_with("https://") {
        Ok("SSL")
    } else if lower.starts_with("http://") {
        Ok("HTTP")
    } else {
        Err(LookupError::InvalidArguments(
            "URL should start with 'http://' or 'https://'".to_string(),
        ))
    }
}

/// Hostname part of a URL, lowercased
pub fn url_hostname(url: &str) -> String {
    let url = url.to_lowercase();
    let bare = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(&url);
    bare.split('/').next().unwrap_or_default().to_string()
}

/// Array under `key` of an API response, or empty when absent
pub fn list_of(value: &Value, key: &str) -> Vec<Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// String field of an API object, or empty when absent
pub fn str_field<'a>(obj: &'a Value, key: &str) -> &'a str {
    obj.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Load-balancing vservers the manager knows for an IP and protocol
pub fn lb_vservers_for_ip(
    api: &dyn NitroApi,
    adm_host: &str,
    ip: &str,
    protocol: &str,
) -> LookupResult<Vec<Value>> {
    let path = nitro::inventory_path(resource::ADM_LB_VSERVER, ip, protocol);
    Ok(list_of(&api.get(adm_host, &path)?, resource::ADM_LB_VSERVER))
}

/// Content-switching vservers the manager knows for an IP and protocol
pub fn cs_vservers_for_ip(
    api: &dyn NitroApi,
    adm_host: &str,
    ip: &str,
    protocol: &str,
) -> LookupResult<Vec<Value>> {
    let path = nitro::inventory_path(resource::ADM_CS_VSERVER, ip, protocol);
    Ok(list_of(&api.get(adm_host, &path)?, resource::ADM_CS_VSERVER))
}

/// First matching vserver record for an IP, content-switch entries preferred.
///
/// The record carries the vserver name, its type (`cs`/`lb`), the owning
/// device qualified with `domain`, and the queried IP.
pub fn first_vserver_for_ip(
    api: &dyn NitroApi,
    adm_host: &str,
    domain: &str,
    ip: &str,
    protocol: &str,
) -> LookupResult<Option<Value>> {
    let cs = cs_vservers_for_ip(api, adm_host, ip, protocol)?;
    if let Some(vserver) = cs.first() {
        return Ok(Some(vserver_record(vserver, "cs", domain, ip)));
    }
    let lb = lb_vservers_for_ip(api, adm_host, ip, protocol)?;
    if let Some(vserver) = lb.first() {
        return Ok(Some(vserver_record(vserver, "lb", domain, ip)));
    }
    debug!("no lb or cs vservers found on the manager for {ip}");
    Ok(None)
}

fn vserver_record(vserver: &Value, kind: &str, domain: &str, ip: &str) -> Value {
    json!({
        "name": str_field(vserver, "name"),
        "type": kind,
        "load_balancer": format!("{}.{}", str_field(vserver, "hostname"), domain),
        "ip_address": ip,
    })
}

fn priority_of(policy: &Value) -> i64 {
    let parsed = match policy.get("priority") {
        Some(Value::String(s)) => s.parse().ok(),
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        trace!(
            "policy {} has no usable priority, sorting last",
            str_field(policy, "policyname")
        );
        i64::MAX
    })
}

/// Walk the content-switching policy bindings of a vserver in ascending
/// priority order and return the load-balancing vserver that would receive
/// `url`. Evaluation stops at the first matching policy; no match falls
/// through to `default_target`. A binding without an inline rule triggers a
/// fallback fetch of the full policy object.
pub fn resolve_cs_target(
    api: &dyn NitroApi,
    adc_host: &str,
    cs_name: &str,
    url: &str,
    default_target: String,
) -> LookupResult<String> {
    let path = nitro::object_path(resource::CS_POLICY_BINDING, cs_name);
    let mut policies = list_of(&api.get(adc_host, &path)?, resource::CS_POLICY_BINDING);
    policies.sort_by_key(priority_of);

    for policy in &policies {
        let name = str_field(policy, "policyname");
        let mut rule = str_field(policy, "rule").to_string();
        if rule.is_empty() {
            trace!("policy rule not found for {name}, fetching the policy object");
            let path = nitro::object_path(resource::CS_POLICY, name);
            let fetched = list_of(&api.get(adc_host, &path)?, resource::CS_POLICY);
            if let Some(object) = fetched.first() {
                rule = str_field(object, "rule").to_string();
            }
        }
        debug!("evaluating policy {name}");
        if policy::policy_match(url, &rule) {
            let target = str_field(policy, "targetlbvserver").to_string();
            debug!("found matching policy, target load balancer {target}");
            return Ok(target);
        }
    }
    Ok(default_target)
}

/// Resolve the load-balancing vserver behind a named vserver on a device:
/// the vserver itself for `lb`, the policy-evaluated target for `cs`.
pub fn resolve_target_lbvserver(
    api: &dyn NitroApi,
    adc_host: &str,
    name: &str,
    kind: &str,
    url: &str,
) -> LookupResult<String> {
    if kind == "lb" {
        let path = nitro::object_path(resource::LB_VSERVER, name);
        let vservers = list_of(&api.get(adc_host, &path)?, resource::LB_VSERVER);
        let vserver = vservers.first().ok_or_else(|| {
            LookupError::NotFound(format!("lbvserver '{name}' not found on {adc_host}"))
        })?;
        Ok(str_field(vserver, "name").to_string())
    } else {
        let path = nitro::object_path(resource::CS_VSERVER, name);
        let vservers = list_of(&api.get(adc_host, &path)?, resource::CS_VSERVER);
        let vserver = vservers.first().ok_or_else(|| {
            LookupError::NotFound(format!("csvserver '{name}' not found on {adc_host}"))
        })?;
        let default_target = str_field(vserver, "lbvserver").to_string();
        resolve_cs_target(api, adc_host, name, url, default_target)
    }
}

/// Enumerate every backend server bound to a load-balancing vserver, walking
/// direct service bindings and service-group memberships in traversal order.
pub fn backends_for_lbvserver(
    api: &dyn NitroApi,
    adc_host: &str,
    lb_name: &str,
) -> LookupResult<Vec<Value>> {
    let mut servers = Vec::new();

    let path = nitro::object_path(resource::SERVICE_BINDING, lb_name);
    let bindings = list_of(&api.get(adc_host, &path)?, resource::SERVICE_BINDING);
    for binding in &bindings {
        let path = nitro::object_path(resource::SERVICE, str_field(binding, "servicename"));
        let services = list_of(&api.get(adc_host, &path)?, resource::SERVICE);
        for service in &services {
            let path = nitro::object_path(resource::SERVER, str_field(service, "servername"));
            servers.extend(list_of(&api.get(adc_host, &path)?, resource::SERVER));
        }
    }

    let path = nitro::object_path(resource::SERVICEGROUP_BINDING, lb_name);
    let bindings = list_of(&api.get(adc_host, &path)?, resource::SERVICEGROUP_BINDING);
    for binding in &bindings {
        let path = nitro::object_path(
            resource::SERVICEGROUP_MEMBER_BINDING,
            str_field(binding, "servicename"),
        );
        let members = list_of(&api.get(adc_host, &path)?, resource::SERVICEGROUP_MEMBER_BINDING);
        for member in &members {
            let path = nitro::object_path(resource::SERVER, str_field(member, "servername"));
            servers.extend(list_of(&api.get(adc_host, &path)?, resource::SERVER));
        }
    }

    Ok(servers)
}

/// Backend servers for a URL already resolved to addresses: the
/// `url_to_backend` walk. Queries the manager inventory per IP, resolves
/// content-switching policies on the owning devices (addressed by their
/// device IP), and accumulates every reachable backend.
pub fn backends_for_url(
    api: &dyn NitroApi,
    adm_host: &str,
    url: &str,
    ips: &[String],
) -> LookupResult<Vec<Value>> {
    let protocol = protocol_for_url(url)?;
    let mut servers = Vec::new();

    for ip in ips {
        let lb_vservers = lb_vservers_for_ip(api, adm_host, ip, protocol)?;
        let cs_vservers = cs_vservers_for_ip(api, adm_host, ip, protocol)?;
        if lb_vservers.is_empty() && cs_vservers.is_empty() {
            debug!("no lb or cs vservers found on the manager for {ip}");
        }

        // (device address, target lb vserver name)
        let mut targets: Vec<(String, String)> = Vec::new();
        for vserver in &lb_vservers {
            targets.push((
                str_field(vserver, "ns_ip_address").to_string(),
                str_field(vserver, "name").to_string(),
            ));
        }
        for vserver in &cs_vservers {
            let device = str_field(vserver, "ns_ip_address").to_string();
            let default_target = str_field(vserver, "targetlbvserver").to_string();
            let target = resolve_cs_target(
                api,
                &device,
                str_field(vserver, "name"),
                url,
                default_target,
            )?;
            targets.push((device, target));
        }

        for (device, target) in &targets {
            if target.is_empty() {
                continue;
            }
            servers.extend(backends_for_lbvserver(api, device, target)?);
        }
    }

    Ok(servers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// In-memory [`NitroApi`] over a (host, path) -> response map
    struct FixtureApi {
        responses: HashMap<String, Value>,
    }

    impl FixtureApi {
        fn new(entries: &[(&str, &str, Value)]) -> Self {
            let responses = entries
                .iter()
                .map(|(host, path, value)| (format!("{host}{path}"), value.clone()))
                .collect();
            Self { responses }
        }
    }

    impl NitroApi for FixtureApi {
        fn get(&self, host: &str, path: &str) -> LookupResult<Value> {
            self.responses
                .get(&format!("{host}{path}"))
                .cloned()
                .ok_or_else(|| {
                    LookupError::Http(format!("http error 404: no fixture for {host}{path}"))
                })
        }
    }

    #[test]
    fn test_protocol_for_url() {
        assert_eq!(protocol_for_url("https://a.example.com/x").unwrap(), "SSL");
        assert_eq!(protocol_for_url("HTTP://a.example.com").unwrap(), "HTTP");
        assert!(matches!(
            protocol_for_url("ftp://a.example.com"),
            Err(LookupError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_url_hostname() {
        assert_eq!(url_hostname("https://a.example.com/x/y"), "a.example.com");
        assert_eq!(url_hostname("http://a.example.com"), "a.example.com");
        assert_eq!(url_hostname("HTTPS://A.Example.COM/x"), "a.example.com");
    }

    #[test]
    fn test_policies_evaluate_in_priority_order_first_match_wins() {
        let api = FixtureApi::new(&[(
            "10.1.0.1",
            "/nitro/v1/config/csvserver_cspolicy_binding/shop_cs",
            json!({"csvserver_cspolicy_binding": [
                // listed out of order on purpose; "120" would also match
                {"policyname": "pol_late", "priority": "120",
                 "rule": "http.req.url.startswith(\"/images\")",
                 "targetlbvserver": "late_lb"},
                {"policyname": "pol_early", "priority": "90",
                 "rule": "http.req.url.startswith(\"/images\")",
                 "targetlbvserver": "early_lb"},
                {"policyname": "pol_first", "priority": "100",
                 "rule": "http.req.hostname.eq(\"nomatch.example.com\")",
                 "targetlbvserver": "other_lb"},
            ]}),
        )]);

        let target = resolve_cs_target(
            &api,
            "10.1.0.1",
            "shop_cs",
            "https://shop.example.com/images/logo.png",
            "default_lb".to_string(),
        )
        .unwrap();
        assert_eq!(target, "early_lb");
    }

    #[test]
    fn test_no_matching_policy_falls_through_to_default() {
        let api = FixtureApi::new(&[(
            "10.1.0.1",
            "/nitro/v1/config/csvserver_cspolicy_binding/shop_cs",
            json!({"csvserver_cspolicy_binding": [
                {"policyname": "pol_images", "priority": "100",
                 "rule": "http.req.url.startswith(\"/images\")",
                 "targetlbvserver": "images_lb"},
            ]}),
        )]);

        let target = resolve_cs_target(
            &api,
            "10.1.0.1",
            "shop_cs",
            "https://shop.example.com/api/v1",
            "default_lb".to_string(),
        )
        .unwrap();
        assert_eq!(target, "default_lb");
    }

    #[test]
    fn test_empty_rule_triggers_policy_fetch() {
        let api = FixtureApi::new(&[
            (
                "10.1.0.1",
                "/nitro/v1/config/csvserver_cspolicy_binding/shop_cs",
                json!({"csvserver_cspolicy_binding": [
                    {"policyname": "pol_images", "priority": "100",
                     "targetlbvserver": "images_lb"},
                ]}),
            ),
            (
                "10.1.0.1",
                "/nitro/v1/config/cspolicy/pol_images",
                json!({"cspolicy": [
                    {"policyname": "pol_images",
                     "rule": "http.req.url.startswith(\"/images\")"},
                ]}),
            ),
        ]);

        let target = resolve_cs_target(
            &api,
            "10.1.0.1",
            "shop_cs",
            "https://shop.example.com/images/logo.png",
            "default_lb".to_string(),
        )
        .unwrap();
        assert_eq!(target, "images_lb");
    }

    #[test]
    fn test_backends_walk_services_and_servicegroups() {
        let api = FixtureApi::new(&[
            (
                "10.1.0.1",
                "/nitro/v1/config/lbvserver_service_binding/shop_lb",
                json!({"lbvserver_service_binding": [
                    {"servicename": "svc_a"},
                ]}),
            ),
            (
                "10.1.0.1",
                "/nitro/v1/config/service/svc_a",
                json!({"service": [{"name": "svc_a", "servername": "srv_a"}]}),
            ),
            (
                "10.1.0.1",
                "/nitro/v1/config/server/srv_a",
                json!({"server": [{"name": "srv_a", "ipaddress": "10.2.0.1"}]}),
            ),
            (
                "10.1.0.1",
                "/nitro/v1/config/lbvserver_servicegroup_binding/shop_lb",
                json!({"lbvserver_servicegroup_binding": [
                    {"servicename": "sg_shop"},
                ]}),
            ),
            (
                "10.1.0.1",
                "/nitro/v1/config/servicegroup_servicegroupmember_binding/sg_shop",
                json!({"servicegroup_servicegroupmember_binding": [
                    {"servername": "srv_b"},
                    {"servername": "srv_c"},
                ]}),
            ),
            (
                "10.1.0.1",
                "/nitro/v1/config/server/srv_b",
                json!({"server": [{"name": "srv_b", "ipaddress": "10.2.0.2"}]}),
            ),
            (
                "10.1.0.1",
                "/nitro/v1/config/server/srv_c",
                json!({"server": [{"name": "srv_c", "ipaddress": "10.2.0.3"}]}),
            ),
        ]);

        let servers = backends_for_lbvserver(&api, "10.1.0.1", "shop_lb").unwrap();
        let names: Vec<&str> = servers.iter().map(|s| str_field(s, "name")).collect();
        assert_eq!(names, vec!["srv_a", "srv_b", "srv_c"]);
    }

    #[test]
    fn test_resolve_target_lbvserver_lb_kind() {
        let api = FixtureApi::new(&[(
            "adc1.example.net",
            "/nitro/v1/config/lbvserver/shop_lb",
            json!({"lbvserver": [{"name": "shop_lb"}]}),
        )]);

        let target = resolve_target_lbvserver(
            &api,
            "adc1.example.net",
            "shop_lb",
            "lb",
            "https://shop.example.com/",
        )
        .unwrap();
        assert_eq!(target, "shop_lb");
    }

    #[test]
    fn test_resolve_target_lbvserver_missing_is_hard_error() {
        let api = FixtureApi::new(&[(
            "adc1.example.net",
            "/nitro/v1/config/lbvserver/ghost_lb",
            json!({"lbvserver": []}),
        )]);

        let result = resolve_target_lbvserver(
            &api,
            "adc1.example.net",
            "ghost_lb",
            "lb",
            "https://shop.example.com/",
        );
        assert!(matches!(result, Err(LookupError::NotFound(_))));
    }

    #[test]
    fn test_api_error_aborts_walk() {
        // no fixtures at all: the first call fails hard
        let api = FixtureApi::new(&[]);
        let result = backends_for_lbvserver(&api, "10.1.0.1", "shop_lb");
        assert!(matches!(result, Err(LookupError::Http(_))));
    }

    #[test]
    fn test_first_vserver_prefers_content_switch() {
        let api = FixtureApi::new(&[
            (
                "adm.example.net",
                "/nitro/v1/config/ns_csvserver?filter=vsvr_ip_address:203.0.113.10,vsvr_type:SSL",
                json!({"ns_csvserver": [
                    {"name": "shop_cs", "hostname": "adc1", "ns_ip_address": "10.1.0.1"},
                ]}),
            ),
            (
                "adm.example.net",
                "/nitro/v1/config/ns_lbvserver?filter=vsvr_ip_address:203.0.113.10,vsvr_type:SSL",
                json!({"ns_lbvserver": [
                    {"name": "shop_lb", "hostname": "adc1", "ns_ip_address": "10.1.0.1"},
                ]}),
            ),
        ]);

        let record = first_vserver_for_ip(
            &api,
            "adm.example.net",
            "example.net",
            "203.0.113.10",
            "SSL",
        )
        .unwrap()
        .unwrap();
        assert_eq!(str_field(&record, "name"), "shop_cs");
        assert_eq!(str_field(&record, "type"), "cs");
        assert_eq!(str_field(&record, "load_balancer"), "adc1.example.net");
        assert_eq!(str_field(&record, "ip_address"), "203.0.113.10");
    }
}
