//! Edge gateway firewall rules.

use super::Extra;
use crate::error::Result;
use crate::transport::Request;
use serde::{Deserialize, Serialize};

fn config_path(edge_id: &str) -> String {
    format!("/api/4.0/edges/{edge_id}/firewall/config")
}

/// An edge's firewall configuration, versioned by the response `ETag`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeFirewallConfig {
    #[serde(default)]
    pub firewall_rules: Vec<EdgeRule>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl EdgeFirewallConfig {
    #[must_use]
    pub fn rule_named(&self, name: &str) -> Option<&EdgeRule> {
        self.firewall_rules.iter().find(|r| r.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub rule_type: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub logging_enabled: bool,
    #[serde(default)]
    pub description: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EdgeEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<EdgeEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<EdgeApplication>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeEndpoint {
    #[serde(default)]
    pub exclude: bool,
    #[serde(default)]
    pub ip_address: Vec<String>,
    #[serde(default)]
    pub grouping_object_id: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeApplication {
    #[serde(default)]
    pub application_id: Vec<String>,
}

/// Body of a rule create: the API accepts a batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleBatch<'a> {
    firewall_rules: [&'a EdgeRule; 1],
}

pub fn get_config(edge_id: &str) -> Request {
    Request::get(config_path(edge_id))
}

pub fn create(edge_id: &str, etag: &str, rule: &EdgeRule) -> Result<Request> {
    Ok(Request::post(format!("{}/rules", config_path(edge_id)))
        .json(&RuleBatch {
            firewall_rules: [rule],
        })?
        .if_match(etag))
}

pub fn update(edge_id: &str, rule_id: &str, etag: &str, rule: &EdgeRule) -> Result<Request> {
    Ok(Request::put(format!("{}/rules/{rule_id}", config_path(edge_id)))
        .json(rule)?
        .if_match(etag))
}

pub fn delete(edge_id: &str, rule_id: &str, etag: &str) -> Request {
    Request::delete(format!("{}/rules/{rule_id}", config_path(edge_id))).if_match(etag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_named() {
        let config: EdgeFirewallConfig = serde_json::from_str(
            r#"{"enabled":true,"firewallRules":[
                {"ruleId":"131074","name":"ssh","ruleType":"user","enabled":true,"action":"accept",
                 "source":{"exclude":true,"ipAddress":["10.0.0.1"]}}
            ]}"#,
        )
        .unwrap();
        let rule = config.rule_named("ssh").unwrap();
        assert_eq!(rule.rule_id.as_deref(), Some("131074"));
        assert!(rule.source.as_ref().unwrap().exclude);
        assert!(config.rule_named("ss").is_none());
        assert_eq!(config.extra["enabled"], true);
    }

    #[test]
    fn test_create_wraps_rule_in_batch() {
        let rule = EdgeRule {
            name: "ssh".into(),
            action: "accept".into(),
            ..EdgeRule::default()
        };
        let req = create("edge-1", "\"9\"", &rule).unwrap();
        assert_eq!(req.path(), "/api/4.0/edges/edge-1/firewall/config/rules");
        assert_eq!(req.etag(), Some("\"9\""));
        let body: serde_json::Value = req.body_json().unwrap();
        assert_eq!(body["firewallRules"][0]["name"], "ssh");
    }

    #[test]
    fn test_rule_paths() {
        let delete = delete("edge-1", "131074", "\"9\"");
        assert_eq!(delete.path(), "/api/4.0/edges/edge-1/firewall/config/rules/131074");
        assert_eq!(delete.etag(), Some("\"9\""));
    }
}
