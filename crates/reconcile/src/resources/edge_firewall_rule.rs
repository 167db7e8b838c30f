//! Edge gateway firewall rules.
//!
//! Each edge has its own firewall configuration under one `ETag`. Rules are
//! addressed `<edge_id>_<name>`; the numeric rule id the edge assigns is kept
//! as a computed field.

use crate::coordinator::{Snapshot, with_current_version};
use crate::drift::{Drift, FieldChange};
use crate::error::{Error, Result};
use crate::handle;
use crate::kind::ResourceKind;
use crate::lifecycle::{Deletion, Lifecycle, Phase, Tracked};
use crate::poller::{PollOptions, confirm_absent};
use crate::remote::Subject;
use nsxkit::Transport;
use nsxkit::api::edge_firewall::{self, EdgeApplication, EdgeEndpoint, EdgeFirewallConfig, EdgeRule};
use serde::{Deserialize, Serialize};

wire_enum! {
    #[derive(Default)]
    pub enum EdgeRuleType {
        #[default]
        User => "user",
        InternalHigh => "internal_high",
        InternalLow => "internal_low",
        DefaultPolicy => "default_policy",
    }
}

wire_enum! {
    #[derive(Default)]
    pub enum EdgeAction {
        #[default]
        Accept => "accept",
        Deny => "deny",
        Reject => "reject",
    }
}

/// Source or destination match of an edge rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeEndpointSpec {
    #[serde(default)]
    pub exclude: bool,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    #[serde(default)]
    pub grouping_object_ids: Vec<String>,
}

impl EdgeEndpointSpec {
    fn to_wire(&self) -> EdgeEndpoint {
        EdgeEndpoint {
            exclude: self.exclude,
            ip_address: self.ip_addresses.clone(),
            grouping_object_id: self.grouping_object_ids.clone(),
        }
    }

    fn from_wire(endpoint: &EdgeEndpoint) -> Self {
        Self {
            exclude: endpoint.exclude,
            ip_addresses: endpoint.ip_address.clone(),
            grouping_object_ids: endpoint.grouping_object_id.clone(),
        }
    }

    fn render(endpoint: Option<&Self>) -> String {
        let Some(endpoint) = endpoint else {
            return "any".to_string();
        };
        let mut members: Vec<&str> = endpoint
            .ip_addresses
            .iter()
            .chain(&endpoint.grouping_object_ids)
            .map(String::as_str)
            .collect();
        members.sort_unstable();
        let prefix = if endpoint.exclude { "not " } else { "" };
        format!("{prefix}[{}]", members.join(", "))
    }

    fn same(a: Option<&Self>, b: Option<&Self>) -> bool {
        Self::render(a) == Self::render(b)
    }
}

const fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeFirewallRuleSpec {
    pub edge_id: String,
    pub name: String,
    #[serde(default)]
    pub rule_type: EdgeRuleType,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub logging_enabled: bool,
    #[serde(default)]
    pub action: EdgeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EdgeEndpointSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<EdgeEndpointSpec>,
    #[serde(default)]
    pub application_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl EdgeFirewallRuleSpec {
    pub fn new(edge_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            edge_id: edge_id.into(),
            name: name.into(),
            rule_type: EdgeRuleType::default(),
            description: String::new(),
            enabled: true,
            logging_enabled: false,
            action: EdgeAction::default(),
            source: None,
            destination: None,
            application_ids: Vec::new(),
            rule_id: None,
        }
    }

    pub fn handle(&self) -> String {
        handle::join(&self.edge_id, &self.name)
    }

    fn validate(&self) -> Result<()> {
        let subject = Subject::new(ResourceKind::EdgeFirewallRule, &self.name);
        if self.name.is_empty() {
            return Err(subject.validation("name is required"));
        }
        if self.edge_id.is_empty() {
            return Err(subject.validation("edge_id is required"));
        }
        if self.edge_id.contains('_') {
            return Err(subject.validation(format!(
                "edge id '{}' must not contain '_'",
                self.edge_id
            )));
        }
        Ok(())
    }

    fn to_rule(&self) -> EdgeRule {
        EdgeRule {
            rule_id: self.rule_id.clone(),
            name: self.name.clone(),
            rule_type: self.rule_type.to_string(),
            enabled: self.enabled,
            logging_enabled: self.logging_enabled,
            description: self.description.clone(),
            action: self.action.to_string(),
            source: self.source.as_ref().map(EdgeEndpointSpec::to_wire),
            destination: self.destination.as_ref().map(EdgeEndpointSpec::to_wire),
            application: (!self.application_ids.is_empty()).then(|| EdgeApplication {
                application_id: self.application_ids.clone(),
            }),
        }
    }

    fn from_rule(edge_id: &str, rule: &EdgeRule) -> Result<Self> {
        let subject = Subject::new(ResourceKind::EdgeFirewallRule, &rule.name);
        Ok(Self {
            edge_id: edge_id.to_string(),
            name: rule.name.clone(),
            rule_type: if rule.rule_type.is_empty() {
                EdgeRuleType::default()
            } else {
                rule.rule_type.parse().map_err(|e| subject.validation(e))?
            },
            description: rule.description.clone(),
            enabled: rule.enabled,
            logging_enabled: rule.logging_enabled,
            action: rule.action.parse().map_err(|e| subject.validation(e))?,
            source: rule.source.as_ref().map(EdgeEndpointSpec::from_wire),
            destination: rule.destination.as_ref().map(EdgeEndpointSpec::from_wire),
            application_ids: rule
                .application
                .as_ref()
                .map(|a| a.application_id.clone())
                .unwrap_or_default(),
            rule_id: rule.rule_id.clone(),
        })
    }

    pub fn drift(&self, current: &Self) -> Vec<FieldChange> {
        let mut drift = Drift::new();
        drift
            .value("rule_type", &current.rule_type, &self.rule_type)
            .value("description", &current.description, &self.description)
            .value("enabled", &current.enabled, &self.enabled)
            .value("logging_enabled", &current.logging_enabled, &self.logging_enabled)
            .value("action", &current.action, &self.action)
            .list("application_ids", &current.application_ids, &self.application_ids);
        for (field, now, want) in [
            ("source", current.source.as_ref(), self.source.as_ref()),
            ("destination", current.destination.as_ref(), self.destination.as_ref()),
        ] {
            if !EdgeEndpointSpec::same(now, want) {
                drift.value(
                    field,
                    &EdgeEndpointSpec::render(now),
                    &EdgeEndpointSpec::render(want),
                );
            }
        }
        drift.finish()
    }
}

/// Lifecycle controller for edge firewall rules.
pub struct EdgeFirewallRules<'a> {
    transport: &'a dyn Transport,
    poll: PollOptions,
}

impl<'a> EdgeFirewallRules<'a> {
    pub fn new(transport: &'a dyn Transport, poll: PollOptions) -> Self {
        Self { transport, poll }
    }

    fn config(&self, edge_id: &str, name: &str) -> Result<Option<Snapshot<EdgeFirewallConfig>>> {
        Subject::new(Self::KIND, name).fetch_versioned(self.transport, &edge_firewall::get_config(edge_id))
    }

    fn missing_edge(edge_id: &str, name: &str) -> Error {
        Error::NotFound {
            kind: Self::KIND,
            name: name.to_string(),
            within: Some(format!("missing edge {edge_id}")),
        }
    }

    fn rule_id_of(rule: &EdgeRule) -> Result<String> {
        rule.rule_id
            .clone()
            .ok_or_else(|| Subject::new(Self::KIND, &rule.name).validation("edge returned a rule without an id"))
    }
}

impl Lifecycle for EdgeFirewallRules<'_> {
    type Spec = EdgeFirewallRuleSpec;

    const KIND: ResourceKind = ResourceKind::EdgeFirewallRule;

    fn create(&self, spec: &EdgeFirewallRuleSpec) -> Result<Tracked<EdgeFirewallRuleSpec>> {
        spec.validate()?;
        let subject = Subject::new(Self::KIND, &spec.name);
        let mut rule = spec.to_rule();
        rule.rule_id = None;

        let read = || self.config(&spec.edge_id, &spec.name);
        with_current_version(Self::KIND, &spec.name, read, |snapshot| {
            if snapshot.document.rule_named(&spec.name).is_some() {
                return Err(Error::AlreadyExists {
                    kind: Self::KIND,
                    scope: format!("edge {}", spec.edge_id),
                    name: spec.name.clone(),
                });
            }
            let etag = snapshot.token.etag().unwrap_or_default();
            let request = edge_firewall::create(&spec.edge_id, etag, &rule)
                .map_err(|e| Error::transport(Self::KIND, &spec.name, e))?;
            subject.send(self.transport, &request)?;
            Ok(())
        })?
        .ok_or_else(|| Self::missing_edge(&spec.edge_id, &spec.name))?;

        // The batch response does not echo ids; find the rule by name.
        let rule_id = self
            .config(&spec.edge_id, &spec.name)?
            .and_then(|s| s.document.rule_named(&spec.name).cloned())
            .ok_or_else(|| Error::not_found(Self::KIND, &spec.name))
            .and_then(|r| Self::rule_id_of(&r))?;
        log::info!("Created edge rule {} ({}) on {}", spec.name, rule_id, spec.edge_id);

        let mut created = spec.clone();
        created.rule_id = Some(rule_id);
        Ok(Tracked::new(spec.handle(), Phase::Created, created))
    }

    fn read(&self, handle: &str) -> Result<Option<Tracked<EdgeFirewallRuleSpec>>> {
        let (edge_id, name) = handle::split_scoped(Self::KIND, handle)?;
        let Some(snapshot) = self.config(&edge_id, &name)? else {
            log::debug!("edge {edge_id} not found");
            return Ok(None);
        };
        snapshot
            .document
            .rule_named(&name)
            .map(|rule| {
                let spec = EdgeFirewallRuleSpec::from_rule(&edge_id, rule)?;
                Ok(Tracked::new(handle, Phase::Read, spec))
            })
            .transpose()
    }

    fn update(
        &self,
        handle: &str,
        spec: &EdgeFirewallRuleSpec,
    ) -> Result<Option<Tracked<EdgeFirewallRuleSpec>>> {
        spec.validate()?;
        let (edge_id, name) = handle::split_scoped(Self::KIND, handle)?;
        let subject = Subject::new(Self::KIND, &name);
        if edge_id != spec.edge_id || name != spec.name {
            return Err(subject.validation(format!(
                "handle {handle} does not match {}; edge and name cannot change in place",
                spec.handle()
            )));
        }

        let read = || self.config(&edge_id, &name);
        let written = with_current_version(Self::KIND, &name, read, |snapshot| {
            let Some(current) = snapshot.document.rule_named(&name) else {
                return Ok(None);
            };
            let rule_id = Self::rule_id_of(current)?;
            let mut rule = spec.to_rule();
            rule.rule_id = Some(rule_id.clone());

            let etag = snapshot.token.etag().unwrap_or_default();
            let request = edge_firewall::update(&edge_id, &rule_id, etag, &rule)
                .map_err(|e| Error::transport(Self::KIND, &name, e))?;
            subject.send(self.transport, &request)?;
            Ok(Some(rule_id))
        })?
        .flatten();

        Ok(written.map(|rule_id| {
            log::info!("Updated edge rule {name} ({rule_id}) on {edge_id}");
            let mut updated = spec.clone();
            updated.rule_id = Some(rule_id);
            Tracked::new(handle, Phase::Updated, updated)
        }))
    }

    fn delete(&self, handle: &str) -> Result<Deletion> {
        let (edge_id, name) = handle::split_scoped(Self::KIND, handle)?;
        let subject = Subject::new(Self::KIND, &name);

        let read = || self.config(&edge_id, &name);
        let deleted = with_current_version(Self::KIND, &name, read, |snapshot| {
            let Some(current) = snapshot.document.rule_named(&name) else {
                return Ok(false);
            };
            let rule_id = Self::rule_id_of(current)?;
            let etag = snapshot.token.etag().unwrap_or_default();
            subject.send(self.transport, &edge_firewall::delete(&edge_id, &rule_id, etag))?;
            Ok(true)
        })?
        .unwrap_or(false);

        if !deleted {
            log::debug!("edge rule {handle} already absent");
            return Ok(Deletion::AlreadyAbsent);
        }

        let scope = format!("edge {edge_id}");
        confirm_absent(Self::KIND, &scope, &name, self.poll, || {
            Ok(self
                .config(&edge_id, &name)?
                .is_some_and(|s| s.document.rule_named(&name).is_some()))
        })?;
        log::info!("Deleted edge rule {name} from {edge_id}");
        Ok(Deletion::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsxkit::{Method, MockTransport, Response};
    use std::time::Duration;

    const CONFIG: &str = "/api/4.0/edges/edge-1/firewall/config";
    const RULES: &str = "/api/4.0/edges/edge-1/firewall/config/rules";
    const RULE: &str = "/api/4.0/edges/edge-1/firewall/config/rules/131074";

    const SSH: &str = r#"{"ruleId":"131074","name":"ssh","ruleType":"user","enabled":true,
        "action":"accept","source":{"exclude":true,"ipAddress":["10.0.0.1"]},
        "application":{"applicationId":["application-22"]}}"#;

    fn respond_config(mock: &MockTransport, rules: &str, etag: &str) {
        mock.respond(
            Method::Get,
            CONFIG,
            Response::ok(format!(r#"{{"enabled":true,"firewallRules":[{rules}]}}"#)).with_etag(etag),
        );
    }

    fn spec() -> EdgeFirewallRuleSpec {
        let mut spec = EdgeFirewallRuleSpec::new("edge-1", "ssh");
        spec.source = Some(EdgeEndpointSpec {
            exclude: true,
            ip_addresses: vec!["10.0.0.1".into()],
            grouping_object_ids: Vec::new(),
        });
        spec.application_ids = vec!["application-22".into()];
        spec
    }

    fn controller(mock: &MockTransport) -> EdgeFirewallRules<'_> {
        EdgeFirewallRules::new(mock, PollOptions::default())
    }

    #[test]
    fn test_defaults_from_manifest() {
        let spec: EdgeFirewallRuleSpec = toml::from_str(
            r#"
            edge_id = "edge-1"
            name = "ssh"
            "#,
        )
        .unwrap();
        assert!(spec.enabled);
        assert!(!spec.logging_enabled);
        assert_eq!(spec.action, EdgeAction::Accept);
        assert_eq!(spec.rule_type, EdgeRuleType::User);
    }

    #[test]
    fn test_create_resolves_rule_id_by_name() {
        let mock = MockTransport::new();
        respond_config(&mock, "", "\"4\"");
        respond_config(&mock, SSH, "\"5\"");
        mock.respond(Method::Post, RULES, Response::new(201, ""));

        let tracked = controller(&mock).create(&spec()).unwrap();
        assert_eq!(tracked.handle, "edge-1_ssh");
        assert_eq!(tracked.spec.rule_id.as_deref(), Some("131074"));

        let post = &mock.calls_to(Method::Post, RULES)[0];
        assert_eq!(post.etag(), Some("\"4\""));
        let body: serde_json::Value = post.body_json().unwrap();
        let rule = &body["firewallRules"][0];
        assert_eq!(rule["source"]["exclude"], true);
        assert_eq!(rule["application"]["applicationId"][0], "application-22");
    }

    #[test]
    fn test_create_existing_name_fails() {
        let mock = MockTransport::new();
        respond_config(&mock, SSH, "\"4\"");
        let err = controller(&mock).create(&spec()).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_create_on_missing_edge() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, CONFIG, Response::new(404, ""));
        let err = controller(&mock).create(&spec()).unwrap_err();
        assert!(matches!(err, Error::NotFound { within: Some(_), .. }));
    }

    #[test]
    fn test_read_honours_exclude() {
        let mock = MockTransport::new();
        respond_config(&mock, SSH, "\"4\"");
        let tracked = controller(&mock).read("edge-1_ssh").unwrap().unwrap();
        assert_eq!(tracked.spec, EdgeFirewallRuleSpec {
            rule_id: Some("131074".into()),
            ..spec()
        });
        assert!(controller(&mock).read("edge-1_http").unwrap().is_none());
        assert!(controller(&mock).read("nounderscore").is_err());
    }

    #[test]
    fn test_update_sends_fresh_etag() {
        let mock = MockTransport::new();
        respond_config(&mock, SSH, "\"8\"");
        mock.respond(Method::Put, RULE, Response::ok(""));

        let mut desired = spec();
        desired.action = EdgeAction::Deny;
        desired.rule_id = Some("stale".into());
        let tracked = controller(&mock).update("edge-1_ssh", &desired).unwrap().unwrap();
        assert_eq!(tracked.spec.rule_id.as_deref(), Some("131074"));

        let put = &mock.calls_to(Method::Put, RULE)[0];
        assert_eq!(put.etag(), Some("\"8\""));
        let body: EdgeRule = put.body_json().unwrap();
        assert_eq!(body.action, "deny");
        assert_eq!(body.rule_id.as_deref(), Some("131074"));
    }

    #[test]
    fn test_update_rejects_rename() {
        let mock = MockTransport::new();
        let mut desired = spec();
        desired.name = "ssh2".into();
        assert!(matches!(
            controller(&mock).update("edge-1_ssh", &desired),
            Err(Error::Validation { .. })
        ));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_delete_polls_until_gone() {
        let mock = MockTransport::new();
        respond_config(&mock, SSH, "\"8\"");
        respond_config(&mock, SSH, "\"9\"");
        respond_config(&mock, "", "\"9\"");
        mock.respond(Method::Delete, RULE, Response::ok(""));

        let rules = EdgeFirewallRules::new(&mock, PollOptions {
            attempts: 3,
            interval: Duration::ZERO,
        });
        assert_eq!(rules.delete("edge-1_ssh").unwrap(), Deletion::Deleted);
        assert_eq!(mock.calls_to(Method::Delete, RULE)[0].etag(), Some("\"8\""));
        assert_eq!(mock.calls_to(Method::Get, CONFIG).len(), 3);
    }

    #[test]
    fn test_delete_times_out() {
        let mock = MockTransport::new();
        respond_config(&mock, SSH, "\"8\"");
        mock.respond(Method::Delete, RULE, Response::ok(""));

        let err = controller(&mock).delete("edge-1_ssh").unwrap_err();
        assert!(matches!(err, Error::Timeout { attempts: 3, .. }));
    }

    #[test]
    fn test_drift_endpoint_order_insensitive() {
        let mut current = spec();
        current.source = Some(EdgeEndpointSpec {
            exclude: true,
            ip_addresses: vec!["10.0.0.2".into(), "10.0.0.1".into()],
            grouping_object_ids: Vec::new(),
        });
        let mut desired = spec();
        desired.source = Some(EdgeEndpointSpec {
            exclude: true,
            ip_addresses: vec!["10.0.0.1".into(), "10.0.0.2".into()],
            grouping_object_ids: Vec::new(),
        });
        assert!(desired.drift(&current).is_empty());

        desired.source.as_mut().unwrap().exclude = false;
        let changes = desired.drift(&current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].to, "[10.0.0.1, 10.0.0.2]");
    }
}
