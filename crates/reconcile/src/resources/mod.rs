//! Per-kind lifecycle controllers and the desired-resource union.

pub mod edge_firewall_rule;
pub mod firewall_rule;
pub mod ip_set;
pub mod security_policy_rule;
pub mod service;

pub use edge_firewall_rule::{EdgeFirewallRuleSpec, EdgeFirewallRules};
pub use firewall_rule::{FirewallRuleSpec, FirewallRules};
pub use ip_set::{IpSetSpec, IpSets};
pub use security_policy_rule::{SecurityPolicyRuleSpec, SecurityPolicyRules};
pub use service::{ServiceSpec, Services};

use crate::drift::FieldChange;
use crate::kind::ResourceKind;
use serde::{Deserialize, Serialize};

/// One declared network-security object of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DesiredResource {
    FirewallRule(FirewallRuleSpec),
    IpSet(IpSetSpec),
    SecurityPolicyRule(SecurityPolicyRuleSpec),
    Service(ServiceSpec),
    EdgeFirewallRule(EdgeFirewallRuleSpec),
}

impl DesiredResource {
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::FirewallRule(_) => ResourceKind::FirewallRule,
            Self::IpSet(_) => ResourceKind::IpSet,
            Self::SecurityPolicyRule(_) => ResourceKind::SecurityPolicyRule,
            Self::Service(_) => ResourceKind::Service,
            Self::EdgeFirewallRule(_) => ResourceKind::EdgeFirewallRule,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::FirewallRule(s) => &s.name,
            Self::IpSet(s) => &s.name,
            Self::SecurityPolicyRule(s) => &s.name,
            Self::Service(s) => &s.name,
            Self::EdgeFirewallRule(s) => &s.name,
        }
    }

    /// The scope or parent the name is unique within.
    #[must_use]
    pub fn scope(&self) -> String {
        match self {
            Self::FirewallRule(s) => s.section_id.to_string(),
            Self::IpSet(s) => s.scope.clone(),
            Self::SecurityPolicyRule(s) => s.policy_name.clone(),
            Self::Service(s) => s.scope.clone(),
            Self::EdgeFirewallRule(s) => s.edge_id.clone(),
        }
    }

    /// Stable identity of a declaration: `kind:scope/name`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}/{}", self.kind(), self.scope(), self.name())
    }

    /// Key of the remote document a write to this resource touches.
    ///
    /// Resources sharing a key must never be written concurrently.
    #[must_use]
    pub fn document_key(&self) -> String {
        match self {
            Self::FirewallRule(_) => "firewall_config".to_string(),
            Self::SecurityPolicyRule(s) => format!("policy:{}", s.policy_name),
            Self::EdgeFirewallRule(s) => format!("edge:{}", s.edge_id),
            Self::IpSet(_) | Self::Service(_) => self.address(),
        }
    }

    /// Fields where `current` differs from this declaration.
    ///
    /// Computed fields are ignored. Returns `None` when the kinds differ.
    #[must_use]
    pub fn drift(&self, current: &Self) -> Option<Vec<FieldChange>> {
        match (self, current) {
            (Self::FirewallRule(d), Self::FirewallRule(c)) => Some(d.drift(c)),
            (Self::IpSet(d), Self::IpSet(c)) => Some(d.drift(c)),
            (Self::SecurityPolicyRule(d), Self::SecurityPolicyRule(c)) => Some(d.drift(c)),
            (Self::Service(d), Self::Service(c)) => Some(d.drift(c)),
            (Self::EdgeFirewallRule(d), Self::EdgeFirewallRule(c)) => Some(d.drift(c)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementType, TypedElement};

    fn ip_set(name: &str) -> DesiredResource {
        DesiredResource::IpSet(IpSetSpec {
            scope: "globalroot-0".into(),
            name: name.into(),
            description: String::new(),
            value: "10.0.0.1".into(),
            object_id: None,
        })
    }

    #[test]
    fn test_address_and_document_keys() {
        assert_eq!(ip_set("web").address(), "ip_set:globalroot-0/web");
        assert_eq!(ip_set("web").document_key(), "ip_set:globalroot-0/web");

        let a = DesiredResource::FirewallRule(FirewallRuleSpec::new(1001, "a"));
        let b = DesiredResource::FirewallRule(FirewallRuleSpec::new(1002, "b"));
        assert_eq!(a.document_key(), b.document_key());
        assert_ne!(a.address(), b.address());

        let edge = DesiredResource::EdgeFirewallRule(EdgeFirewallRuleSpec::new("edge-1", "ssh"));
        assert_eq!(edge.document_key(), "edge:edge-1");
        assert_eq!(edge.scope(), "edge-1");
    }

    #[test]
    fn test_tagged_serde() {
        let mut rule = FirewallRuleSpec::new(1001, "rule1");
        rule.source = Some(vec![TypedElement::new(ElementType::IpSet, "ipset-1")].into());
        let resource = DesiredResource::FirewallRule(rule);

        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["kind"], "firewall_rule");
        assert_eq!(json["source"][0]["type"], "IPSet");

        let back: DesiredResource = serde_json::from_value(json).unwrap();
        assert_eq!(back, resource);
    }

    #[test]
    fn test_drift_across_kinds_is_none() {
        let rule = DesiredResource::FirewallRule(FirewallRuleSpec::new(1001, "web"));
        assert!(ip_set("web").drift(&rule).is_none());
        assert_eq!(ip_set("web").drift(&ip_set("web")), Some(Vec::new()));
    }
}
