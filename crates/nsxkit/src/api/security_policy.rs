//! Security policies and their firewall actions.
//!
//! A policy is a shared container: adding or removing one action rewrites the
//! whole policy document under its integer revision.

use super::Extra;
use crate::error::Result;
use crate::transport::Request;
use serde::{Deserialize, Serialize};

const BASE: &str = "/api/2.0/services/policy/securitypolicy";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPolicyList {
    #[serde(default)]
    pub security_policies: Vec<SecurityPolicy>,
}

impl SecurityPolicyList {
    #[must_use]
    pub fn named(&self, name: &str) -> Option<&SecurityPolicy> {
        self.security_policies.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPolicy {
    pub object_id: String,
    pub name: String,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub firewall_actions: Vec<FirewallAction>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl SecurityPolicy {
    #[must_use]
    pub fn action_named(&self, name: &str) -> Option<&FirewallAction> {
        self.firewall_actions.iter().find(|a| a.name == name)
    }

    /// Remove every action with this name. Returns whether one was removed.
    pub fn remove_action(&mut self, name: &str) -> bool {
        let before = self.firewall_actions.len();
        self.firewall_actions.retain(|a| a.name != name);
        self.firewall_actions.len() != before
    }
}

/// A firewall action inside a policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vsm_uuid: Option<String>,
    pub name: String,
    pub action: String,
    pub direction: String,
    #[serde(default = "enabled")]
    pub is_enabled: bool,
    #[serde(default)]
    pub secondary_security_groups: Vec<String>,
    #[serde(default)]
    pub applications: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

const fn enabled() -> bool {
    true
}

pub fn get_all() -> Request {
    Request::get(format!("{BASE}/all"))
}

pub fn update(policy: &SecurityPolicy) -> Result<Request> {
    Request::put(format!("{BASE}/{}", policy.object_id)).json(policy)
}
