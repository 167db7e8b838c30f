//! The desired-state manifest (`fwsync.toml`).
//!
//! ```toml
//! [[ip_set]]
//! scope = "globalroot-0"
//! name = "web"
//! value = "10.0.0.0/24"
//!
//! [[firewall_rule]]
//! section_id = 1001
//! name = "allow-web"
//! source = [{ type = "IPSet", value = "ipset-12" }]
//! ```

use anyhow::{Context, Result};
use reconcile::{
    DesiredResource, EdgeFirewallRuleSpec, FirewallRuleSpec, IpSetSpec, SecurityPolicyRuleSpec,
    ServiceSpec,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Problems with the manifest's content, as opposed to reading it.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("duplicate resource address '{address}'")]
    Duplicate { address: String },

    #[error("{address}: {message}")]
    Invalid { address: String, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    pub firewall_rule: Vec<FirewallRuleSpec>,
    pub ip_set: Vec<IpSetSpec>,
    pub security_policy_rule: Vec<SecurityPolicyRuleSpec>,
    pub service: Vec<ServiceSpec>,
    pub edge_firewall_rule: Vec<EdgeFirewallRuleSpec>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse manifest: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Every declared resource keyed by address.
    pub fn resources(&self) -> Result<BTreeMap<String, DesiredResource>, ManifestError> {
        let declared = self
            .firewall_rule
            .iter()
            .cloned()
            .map(DesiredResource::FirewallRule)
            .chain(self.ip_set.iter().cloned().map(DesiredResource::IpSet))
            .chain(
                self.security_policy_rule
                    .iter()
                    .cloned()
                    .map(DesiredResource::SecurityPolicyRule),
            )
            .chain(self.service.iter().cloned().map(DesiredResource::Service))
            .chain(
                self.edge_firewall_rule
                    .iter()
                    .cloned()
                    .map(DesiredResource::EdgeFirewallRule),
            );

        let mut resources = BTreeMap::new();
        for resource in declared {
            let address = resource.address();
            if resource.name().is_empty() || resource.scope().is_empty() {
                return Err(ManifestError::Invalid {
                    address,
                    message: "name and scope must not be empty".to_string(),
                });
            }
            if resources.insert(address.clone(), resource).is_some() {
                return Err(ManifestError::Duplicate { address });
            }
        }
        Ok(resources)
    }

    pub fn len(&self) -> usize {
        self.firewall_rule.len()
            + self.ip_set.len()
            + self.security_policy_rule.len()
            + self.service.len()
            + self.edge_firewall_rule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
