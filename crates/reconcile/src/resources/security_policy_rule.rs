//! Firewall actions inside a security policy.
//!
//! The policy is the shared document: every change rewrites it whole under
//! its integer revision. Creates and updates step it with the configured
//! [`RevisionPolicy`]; deletes echo the observed revision. Handles are
//! `<policy_name>_<rule_name>` and are split against the policy names that
//! exist, since both halves may contain underscores.

use crate::coordinator::{RevisionPolicy, Snapshot, VersionToken, with_current_version};
use crate::drift::{Drift, FieldChange};
use crate::error::{Error, Result};
use crate::handle;
use crate::kind::ResourceKind;
use crate::lifecycle::{Deletion, Lifecycle, Phase, Tracked};
use crate::poller::{PollOptions, confirm_absent};
use crate::remote::Subject;
use crate::resolver::resolve;
use nsxkit::Transport;
use nsxkit::api::security_policy::{self, FirewallAction, SecurityPolicy, SecurityPolicyList};
use serde::{Deserialize, Serialize};

wire_enum! {
    pub enum PolicyAction {
        Allow => "allow",
        Block => "block",
        Reject => "reject",
    }
}

wire_enum! {
    pub enum PolicyDirection {
        Inbound => "inbound",
        Outbound => "outbound",
        Intra => "intra",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicyRuleSpec {
    pub policy_name: String,
    pub name: String,
    pub action: PolicyAction,
    pub direction: PolicyDirection,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    #[serde(default)]
    pub service_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vsm_uuid: Option<String>,
}

impl SecurityPolicyRuleSpec {
    fn validate(&self) -> Result<()> {
        let subject = Subject::new(ResourceKind::SecurityPolicyRule, &self.name);
        if self.name.is_empty() {
            return Err(subject.validation("name is required"));
        }
        if self.policy_name.is_empty() {
            return Err(subject.validation("policy_name is required"));
        }
        if self.service_ids.is_empty() {
            return Err(subject.validation("service_ids is required"));
        }
        if self.direction == PolicyDirection::Outbound && self.security_group_ids.is_empty() {
            return Err(subject.validation("security_group_ids is required for outbound rules"));
        }
        Ok(())
    }

    fn from_remote(policy_name: &str, action: &FirewallAction) -> Result<Self> {
        let subject = Subject::new(ResourceKind::SecurityPolicyRule, &action.name);
        Ok(Self {
            policy_name: policy_name.to_string(),
            name: action.name.clone(),
            action: action.action.parse().map_err(|e| subject.validation(e))?,
            direction: action.direction.parse().map_err(|e| subject.validation(e))?,
            security_group_ids: action.secondary_security_groups.clone(),
            service_ids: action.applications.clone(),
            vsm_uuid: action.vsm_uuid.clone(),
        })
    }

    fn apply_to(&self, action: &mut FirewallAction) {
        action.name = self.name.clone();
        action.action = self.action.to_string();
        action.direction = self.direction.to_string();
        action.secondary_security_groups = self.security_group_ids.clone();
        action.applications = self.service_ids.clone();
    }

    pub fn handle(&self) -> String {
        handle::join(&self.policy_name, &self.name)
    }

    pub fn drift(&self, current: &Self) -> Vec<FieldChange> {
        Drift::new()
            .value("action", &current.action, &self.action)
            .value("direction", &current.direction, &self.direction)
            .list("security_group_ids", &current.security_group_ids, &self.security_group_ids)
            .list("service_ids", &current.service_ids, &self.service_ids)
            .finish()
    }
}

/// Lifecycle controller for security-policy rules.
pub struct SecurityPolicyRules<'a> {
    transport: &'a dyn Transport,
    revision: RevisionPolicy,
    poll: PollOptions,
}

impl<'a> SecurityPolicyRules<'a> {
    pub fn new(transport: &'a dyn Transport, revision: RevisionPolicy, poll: PollOptions) -> Self {
        Self {
            transport,
            revision,
            poll,
        }
    }

    fn policies(&self, name: &str) -> Result<SecurityPolicyList> {
        let subject = Subject::new(Self::KIND, name);
        let response = subject.send(self.transport, &security_policy::get_all())?;
        subject.decode(&response)
    }

    /// Resolve a policy by name, with its revision as the version token.
    fn policy(&self, policy_name: &str, rule_name: &str) -> Result<Option<Snapshot<SecurityPolicy>>> {
        let found = resolve(Self::KIND, "security policies", policy_name, || {
            Ok(self.policies(rule_name)?.security_policies)
        })?;
        Ok(found.map(|policy| {
            let token = VersionToken::Revision(policy.revision);
            Snapshot::new(policy, token)
        }))
    }

    /// Split a handle into `(policy_name, rule_name)`.
    fn locate(&self, id: &str) -> Result<Option<(String, String)>> {
        let list = self.policies(id)?;
        handle::split_against(
            Self::KIND,
            id,
            list.security_policies.iter().map(|p| p.name.as_str()),
        )
    }

    fn write(
        &self,
        rule_name: &str,
        mut policy: SecurityPolicy,
        observed: &VersionToken,
        revision: RevisionPolicy,
    ) -> Result<()> {
        policy.revision = revision.next(observed.revision().unwrap_or(0));
        let request = security_policy::update(&policy)
            .map_err(|e| Error::transport(Self::KIND, rule_name, e))?;
        Subject::new(Self::KIND, rule_name).send(self.transport, &request)?;
        Ok(())
    }

    fn missing_policy(policy_name: &str, rule_name: &str) -> Error {
        Error::NotFound {
            kind: Self::KIND,
            name: rule_name.to_string(),
            within: Some(format!("missing security policy '{policy_name}'")),
        }
    }
}

impl Lifecycle for SecurityPolicyRules<'_> {
    type Spec = SecurityPolicyRuleSpec;

    const KIND: ResourceKind = ResourceKind::SecurityPolicyRule;

    fn create(&self, spec: &SecurityPolicyRuleSpec) -> Result<Tracked<SecurityPolicyRuleSpec>> {
        spec.validate()?;

        let read = || self.policy(&spec.policy_name, &spec.name);
        with_current_version(Self::KIND, &spec.name, read, |snapshot| {
            let mut policy = snapshot.document;
            if policy.action_named(&spec.name).is_some() {
                return Err(Error::AlreadyExists {
                    kind: Self::KIND,
                    scope: format!("security policy '{}'", spec.policy_name),
                    name: spec.name.clone(),
                });
            }
            let mut action = FirewallAction {
                is_enabled: true,
                ..FirewallAction::default()
            };
            spec.apply_to(&mut action);
            policy.firewall_actions.push(action);
            self.write(&spec.name, policy, &snapshot.token, self.revision)
        })?
        .ok_or_else(|| Self::missing_policy(&spec.policy_name, &spec.name))?;
        log::info!("Created rule {} in security policy {}", spec.name, spec.policy_name);

        // The manager assigns vsmUuid on write.
        let mut created = spec.clone();
        created.vsm_uuid = self
            .policy(&spec.policy_name, &spec.name)?
            .and_then(|s| s.document.action_named(&spec.name).and_then(|a| a.vsm_uuid.clone()));
        Ok(Tracked::new(spec.handle(), Phase::Created, created))
    }

    fn read(&self, handle: &str) -> Result<Option<Tracked<SecurityPolicyRuleSpec>>> {
        let list = self.policies(handle)?;
        let Some((policy_name, rule_name)) = handle::split_against(
            Self::KIND,
            handle,
            list.security_policies.iter().map(|p| p.name.as_str()),
        )?
        else {
            return Ok(None);
        };

        let Some(action) = list
            .named(&policy_name)
            .and_then(|policy| policy.action_named(&rule_name))
        else {
            return Ok(None);
        };
        let spec = SecurityPolicyRuleSpec::from_remote(&policy_name, action)?;
        Ok(Some(Tracked::new(handle, Phase::Read, spec)))
    }

    fn update(
        &self,
        handle: &str,
        spec: &SecurityPolicyRuleSpec,
    ) -> Result<Option<Tracked<SecurityPolicyRuleSpec>>> {
        spec.validate()?;
        let Some((policy_name, rule_name)) = self.locate(handle)? else {
            return Ok(None);
        };
        if policy_name != spec.policy_name || rule_name != spec.name {
            return Err(Error::validation(
                Self::KIND,
                &spec.name,
                format!(
                    "handle {handle} does not match {}; policy and name cannot change in place",
                    spec.handle()
                ),
            ));
        }

        let read = || self.policy(&policy_name, &rule_name);
        let written = with_current_version(Self::KIND, &rule_name, read, |snapshot| {
            let mut policy = snapshot.document;
            let Some(action) = policy.firewall_actions.iter_mut().find(|a| a.name == rule_name) else {
                return Ok(None);
            };
            spec.apply_to(action);
            let vsm_uuid = action.vsm_uuid.clone();
            self.write(&rule_name, policy, &snapshot.token, self.revision)?;
            Ok(Some(vsm_uuid))
        })?
        .flatten();

        Ok(written.map(|vsm_uuid| {
            log::info!("Updated rule {} in security policy {}", spec.name, policy_name);
            let mut updated = spec.clone();
            updated.vsm_uuid = vsm_uuid;
            Tracked::new(spec.handle(), Phase::Updated, updated)
        }))
    }

    fn delete(&self, handle: &str) -> Result<Deletion> {
        let Some((policy_name, rule_name)) = self.locate(handle)? else {
            log::debug!("security policy for rule {handle} not found, nothing to delete");
            return Ok(Deletion::AlreadyAbsent);
        };

        let read = || self.policy(&policy_name, &rule_name);
        let removed = with_current_version(Self::KIND, &rule_name, read, |snapshot| {
            let mut policy = snapshot.document;
            if !policy.remove_action(&rule_name) {
                return Ok(false);
            }
            self.write(&rule_name, policy, &snapshot.token, RevisionPolicy::Echo)?;
            Ok(true)
        })?
        .unwrap_or(false);

        if !removed {
            log::debug!("rule {rule_name} not in security policy {policy_name}, nothing to delete");
            return Ok(Deletion::AlreadyAbsent);
        }

        confirm_absent(Self::KIND, &policy_name, &rule_name, self.poll, || {
            Ok(self
                .policy(&policy_name, &rule_name)?
                .is_some_and(|s| s.document.action_named(&rule_name).is_some()))
        })?;
        log::info!("Deleted rule {rule_name} from security policy {policy_name}");
        Ok(Deletion::Deleted)
    }

    fn import(&self, id: &str) -> Result<Option<Tracked<SecurityPolicyRuleSpec>>> {
        if self.locate(id)?.is_none() {
            return Err(Error::NotFound {
                kind: Self::KIND,
                name: id.to_string(),
                within: Some("any security policy".to_string()),
            });
        }
        self.read(id)
    }
}
