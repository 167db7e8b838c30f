//! Distributed firewall rules.
//!
//! All sections live in one configuration document versioned by a single
//! `ETag`. A rule handle is its bare numeric id; reads scan the whole
//! configuration, so the owning section never needs to be known up front.

use crate::coordinator::{Snapshot, with_current_version};
use crate::drift::{Drift, FieldChange};
use crate::element::{self, ElementCollection, ElementError, ElementSet};
use crate::error::{Error, Result};
use crate::handle;
use crate::kind::ResourceKind;
use crate::lifecycle::{Deletion, Lifecycle, Phase, Tracked};
use crate::poller::{PollOptions, confirm_absent};
use crate::remote::Subject;
use crate::resolver::resolve;
use nsxkit::Transport;
use nsxkit::api::firewall::{self, FirewallConfig, Rule};
use serde::{Deserialize, Serialize};

wire_enum! {
    #[derive(Default)]
    pub enum RuleAction {
        #[default]
        Allow => "allow",
        Deny => "deny",
        Reject => "reject",
    }
}

wire_enum! {
    #[derive(Default)]
    pub enum RuleDirection {
        In => "in",
        Out => "out",
        #[default]
        InOut => "inout",
    }
}

wire_enum! {
    /// An empty wire value reads as `Any`.
    #[derive(Default)]
    pub enum PacketType {
        #[default]
        Any => "any",
        Ipv4 => "ipv4",
        Ipv6 => "ipv6",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRuleSpec {
    pub section_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub logged: bool,
    #[serde(default)]
    pub action: RuleAction,
    #[serde(default)]
    pub direction: RuleDirection,
    #[serde(default)]
    pub packet_type: PacketType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_to: Option<ElementSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ElementSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_excluded: Option<ElementSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<ElementSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_excluded: Option<ElementSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ElementSet>,
    /// Configuration `ETag` at the time of the last operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<i64>,
}

impl FirewallRuleSpec {
    /// A rule with defaults for everything but section and name.
    pub fn new(section_id: i64, name: impl Into<String>) -> Self {
        Self {
            section_id,
            name: name.into(),
            description: String::new(),
            disabled: false,
            logged: false,
            action: RuleAction::default(),
            direction: RuleDirection::default(),
            packet_type: PacketType::default(),
            applied_to: None,
            source: None,
            source_excluded: None,
            destination: None,
            destination_excluded: None,
            service: None,
            etag: None,
            rule_id: None,
        }
    }

    /// Build the wire rule. Fails on mutually exclusive attributes.
    fn to_rule(&self) -> Result<Rule> {
        let invalid = |e: ElementError| Error::validation(ResourceKind::FirewallRule, &self.name, e);
        let sources = element::exclusive("source", self.source.as_ref(), self.source_excluded.as_ref())
            .map_err(invalid)?;
        let destinations = element::exclusive(
            "destination",
            self.destination.as_ref(),
            self.destination_excluded.as_ref(),
        )
        .map_err(invalid)?;
        if self.name.is_empty() {
            return Err(Error::validation(ResourceKind::FirewallRule, "", "name is required"));
        }

        let wire = |set: &ElementSet| element::to_wire(&ElementCollection::included(set.clone()));
        Ok(Rule {
            id: self.rule_id,
            name: self.name.clone(),
            section_id: self.section_id,
            direction: self.direction.to_string(),
            action: self.action.to_string(),
            packet_type: self.packet_type.to_string(),
            disabled: self.disabled,
            logged: self.logged,
            notes: self.description.clone(),
            applied_to_list: self.applied_to.as_ref().map(wire),
            sources: sources.as_ref().map(element::to_wire),
            destinations: destinations.as_ref().map(element::to_wire),
            services: self.service.as_ref().map(wire),
        })
    }

    fn from_rule(section_id: i64, rule: &Rule, etag: Option<&str>) -> Result<Self> {
        let subject = Subject::new(ResourceKind::FirewallRule, &rule.name);
        let invalid = |e: ElementError| subject.validation(e);
        let collection = |list: &Option<nsxkit::api::ElementList>| {
            list.as_ref().map(element::from_wire).transpose().map_err(invalid)
        };

        let (source, source_excluded) = collection(&rule.sources)?.map_or((None, None), ElementCollection::split);
        let (destination, destination_excluded) =
            collection(&rule.destinations)?.map_or((None, None), ElementCollection::split);

        Ok(Self {
            section_id,
            name: rule.name.clone(),
            description: rule.notes.clone(),
            disabled: rule.disabled,
            logged: rule.logged,
            action: rule.action.parse().map_err(|e| subject.validation(e))?,
            direction: rule.direction.parse().map_err(|e| subject.validation(e))?,
            packet_type: if rule.packet_type.is_empty() {
                PacketType::default()
            } else {
                rule.packet_type.parse().map_err(|e| subject.validation(e))?
            },
            applied_to: collection(&rule.applied_to_list)?.map(|c| c.elements),
            source,
            source_excluded,
            destination,
            destination_excluded,
            service: collection(&rule.services)?.map(|c| c.elements),
            etag: etag.map(str::to_string),
            rule_id: rule.id,
        })
    }

    pub fn drift(&self, current: &Self) -> Vec<FieldChange> {
        Drift::new()
            .value("description", &current.description, &self.description)
            .value("disabled", &current.disabled, &self.disabled)
            .value("logged", &current.logged, &self.logged)
            .value("action", &current.action, &self.action)
            .value("direction", &current.direction, &self.direction)
            .value("packet_type", &current.packet_type, &self.packet_type)
            .computed_set("applied_to", current.applied_to.as_ref(), self.applied_to.as_ref())
            .set("source", current.source.as_ref(), self.source.as_ref())
            .set("source_excluded", current.source_excluded.as_ref(), self.source_excluded.as_ref())
            .set("destination", current.destination.as_ref(), self.destination.as_ref())
            .set(
                "destination_excluded",
                current.destination_excluded.as_ref(),
                self.destination_excluded.as_ref(),
            )
            .set("service", current.service.as_ref(), self.service.as_ref())
            .finish()
    }
}

/// Lifecycle controller for distributed firewall rules.
pub struct FirewallRules<'a> {
    transport: &'a dyn Transport,
    poll: PollOptions,
}

impl<'a> FirewallRules<'a> {
    pub fn new(transport: &'a dyn Transport, poll: PollOptions) -> Self {
        Self { transport, poll }
    }

    fn config(&self, name: &str) -> Result<Option<Snapshot<FirewallConfig>>> {
        Subject::new(Self::KIND, name).fetch_versioned(self.transport, &firewall::get_config())
    }

    fn section_scope(section_id: i64) -> String {
        format!("section {section_id}")
    }

    fn missing_section(section_id: i64, name: &str) -> Error {
        Error::NotFound {
            kind: Self::KIND,
            name: name.to_string(),
            within: Some(format!("missing {}", Self::section_scope(section_id))),
        }
    }
}

impl Lifecycle for FirewallRules<'_> {
    type Spec = FirewallRuleSpec;

    const KIND: ResourceKind = ResourceKind::FirewallRule;

    fn create(&self, spec: &FirewallRuleSpec) -> Result<Tracked<FirewallRuleSpec>> {
        let mut rule = spec.to_rule()?;
        rule.id = None;
        let subject = Subject::new(Self::KIND, &spec.name);
        let scope = Self::section_scope(spec.section_id);

        let read = || self.config(&spec.name);
        let (created, etag) = with_current_version(Self::KIND, &spec.name, read, |snapshot| {
            let section = snapshot
                .document
                .section(spec.section_id)
                .ok_or_else(|| Self::missing_section(spec.section_id, &spec.name))?;
            let existing = resolve(Self::KIND, &scope, &spec.name, || Ok(section.rules.clone()))?;
            if existing.is_some() {
                return Err(Error::AlreadyExists {
                    kind: Self::KIND,
                    scope: scope.clone(),
                    name: spec.name.clone(),
                });
            }

            let etag = snapshot.token.etag().unwrap_or_default();
            let request = firewall::create(spec.section_id, etag, &rule)
                .map_err(|e| Error::transport(Self::KIND, &spec.name, e))?;
            let response = subject.send(self.transport, &request)?;
            let new_etag = response.etag().unwrap_or(etag).to_string();
            let created: Option<Rule> = response.json().ok();
            Ok((created.and_then(|r| r.id), new_etag))
        })?
        .ok_or_else(|| Error::status(Self::KIND, &spec.name, 404, "firewall configuration not found"))?;

        let rule_id = match created {
            Some(id) => id,
            None => {
                log::debug!("create response for rule '{}' had no id, resolving", spec.name);
                self.config(&spec.name)?
                    .and_then(|s| {
                        s.document
                            .section(spec.section_id)
                            .and_then(|section| section.rule_named(&spec.name))
                            .and_then(|r| r.id)
                    })
                    .ok_or_else(|| Error::not_found(Self::KIND, &spec.name))?
            }
        };
        log::info!("Created firewall rule {} ({}) in {}", spec.name, rule_id, scope);

        let mut tracked = spec.clone();
        tracked.rule_id = Some(rule_id);
        tracked.etag = Some(etag);
        Ok(Tracked::new(rule_id.to_string(), Phase::Created, tracked))
    }

    fn read(&self, handle: &str) -> Result<Option<Tracked<FirewallRuleSpec>>> {
        let rule_id = handle::numeric(Self::KIND, handle)?;
        let Some(snapshot) = self.config(handle)? else {
            return Ok(None);
        };
        let Some((section, rule)) = snapshot.document.find_rule(rule_id) else {
            log::debug!("firewall rule {rule_id} not found in any section");
            return Ok(None);
        };
        let spec = FirewallRuleSpec::from_rule(section.id, rule, snapshot.token.etag())?;
        Ok(Some(Tracked::new(handle, Phase::Read, spec)))
    }

    fn update(
        &self,
        handle: &str,
        spec: &FirewallRuleSpec,
    ) -> Result<Option<Tracked<FirewallRuleSpec>>> {
        let rule_id = handle::numeric(Self::KIND, handle)?;
        let mut rule = spec.to_rule()?;
        rule.id = Some(rule_id);
        let subject = Subject::new(Self::KIND, &spec.name);

        let read = || self.config(&spec.name);
        let written = with_current_version(Self::KIND, &spec.name, read, |snapshot| {
            let Some((section, _)) = snapshot.document.find_rule(rule_id) else {
                return Ok(None);
            };
            if section.id != spec.section_id {
                return Err(subject.validation(format!(
                    "rule {rule_id} lives in section {}, cannot move it to section {}",
                    section.id, spec.section_id
                )));
            }

            let etag = snapshot.token.etag().unwrap_or_default();
            let request = firewall::update(section.id, rule_id, etag, &rule)
                .map_err(|e| Error::transport(Self::KIND, &spec.name, e))?;
            let response = subject.send(self.transport, &request)?;
            Ok(Some(response.etag().unwrap_or(etag).to_string()))
        })?
        .flatten();

        Ok(written.map(|etag| {
            log::info!("Updated firewall rule {} ({})", spec.name, rule_id);
            let mut updated = spec.clone();
            updated.rule_id = Some(rule_id);
            updated.etag = Some(etag);
            Tracked::new(handle, Phase::Updated, updated)
        }))
    }

    fn delete(&self, handle: &str) -> Result<Deletion> {
        let rule_id = handle::numeric(Self::KIND, handle)?;
        let subject = Subject::new(Self::KIND, handle);

        let read = || self.config(handle);
        let section_id = with_current_version(Self::KIND, handle, read, |snapshot| {
            let Some((section, _)) = snapshot.document.find_rule(rule_id) else {
                return Ok(None);
            };
            let etag = snapshot.token.etag().unwrap_or_default();
            subject.send(self.transport, &firewall::delete(section.id, rule_id, etag))?;
            Ok(Some(section.id))
        })?
        .flatten();

        let Some(section_id) = section_id else {
            log::debug!("firewall rule {rule_id} already absent");
            return Ok(Deletion::AlreadyAbsent);
        };

        let scope = Self::section_scope(section_id);
        confirm_absent(Self::KIND, &scope, handle, self.poll, || {
            Ok(self
                .config(handle)?
                .is_some_and(|s| s.document.find_rule(rule_id).is_some()))
        })?;
        log::info!("Deleted firewall rule {rule_id} from {scope}");
        Ok(Deletion::Deleted)
    }
}
