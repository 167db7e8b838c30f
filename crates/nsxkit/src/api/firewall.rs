//! Distributed firewall configuration and layer-3 rules.
//!
//! The configuration is a single document versioned by an `ETag`. Every rule
//! write must carry the ETag of a configuration read made just before it.

use super::{ElementList, Extra};
use crate::error::Result;
use crate::transport::Request;
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH: &str = "/api/4.0/firewall/globalroot-0/config";

fn rules_path(section_id: i64) -> String {
    format!("{CONFIG_PATH}/layer3sections/{section_id}/rules")
}

fn rule_path(section_id: i64, rule_id: i64) -> String {
    format!("{}/{rule_id}", rules_path(section_id))
}

/// The whole firewall configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallConfig {
    #[serde(default)]
    pub layer3_sections: Vec<Section>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl FirewallConfig {
    #[must_use]
    pub fn section(&self, section_id: i64) -> Option<&Section> {
        self.layer3_sections.iter().find(|s| s.id == section_id)
    }

    /// Find a rule anywhere in the configuration by its id.
    #[must_use]
    pub fn find_rule(&self, rule_id: i64) -> Option<(&Section, &Rule)> {
        self.layer3_sections.iter().find_map(|section| {
            section
                .rules
                .iter()
                .find(|r| r.id == Some(rule_id))
                .map(|rule| (section, rule))
        })
    }
}

/// A layer-3 section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Section {
    /// First rule with exactly this name.
    #[must_use]
    pub fn rule_named(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }
}

/// A layer-3 rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub section_id: i64,
    pub direction: String,
    pub action: String,
    #[serde(default)]
    pub packet_type: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub logged: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_to_list: Option<ElementList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<ElementList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destinations: Option<ElementList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<ElementList>,
}

pub fn get_config() -> Request {
    Request::get(CONFIG_PATH)
}

/// Append a rule to a section. The response body is the created rule.
pub fn create(section_id: i64, etag: &str, rule: &Rule) -> Result<Request> {
    Ok(Request::post(rules_path(section_id)).json(rule)?.if_match(etag))
}

pub fn update(section_id: i64, rule_id: i64, etag: &str, rule: &Rule) -> Result<Request> {
    Ok(Request::put(rule_path(section_id, rule_id))
        .json(rule)?
        .if_match(etag))
}

pub fn delete(section_id: i64, rule_id: i64, etag: &str) -> Request {
    Request::delete(rule_path(section_id, rule_id)).if_match(etag)
}
