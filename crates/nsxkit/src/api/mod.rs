//! Wire model and request builders, one module per object family.
//!
//! Builders return opaque [`Request`](crate::Request) values; nothing here
//! performs I/O. Container documents keep fields this crate does not model in
//! an `extra` map so a whole-document rewrite sends them back untouched.

pub mod edge_firewall;
pub mod firewall;
pub mod ipset;
pub mod security_policy;
pub mod service;

use serde::{Deserialize, Serialize};

/// Unmodelled fields of a document, preserved across read-modify-write.
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// One member of a rule's source, destination, service or applied-to list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
}

/// An ordered element list with its exclusion flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementList {
    #[serde(default)]
    pub excluded: bool,
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// Strip whitespace and surrounding quotes from a plain-text identity body.
pub(crate) fn identity_from_body(body: &str) -> Option<String> {
    let id = body.trim().trim_matches('"').trim();
    (!id.is_empty()).then(|| id.to_string())
}
