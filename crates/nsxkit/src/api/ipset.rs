//! IP sets.

use super::{Extra, identity_from_body};
use crate::error::{Error, Result};
use crate::transport::{Request, Response};
use serde::{Deserialize, Serialize};

const BASE: &str = "/api/2.0/services/ipset";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub revision: u64,
    #[serde(flatten)]
    pub extra: Extra,
}

/// List every IP set in a scope.
pub fn get_all(scope: &str) -> Request {
    Request::get(format!("{BASE}/scope/{scope}"))
}

/// Create an IP set. The response body is the new object id.
pub fn create(scope: &str, ipset: &IpSet) -> Result<Request> {
    Request::post(format!("{BASE}/{scope}")).json(ipset)
}

pub fn update(object_id: &str, ipset: &IpSet) -> Result<Request> {
    Request::put(format!("{BASE}/{object_id}")).json(ipset)
}

pub fn delete(object_id: &str) -> Request {
    Request::delete(format!("{BASE}/{object_id}"))
}

/// Extract the object id from a create response.
pub fn created_id(response: &Response) -> Result<String> {
    identity_from_body(response.raw())
        .ok_or_else(|| Error::InvalidResponse("create returned no object id".to_string()))
}
