//! Application services (protocol and port definitions).

use super::{Extra, identity_from_body};
use crate::error::{Error, Result};
use crate::transport::{Request, Response};
use serde::{Deserialize, Serialize};

const BASE: &str = "/api/2.0/services/application";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ObjectScope>,
    #[serde(default)]
    pub element: Vec<ServiceElement>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ApplicationService {
    #[must_use]
    pub fn scope_id(&self) -> Option<&str> {
        self.scope.as_ref().map(|s| s.id.as_str())
    }

    /// Protocol and ports of the first element, the only one this tool manages.
    #[must_use]
    pub fn protocol_and_ports(&self) -> Option<(&str, &str)> {
        self.element
            .first()
            .map(|e| (e.application_protocol.as_str(), e.value.as_str()))
    }
}

/// The scope an object was created in, as reported on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectScope {
    pub id: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceElement {
    pub application_protocol: String,
    #[serde(default)]
    pub value: String,
}

pub fn get_all(scope: &str) -> Request {
    Request::get(format!("{BASE}/scope/{scope}"))
}

pub fn get(object_id: &str) -> Request {
    Request::get(format!("{BASE}/{object_id}"))
}

/// Create a service. The response body is the new object id.
pub fn create(scope: &str, service: &ApplicationService) -> Result<Request> {
    Request::post(format!("{BASE}/{scope}")).json(service)
}

pub fn update(object_id: &str, service: &ApplicationService) -> Result<Request> {
    Request::put(format!("{BASE}/{object_id}")).json(service)
}

pub fn delete(object_id: &str) -> Request {
    Request::delete(format!("{BASE}/{object_id}"))
}

/// Extract the object id from a create response.
pub fn created_id(response: &Response) -> Result<String> {
    identity_from_body(response.raw())
        .ok_or_else(|| Error::InvalidResponse("create returned no object id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_and_ports() {
        let service: ApplicationService = serde_json::from_str(
            r#"{"objectId":"application-5","name":"https","revision":3,
                "element":[{"applicationProtocol":"TCP","value":"443"}]}"#,
        )
        .unwrap();
        assert_eq!(service.object_id.as_deref(), Some("application-5"));
        assert_eq!(service.protocol_and_ports(), Some(("TCP", "443")));
        assert_eq!(service.revision, 3);
        assert!(service.scope_id().is_none());
    }

    #[test]
    fn test_scope_id() {
        let service: ApplicationService = serde_json::from_str(
            r#"{"name":"dns","scope":{"id":"globalroot-0","objectTypeName":"GlobalRoot"}}"#,
        )
        .unwrap();
        assert_eq!(service.scope_id(), Some("globalroot-0"));
    }

    #[test]
    fn test_no_elements() {
        let service = ApplicationService::default();
        assert!(service.protocol_and_ports().is_none());
    }

    #[test]
    fn test_paths() {
        assert_eq!(get("application-5").path(), "/api/2.0/services/application/application-5");
        assert_eq!(
            get_all("globalroot-0").path(),
            "/api/2.0/services/application/scope/globalroot-0"
        );
    }
}
