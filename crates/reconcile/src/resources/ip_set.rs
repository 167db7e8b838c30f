//! IP sets.
//!
//! Standalone objects identified by `<scope>_<name>`. Writes echo the
//! revision that was read.

use crate::coordinator::{RevisionPolicy, Snapshot, VersionToken, with_current_version};
use crate::drift::{Drift, FieldChange};
use crate::error::{Error, Result};
use crate::handle;
use crate::kind::ResourceKind;
use crate::lifecycle::{Deletion, Lifecycle, Phase, Tracked};
use crate::remote::Subject;
use crate::resolver::resolve;
use nsxkit::Transport;
use nsxkit::api::ipset::{self, IpSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpSetSpec {
    pub scope: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Comma-separated addresses, CIDRs or ranges.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl IpSetSpec {
    fn validate(&self) -> Result<()> {
        let subject = Subject::new(ResourceKind::IpSet, &self.name);
        if self.name.is_empty() {
            return Err(subject.validation("name is required"));
        }
        if self.scope.is_empty() {
            return Err(subject.validation("scope is required"));
        }
        if self.value.trim().is_empty() {
            return Err(subject.validation("value is required"));
        }
        Ok(())
    }

    fn from_remote(scope: &str, ipset: IpSet) -> Self {
        Self {
            scope: scope.to_string(),
            name: ipset.name,
            description: ipset.description,
            value: ipset.value,
            object_id: ipset.object_id,
        }
    }

    pub fn handle(&self) -> String {
        handle::join(&self.scope, &self.name)
    }

    pub fn drift(&self, current: &Self) -> Vec<FieldChange> {
        Drift::new()
            .value("description", &current.description, &self.description)
            .value("value", &current.value, &self.value)
            .finish()
    }
}

/// Lifecycle controller for IP sets.
pub struct IpSets<'a> {
    transport: &'a dyn Transport,
}

impl<'a> IpSets<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Resolve an IP set by name within a scope.
    pub fn find(&self, scope: &str, name: &str) -> Result<Option<IpSet>> {
        let subject = Subject::new(Self::KIND, name);
        resolve(Self::KIND, scope, name, || {
            let response = subject.send(self.transport, &ipset::get_all(scope))?;
            subject.decode::<Vec<IpSet>>(&response)
        })
    }

    fn object_id(ipset: &IpSet) -> Result<&str> {
        ipset
            .object_id
            .as_deref()
            .ok_or_else(|| Error::status(Self::KIND, &ipset.name, 200, "listed IP set has no objectId"))
    }
}

impl Lifecycle for IpSets<'_> {
    type Spec = IpSetSpec;

    const KIND: ResourceKind = ResourceKind::IpSet;

    fn create(&self, spec: &IpSetSpec) -> Result<Tracked<IpSetSpec>> {
        spec.validate()?;
        let subject = Subject::new(Self::KIND, &spec.name);

        if self.find(&spec.scope, &spec.name)?.is_some() {
            return Err(Error::AlreadyExists {
                kind: Self::KIND,
                scope: spec.scope.clone(),
                name: spec.name.clone(),
            });
        }

        let body = IpSet {
            name: spec.name.clone(),
            description: spec.description.clone(),
            value: spec.value.clone(),
            ..IpSet::default()
        };
        let request = ipset::create(&spec.scope, &body)
            .map_err(|e| Error::transport(Self::KIND, &spec.name, e))?;
        let response = subject.send(self.transport, &request)?;

        let object_id = match ipset::created_id(&response) {
            Ok(id) => id,
            Err(_) => {
                log::debug!("create response for IP set '{}' had no id, resolving", spec.name);
                let created = self
                    .find(&spec.scope, &spec.name)?
                    .ok_or_else(|| Error::not_found(Self::KIND, &spec.name))?;
                Self::object_id(&created)?.to_string()
            }
        };
        log::info!("Created IP set {}/{} ({})", spec.scope, spec.name, object_id);

        let mut created = spec.clone();
        created.object_id = Some(object_id);
        Ok(Tracked::new(spec.handle(), Phase::Created, created))
    }

    fn read(&self, handle: &str) -> Result<Option<Tracked<IpSetSpec>>> {
        let (scope, name) = handle::split_scoped(Self::KIND, handle)?;
        Ok(self.find(&scope, &name)?.map(|ipset| {
            Tracked::new(handle, Phase::Read, IpSetSpec::from_remote(&scope, ipset))
        }))
    }

    fn update(&self, handle: &str, spec: &IpSetSpec) -> Result<Option<Tracked<IpSetSpec>>> {
        spec.validate()?;
        let (scope, name) = handle::split_scoped(Self::KIND, handle)?;
        if scope != spec.scope {
            return Err(Error::validation(
                Self::KIND,
                &spec.name,
                format!("scope cannot change from {scope} to {}", spec.scope),
            ));
        }
        let subject = Subject::new(Self::KIND, &name);

        let read = || {
            Ok(self.find(&scope, &name)?.map(|current| {
                let token = VersionToken::Revision(current.revision);
                Snapshot::new(current, token)
            }))
        };

        with_current_version(Self::KIND, &name, read, |snapshot| {
            let mut document = snapshot.document;
            let object_id = Self::object_id(&document)?.to_string();
            document.name = spec.name.clone();
            document.description = spec.description.clone();
            document.value = spec.value.clone();
            document.revision = RevisionPolicy::Echo.next(snapshot.token.revision().unwrap_or(0));

            let request = ipset::update(&object_id, &document)
                .map_err(|e| Error::transport(Self::KIND, &name, e))?;
            subject.send(self.transport, &request)?;
            log::info!("Updated IP set {}/{} ({})", scope, spec.name, object_id);

            let mut updated = spec.clone();
            updated.object_id = Some(object_id);
            Ok(Tracked::new(spec.handle(), Phase::Updated, updated))
        })
    }

    fn delete(&self, handle: &str) -> Result<Deletion> {
        let (scope, name) = handle::split_scoped(Self::KIND, handle)?;
        let Some(current) = self.find(&scope, &name)? else {
            log::debug!("IP set {scope}/{name} already absent");
            return Ok(Deletion::AlreadyAbsent);
        };
        let object_id = Self::object_id(&current)?;
        Subject::new(Self::KIND, &name).send(self.transport, &ipset::delete(object_id))?;
        log::info!("Deleted IP set {scope}/{name} ({object_id})");
        Ok(Deletion::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsxkit::{Method, MockTransport, Response};

    const LIST: &str = "/api/2.0/services/ipset/scope/globalroot-0";

    fn spec(name: &str) -> IpSetSpec {
        IpSetSpec {
            scope: "globalroot-0".into(),
            name: name.into(),
            description: "managed".into(),
            value: "10.0.0.0/24".into(),
            object_id: None,
        }
    }

    fn listing(mock: &MockTransport, body: &str) {
        mock.respond(Method::Get, LIST, Response::ok(body));
    }

    #[test]
    fn test_create_posts_and_returns_id() {
        let mock = MockTransport::new();
        listing(&mock, "[]");
        mock.respond(
            Method::Post,
            "/api/2.0/services/ipset/globalroot-0",
            Response::new(201, "ipset-12"),
        );

        let tracked = IpSets::new(&mock).create(&spec("web")).unwrap();
        assert_eq!(tracked.handle, "globalroot-0_web");
        assert_eq!(tracked.phase, Phase::Created);
        assert_eq!(tracked.spec.object_id.as_deref(), Some("ipset-12"));

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        let body: IpSet = writes[0].body_json().unwrap();
        assert_eq!(body.value, "10.0.0.0/24");
    }

    #[test]
    fn test_create_existing_fails_without_write() {
        let mock = MockTransport::new();
        listing(&mock, r#"[{"objectId":"ipset-1","name":"web","value":"10.0.0.1"}]"#);

        let err = IpSets::new(&mock).create(&spec("web")).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_create_validates_before_any_call() {
        let mock = MockTransport::new();
        let mut invalid = spec("web");
        invalid.value.clear();
        let err = IpSets::new(&mock).create(&invalid).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_create_resolves_when_response_has_no_id() {
        let mock = MockTransport::new();
        listing(&mock, "[]");
        listing(&mock, r#"[{"objectId":"ipset-40","name":"web","value":"10.0.0.0/24"}]"#);
        mock.respond(Method::Post, "/api/2.0/services/ipset/globalroot-0", Response::new(201, ""));

        let tracked = IpSets::new(&mock).create(&spec("web")).unwrap();
        assert_eq!(tracked.spec.object_id.as_deref(), Some("ipset-40"));
    }

    #[test]
    fn test_read_is_exact_match() {
        let mock = MockTransport::new();
        listing(&mock, r#"[{"objectId":"ipset-2","name":"ab","value":"10.0.0.2"}]"#);
        assert!(IpSets::new(&mock).read("globalroot-0_a").unwrap().is_none());

        let tracked = IpSets::new(&mock).read("globalroot-0_ab").unwrap().unwrap();
        assert_eq!(tracked.spec.value, "10.0.0.2");
        assert_eq!(tracked.spec.scope, "globalroot-0");
    }

    #[test]
    fn test_update_echoes_revision() {
        let mock = MockTransport::new();
        listing(
            &mock,
            r#"[{"objectId":"ipset-1","name":"web","value":"10.0.0.1","revision":5,"isUniversal":false}]"#,
        );
        mock.respond(Method::Put, "/api/2.0/services/ipset/ipset-1", Response::ok(""));

        let mut desired = spec("web");
        desired.value = "10.0.0.9".into();
        let tracked = IpSets::new(&mock)
            .update("globalroot-0_web", &desired)
            .unwrap()
            .unwrap();
        assert_eq!(tracked.phase, Phase::Updated);

        let put = &mock.calls_to(Method::Put, "/api/2.0/services/ipset/ipset-1")[0];
        let body: serde_json::Value = put.body_json().unwrap();
        assert_eq!(body["revision"], 5);
        assert_eq!(body["value"], "10.0.0.9");
        assert_eq!(body["isUniversal"], false);
    }

    #[test]
    fn test_update_of_gone_object_returns_none() {
        let mock = MockTransport::new();
        listing(&mock, "[]");
        let result = IpSets::new(&mock).update("globalroot-0_web", &spec("web")).unwrap();
        assert!(result.is_none());
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_delete_absent_issues_no_write() {
        let mock = MockTransport::new();
        listing(&mock, "[]");
        let outcome = IpSets::new(&mock).delete("globalroot-0_web").unwrap();
        assert_eq!(outcome, Deletion::AlreadyAbsent);
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_delete_existing() {
        let mock = MockTransport::new();
        listing(&mock, r#"[{"objectId":"ipset-1","name":"web"}]"#);
        mock.respond(Method::Delete, "/api/2.0/services/ipset/ipset-1", Response::ok(""));
        assert_eq!(IpSets::new(&mock).delete("globalroot-0_web").unwrap(), Deletion::Deleted);
    }

    #[test]
    fn test_list_failure_is_an_error() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, LIST, Response::new(500, "internal"));
        assert!(IpSets::new(&mock).read("globalroot-0_web").is_err());
    }

    #[test]
    fn test_drift() {
        let current = spec("web");
        let mut desired = spec("web");
        desired.value = "10.1.0.0/16".into();
        let changes = desired.drift(&current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "value");
    }
}
