//! Application services.
//!
//! Identified by their bare object id. Writes send the observed revision
//! plus one.

use crate::coordinator::{RevisionPolicy, Snapshot, VersionToken, with_current_version};
use crate::drift::{Drift, FieldChange};
use crate::error::{Error, Result};
use crate::kind::ResourceKind;
use crate::lifecycle::{Deletion, Lifecycle, Phase, Tracked};
use crate::remote::Subject;
use crate::resolver::resolve;
use nsxkit::Transport;
use nsxkit::api::service::{self, ApplicationService, ServiceElement};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub scope: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// e.g. `TCP`, `UDP`.
    pub protocol: String,
    /// Port, list or range, e.g. `443` or `8080-8090`.
    pub ports: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl ServiceSpec {
    fn validate(&self) -> Result<()> {
        let subject = Subject::new(ResourceKind::Service, &self.name);
        if self.name.is_empty() {
            return Err(subject.validation("name is required"));
        }
        if self.scope.is_empty() {
            return Err(subject.validation("scope is required"));
        }
        if self.protocol.is_empty() {
            return Err(subject.validation("protocol is required"));
        }
        if self.ports.is_empty() {
            return Err(subject.validation("ports is required"));
        }
        Ok(())
    }

    fn from_remote(scope: &str, service: ApplicationService) -> Self {
        let (protocol, ports) = service
            .protocol_and_ports()
            .map(|(p, v)| (p.to_string(), v.to_string()))
            .unwrap_or_default();
        Self {
            scope: scope.to_string(),
            name: service.name,
            description: service.description,
            protocol,
            ports,
            object_id: service.object_id,
        }
    }

    fn apply_to(&self, service: &mut ApplicationService) {
        service.name = self.name.clone();
        service.description = self.description.clone();
        service.element = vec![ServiceElement {
            application_protocol: self.protocol.clone(),
            value: self.ports.clone(),
        }];
    }

    pub fn drift(&self, current: &Self) -> Vec<FieldChange> {
        Drift::new()
            .value("description", &current.description, &self.description)
            .value("protocol", &current.protocol, &self.protocol)
            .value("ports", &current.ports, &self.ports)
            .finish()
    }
}

/// Lifecycle controller for application services.
pub struct Services<'a> {
    transport: &'a dyn Transport,
}

impl<'a> Services<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Resolve a service by name within a scope.
    pub fn find(&self, scope: &str, name: &str) -> Result<Option<ApplicationService>> {
        let subject = Subject::new(Self::KIND, name);
        resolve(Self::KIND, scope, name, || {
            let response = subject.send(self.transport, &service::get_all(scope))?;
            subject.decode::<Vec<ApplicationService>>(&response)
        })
    }

    fn get(&self, object_id: &str) -> Result<Option<ApplicationService>> {
        let subject = Subject::new(Self::KIND, object_id);
        subject
            .fetch(self.transport, &service::get(object_id))?
            .map(|response| subject.decode(&response))
            .transpose()
    }
}

impl Lifecycle for Services<'_> {
    type Spec = ServiceSpec;

    const KIND: ResourceKind = ResourceKind::Service;

    fn create(&self, spec: &ServiceSpec) -> Result<Tracked<ServiceSpec>> {
        spec.validate()?;
        let subject = Subject::new(Self::KIND, &spec.name);

        if self.find(&spec.scope, &spec.name)?.is_some() {
            return Err(Error::AlreadyExists {
                kind: Self::KIND,
                scope: spec.scope.clone(),
                name: spec.name.clone(),
            });
        }

        let mut body = ApplicationService::default();
        spec.apply_to(&mut body);
        let request = service::create(&spec.scope, &body)
            .map_err(|e| Error::transport(Self::KIND, &spec.name, e))?;
        let response = subject.send(self.transport, &request)?;

        let object_id = match service::created_id(&response) {
            Ok(id) => id,
            Err(_) => self
                .find(&spec.scope, &spec.name)?
                .and_then(|s| s.object_id)
                .ok_or_else(|| Error::not_found(Self::KIND, &spec.name))?,
        };
        log::info!("Created service {}/{} ({})", spec.scope, spec.name, object_id);

        let mut created = spec.clone();
        created.object_id = Some(object_id.clone());
        Ok(Tracked::new(object_id, Phase::Created, created))
    }

    fn read(&self, handle: &str) -> Result<Option<Tracked<ServiceSpec>>> {
        Ok(self.get(handle)?.map(|remote| {
            let scope = remote.scope_id().unwrap_or_default().to_string();
            Tracked::new(handle, Phase::Read, ServiceSpec::from_remote(&scope, remote))
        }))
    }

    fn update(&self, handle: &str, spec: &ServiceSpec) -> Result<Option<Tracked<ServiceSpec>>> {
        spec.validate()?;
        let subject = Subject::new(Self::KIND, handle);

        let read = || {
            Ok(self.get(handle)?.map(|current| {
                let token = VersionToken::Revision(current.revision);
                Snapshot::new(current, token)
            }))
        };

        with_current_version(Self::KIND, handle, read, |snapshot| {
            let mut document = snapshot.document;
            if let Some(scope) = document.scope_id()
                && scope != spec.scope
            {
                return Err(Error::validation(
                    Self::KIND,
                    &spec.name,
                    format!("scope cannot change from {scope} to {}", spec.scope),
                ));
            }
            spec.apply_to(&mut document);
            document.revision =
                RevisionPolicy::Increment.next(snapshot.token.revision().unwrap_or(0));

            let request = service::update(handle, &document)
                .map_err(|e| Error::transport(Self::KIND, handle, e))?;
            subject.send(self.transport, &request)?;
            log::info!("Updated service {} ({})", spec.name, handle);

            let mut updated = spec.clone();
            updated.object_id = Some(handle.to_string());
            Ok(Tracked::new(handle, Phase::Updated, updated))
        })
    }

    fn delete(&self, handle: &str) -> Result<Deletion> {
        if self.get(handle)?.is_none() {
            log::debug!("service {handle} already absent");
            return Ok(Deletion::AlreadyAbsent);
        }
        Subject::new(Self::KIND, handle).send(self.transport, &service::delete(handle))?;
        log::info!("Deleted service {handle}");
        Ok(Deletion::Deleted)
    }
}
