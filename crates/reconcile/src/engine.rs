//! Kind-dispatching facade over the lifecycle controllers.

use crate::coordinator::RevisionPolicy;
use crate::error::{Error, Result};
use crate::kind::ResourceKind;
use crate::lifecycle::{Deletion, Lifecycle, Tracked};
use crate::poller::PollOptions;
use crate::resources::{
    DesiredResource, EdgeFirewallRules, FirewallRules, IpSets, SecurityPolicyRules, Services,
};
use nsxkit::Transport;

/// Tunables shared by every controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Deletion confirmation for shared-document sub-entries.
    pub poll: PollOptions,
    /// Revision sent on security-policy writes.
    pub policy_revision: RevisionPolicy,
}

/// Runs lifecycle operations against one remote manager.
///
/// The engine holds no mutable state, so one instance can be shared across
/// threads.
pub struct Engine {
    transport: Box<dyn Transport>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(transport: impl Transport + 'static, options: EngineOptions) -> Self {
        Self {
            transport: Box::new(transport),
            options,
        }
    }

    pub fn firewall_rules(&self) -> FirewallRules<'_> {
        FirewallRules::new(self.transport.as_ref(), self.options.poll)
    }

    pub fn ip_sets(&self) -> IpSets<'_> {
        IpSets::new(self.transport.as_ref())
    }

    pub fn security_policy_rules(&self) -> SecurityPolicyRules<'_> {
        SecurityPolicyRules::new(
            self.transport.as_ref(),
            self.options.policy_revision,
            self.options.poll,
        )
    }

    pub fn services(&self) -> Services<'_> {
        Services::new(self.transport.as_ref())
    }

    pub fn edge_firewall_rules(&self) -> EdgeFirewallRules<'_> {
        EdgeFirewallRules::new(self.transport.as_ref(), self.options.poll)
    }

    pub fn create(&self, desired: &DesiredResource) -> Result<Tracked<DesiredResource>> {
        log::debug!("create {}", desired.address());
        Ok(match desired {
            DesiredResource::FirewallRule(s) => {
                self.firewall_rules().create(s)?.map(DesiredResource::FirewallRule)
            }
            DesiredResource::IpSet(s) => self.ip_sets().create(s)?.map(DesiredResource::IpSet),
            DesiredResource::SecurityPolicyRule(s) => self
                .security_policy_rules()
                .create(s)?
                .map(DesiredResource::SecurityPolicyRule),
            DesiredResource::Service(s) => self.services().create(s)?.map(DesiredResource::Service),
            DesiredResource::EdgeFirewallRule(s) => self
                .edge_firewall_rules()
                .create(s)?
                .map(DesiredResource::EdgeFirewallRule),
        })
    }

    pub fn read(&self, kind: ResourceKind, handle: &str) -> Result<Option<Tracked<DesiredResource>>> {
        log::debug!("read {kind} {handle}");
        Ok(match kind {
            ResourceKind::FirewallRule => self
                .firewall_rules()
                .read(handle)?
                .map(|t| t.map(DesiredResource::FirewallRule)),
            ResourceKind::IpSet => self.ip_sets().read(handle)?.map(|t| t.map(DesiredResource::IpSet)),
            ResourceKind::SecurityPolicyRule => self
                .security_policy_rules()
                .read(handle)?
                .map(|t| t.map(DesiredResource::SecurityPolicyRule)),
            ResourceKind::Service => self
                .services()
                .read(handle)?
                .map(|t| t.map(DesiredResource::Service)),
            ResourceKind::EdgeFirewallRule => self
                .edge_firewall_rules()
                .read(handle)?
                .map(|t| t.map(DesiredResource::EdgeFirewallRule)),
        })
    }

    /// Rewrite the object behind `handle`. `Ok(None)` when it is gone.
    pub fn update(
        &self,
        handle: &str,
        desired: &DesiredResource,
    ) -> Result<Option<Tracked<DesiredResource>>> {
        log::debug!("update {} ({handle})", desired.address());
        Ok(match desired {
            DesiredResource::FirewallRule(s) => self
                .firewall_rules()
                .update(handle, s)?
                .map(|t| t.map(DesiredResource::FirewallRule)),
            DesiredResource::IpSet(s) => self
                .ip_sets()
                .update(handle, s)?
                .map(|t| t.map(DesiredResource::IpSet)),
            DesiredResource::SecurityPolicyRule(s) => self
                .security_policy_rules()
                .update(handle, s)?
                .map(|t| t.map(DesiredResource::SecurityPolicyRule)),
            DesiredResource::Service(s) => self
                .services()
                .update(handle, s)?
                .map(|t| t.map(DesiredResource::Service)),
            DesiredResource::EdgeFirewallRule(s) => self
                .edge_firewall_rules()
                .update(handle, s)?
                .map(|t| t.map(DesiredResource::EdgeFirewallRule)),
        })
    }

    pub fn delete(&self, kind: ResourceKind, handle: &str) -> Result<Deletion> {
        log::debug!("delete {kind} {handle}");
        match kind {
            ResourceKind::FirewallRule => self.firewall_rules().delete(handle),
            ResourceKind::IpSet => self.ip_sets().delete(handle),
            ResourceKind::SecurityPolicyRule => self.security_policy_rules().delete(handle),
            ResourceKind::Service => self.services().delete(handle),
            ResourceKind::EdgeFirewallRule => self.edge_firewall_rules().delete(handle),
        }
    }

    /// Adopt an existing object by its external identifier.
    ///
    /// Unlike [`read`](Self::read), a missing object is an error.
    pub fn import(&self, kind: ResourceKind, id: &str) -> Result<Tracked<DesiredResource>> {
        log::debug!("import {kind} {id}");
        let imported = match kind {
            ResourceKind::FirewallRule => self
                .firewall_rules()
                .import(id)?
                .map(|t| t.map(DesiredResource::FirewallRule)),
            ResourceKind::IpSet => self.ip_sets().import(id)?.map(|t| t.map(DesiredResource::IpSet)),
            ResourceKind::SecurityPolicyRule => self
                .security_policy_rules()
                .import(id)?
                .map(|t| t.map(DesiredResource::SecurityPolicyRule)),
            ResourceKind::Service => self
                .services()
                .import(id)?
                .map(|t| t.map(DesiredResource::Service)),
            ResourceKind::EdgeFirewallRule => self
                .edge_firewall_rules()
                .import(id)?
                .map(|t| t.map(DesiredResource::EdgeFirewallRule)),
        };
        imported.ok_or_else(|| Error::not_found(kind, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Phase;
    use crate::resources::IpSetSpec;
    use nsxkit::{Method, MockTransport, Response};
    use std::sync::Arc;

    const IPSETS: &str = "/api/2.0/services/ipset/scope/globalroot-0";

    fn engine() -> (Engine, Arc<MockTransport>) {
        let mock = Arc::new(MockTransport::new());
        let engine = Engine::new(Arc::clone(&mock), EngineOptions::default());
        (engine, mock)
    }

    fn web() -> DesiredResource {
        DesiredResource::IpSet(IpSetSpec {
            scope: "globalroot-0".into(),
            name: "web".into(),
            description: String::new(),
            value: "10.0.0.1".into(),
            object_id: None,
        })
    }

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.poll.attempts, 3);
        assert_eq!(options.policy_revision, RevisionPolicy::Double);
    }

    #[test]
    fn test_create_dispatches_by_kind() {
        let (engine, mock) = engine();
        mock.respond(Method::Get, IPSETS, Response::ok("[]"));
        mock.respond(Method::Post, "/api/2.0/services/ipset/globalroot-0", Response::new(201, "ipset-9"));

        let tracked = engine.create(&web()).unwrap();
        assert_eq!(tracked.handle, "globalroot-0_web");
        assert_eq!(tracked.phase, Phase::Created);
        assert!(matches!(tracked.spec, DesiredResource::IpSet(ref s) if s.object_id.as_deref() == Some("ipset-9")));
    }

    #[test]
    fn test_read_absent_returns_none() {
        let (engine, mock) = engine();
        mock.respond(Method::Get, IPSETS, Response::ok("[]"));
        assert!(engine.read(ResourceKind::IpSet, "globalroot-0_web").unwrap().is_none());
    }

    #[test]
    fn test_import_absent_is_not_found() {
        let (engine, mock) = engine();
        mock.respond(Method::Get, IPSETS, Response::ok("[]"));
        let err = engine.import(ResourceKind::IpSet, "globalroot-0_web").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_import_existing() {
        let (engine, mock) = engine();
        mock.respond(
            Method::Get,
            IPSETS,
            Response::ok(r#"[{"objectId":"ipset-9","name":"web","value":"10.0.0.1","revision":2}]"#),
        );
        let tracked = engine.import(ResourceKind::IpSet, "globalroot-0_web").unwrap();
        assert_eq!(tracked.spec.address(), "ip_set:globalroot-0/web");
        assert_eq!(tracked.spec.drift(&web()), Some(Vec::new()));
    }

    #[test]
    fn test_engine_is_shareable_across_threads() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<Engine>();
    }
}
