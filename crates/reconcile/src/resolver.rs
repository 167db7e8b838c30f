//! Name to identity resolution.
//!
//! The API has no lookup by name. Resolution lists the whole collection for
//! a scope and filters it client side.

use crate::error::Result;
use crate::kind::ResourceKind;

/// Objects that carry a human-assigned name.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for nsxkit::api::ipset::IpSet {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for nsxkit::api::service::ApplicationService {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for nsxkit::api::security_policy::SecurityPolicy {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for nsxkit::api::security_policy::FirewallAction {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for nsxkit::api::firewall::Rule {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for nsxkit::api::edge_firewall::EdgeRule {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Find the first object in `scope` whose name equals `name` exactly.
///
/// `Ok(None)` means the listing succeeded and nothing matched. A failed
/// listing is returned as an error, never as "not found".
pub fn resolve<T, F>(kind: ResourceKind, scope: &str, name: &str, list: F) -> Result<Option<T>>
where
    T: Named,
    F: FnOnce() -> Result<Vec<T>>,
{
    log::debug!("Resolving {} '{}' in {}", kind.label(), name, scope);
    let found = list()?.into_iter().find(|item| item.name() == name);
    if found.is_none() {
        log::debug!("{} '{}' not present in {}", kind.label(), name, scope);
    }
    Ok(found)
}
