//! Refresh tracked resources and plan the actions that converge them.

use anyhow::{Context, Result};
use reconcile::{DesiredResource, Engine, FieldChange, ResourceKind};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::state::AppliedState;

/// One planned change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Create {
        address: String,
        desired: DesiredResource,
    },
    Update {
        address: String,
        handle: String,
        desired: DesiredResource,
        #[serde(serialize_with = "serialize_changes")]
        changes: Vec<FieldChange>,
    },
    Delete {
        address: String,
        handle: String,
        /// Last known remote state.
        current: DesiredResource,
    },
}

fn serialize_changes<S: serde::Serializer>(
    changes: &[FieldChange],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(changes.iter().map(ToString::to_string))
}

/// When an action runs relative to the others.
///
/// Objects that rules reference are created before the rules and removed
/// after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Objects,
    Rules,
    Cleanup,
}

impl Action {
    pub fn address(&self) -> &str {
        match self {
            Self::Create { address, .. }
            | Self::Update { address, .. }
            | Self::Delete { address, .. } => address,
        }
    }

    pub fn resource(&self) -> &DesiredResource {
        match self {
            Self::Create { desired, .. } | Self::Update { desired, .. } => desired,
            Self::Delete { current, .. } => current,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.resource().kind()
    }

    /// Writes sharing this key touch the same remote document.
    pub fn document_key(&self) -> String {
        self.resource().document_key()
    }

    pub fn stage(&self) -> Stage {
        match (self, self.kind().is_shared()) {
            (_, true) => Stage::Rules,
            (Self::Delete { .. }, false) => Stage::Cleanup,
            (_, false) => Stage::Objects,
        }
    }
}

/// The ordered set of actions for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub actions: Vec<Action>,
    /// Tracked resources that already match.
    pub unchanged: usize,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn count(&self, f: impl Fn(&Action) -> bool) -> usize {
        self.actions.iter().filter(|a| f(a)).count()
    }

    /// Actions for one stage, grouped by document key.
    pub fn groups(&self, stage: Stage) -> BTreeMap<String, Vec<&Action>> {
        let mut groups: BTreeMap<String, Vec<&Action>> = BTreeMap::new();
        for action in self.actions.iter().filter(|a| a.stage() == stage) {
            groups.entry(action.document_key()).or_default().push(action);
        }
        groups
    }
}

/// Outcome of reading every tracked resource.
#[derive(Debug, Default)]
pub struct Refresh {
    pub refreshed: usize,
    /// Addresses whose remote object no longer exists.
    pub forgotten: Vec<String>,
}

/// Re-read every tracked resource, updating or forgetting its entry.
pub fn refresh(engine: &Engine, state: &mut AppliedState) -> Result<Refresh> {
    let mut report = Refresh::default();
    let tracked: Vec<(String, ResourceKind, String)> = state
        .resources
        .iter()
        .map(|(address, entry)| (address.clone(), entry.kind(), entry.handle.clone()))
        .collect();

    for (address, kind, handle) in tracked {
        let observed = engine
            .read(kind, &handle)
            .with_context(|| format!("Failed to refresh {address}"))?;
        match observed {
            Some(current) => {
                state.record(&address, current);
                report.refreshed += 1;
            }
            None => {
                log::info!("{address} no longer exists remotely, forgetting it");
                state.forget(&address);
                report.forgotten.push(address);
            }
        }
    }
    Ok(report)
}

/// Compare declared resources with refreshed state.
pub fn plan(desired: &BTreeMap<String, DesiredResource>, state: &AppliedState) -> Plan {
    let mut plan = Plan::default();

    for (address, resource) in desired {
        match state.get(address) {
            None => plan.actions.push(Action::Create {
                address: address.clone(),
                desired: resource.clone(),
            }),
            Some(entry) => {
                let changes = resource.drift(&entry.resource).unwrap_or_default();
                if changes.is_empty() {
                    plan.unchanged += 1;
                } else {
                    plan.actions.push(Action::Update {
                        address: address.clone(),
                        handle: entry.handle.clone(),
                        desired: resource.clone(),
                        changes,
                    });
                }
            }
        }
    }

    for (address, entry) in &state.resources {
        if !desired.contains_key(address) {
            plan.actions.push(Action::Delete {
                address: address.clone(),
                handle: entry.handle.clone(),
                current: entry.resource.clone(),
            });
        }
    }

    plan
}

/// Plan deletion of tracked resources, all of them or only `target`.
pub fn plan_destroy(state: &AppliedState, target: Option<&str>) -> Plan {
    let actions = state
        .resources
        .iter()
        .filter(|(address, _)| target.is_none_or(|t| t == address.as_str()))
        .map(|(address, entry)| Action::Delete {
            address: address.clone(),
            handle: entry.handle.clone(),
            current: entry.resource.clone(),
        })
        .collect();
    Plan {
        actions,
        unchanged: 0,
    }
}
