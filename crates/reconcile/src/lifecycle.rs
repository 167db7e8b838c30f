//! The per-kind CRUD state machine.

use crate::error::Result;
use crate::kind::ResourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a tracked resource is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planned,
    Created,
    Read,
    Updated,
    Deleted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planned => "planned",
            Self::Created => "created",
            Self::Read => "read",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// A resource the caller knows how to find again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracked<S> {
    /// Composite external identifier.
    pub handle: String,
    pub phase: Phase,
    /// Remote state as of this operation, computed fields filled in.
    pub spec: S,
}

impl<S> Tracked<S> {
    pub fn new(handle: impl Into<String>, phase: Phase, spec: S) -> Self {
        Self {
            handle: handle.into(),
            phase,
            spec,
        }
    }

    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> Tracked<T> {
        Tracked {
            handle: self.handle,
            phase: self.phase,
            spec: f(self.spec),
        }
    }
}

/// Outcome of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    /// Nothing to delete; no write was issued.
    AlreadyAbsent,
}

/// Create, read, update, delete and import for one resource kind.
///
/// `read`, `update` and `import` return `Ok(None)` when the object no longer
/// exists; the caller should drop its handle.
pub trait Lifecycle {
    type Spec;

    const KIND: ResourceKind;

    /// Validate, check for a same-named object, then create.
    fn create(&self, spec: &Self::Spec) -> Result<Tracked<Self::Spec>>;

    fn read(&self, handle: &str) -> Result<Option<Tracked<Self::Spec>>>;

    /// Rewrite the object behind `handle` to match `spec`.
    fn update(&self, handle: &str, spec: &Self::Spec) -> Result<Option<Tracked<Self::Spec>>>;

    fn delete(&self, handle: &str) -> Result<Deletion>;

    /// Adopt an object created outside this tool.
    fn import(&self, id: &str) -> Result<Option<Tracked<Self::Spec>>> {
        self.read(id)
    }
}
