//! Optimistic-concurrency read-modify-write.
//!
//! A mutation never trusts a token it was handed earlier: the document is
//! read again, and the token from that read is the one the write carries.
//! A stale token comes back from the server as 409 or 412 and surfaces as
//! [`Error::Conflict`](crate::Error::Conflict). Nothing is retried.

use crate::error::Result;
use crate::kind::ResourceKind;
use std::fmt;

/// The version of a document as observed on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionToken {
    /// Integer revision carried in the document body.
    Revision(u64),
    /// Opaque `ETag` response header.
    ETag(String),
}

impl VersionToken {
    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        match self {
            Self::ETag(etag) => Some(etag),
            Self::Revision(_) => None,
        }
    }

    #[must_use]
    pub fn revision(&self) -> Option<u64> {
        match self {
            Self::Revision(revision) => Some(*revision),
            Self::ETag(_) => None,
        }
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Revision(revision) => write!(f, "revision {revision}"),
            Self::ETag(etag) => write!(f, "etag {etag}"),
        }
    }
}

/// A document together with the token observed when it was read.
#[derive(Debug, Clone)]
pub struct Snapshot<D> {
    pub document: D,
    pub token: VersionToken,
}

impl<D> Snapshot<D> {
    pub fn new(document: D, token: VersionToken) -> Self {
        Self { document, token }
    }
}

wire_enum! {
    /// What revision to send back on a revision-versioned write.
    #[derive(Default)]
    pub enum RevisionPolicy {
        /// Send the observed revision unchanged.
        Echo => "echo",
        /// Observed revision plus one.
        Increment => "increment",
        /// Observed revision added to itself.
        #[default]
        Double => "double",
    }
}

impl RevisionPolicy {
    /// Revision to write given the one observed.
    #[must_use]
    pub fn next(self, observed: u64) -> u64 {
        match self {
            Self::Echo => observed,
            Self::Increment => observed.saturating_add(1),
            Self::Double => observed.saturating_add(observed),
        }
    }
}

/// Read the current version of a document, then run `mutate` against it.
///
/// Returns `Ok(None)` without calling `mutate` when the document is gone.
pub fn with_current_version<D, R, Read, Mutate>(
    kind: ResourceKind,
    name: &str,
    read: Read,
    mutate: Mutate,
) -> Result<Option<R>>
where
    Read: FnOnce() -> Result<Option<Snapshot<D>>>,
    Mutate: FnOnce(Snapshot<D>) -> Result<R>,
{
    let Some(snapshot) = read()? else {
        log::debug!("{} '{}': document gone before write", kind.label(), name);
        return Ok(None);
    };
    log::debug!("{} '{}': observed {}", kind.label(), name, snapshot.token);
    mutate(snapshot).map(Some)
}
