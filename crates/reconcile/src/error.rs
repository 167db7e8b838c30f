//! Error types for reconciliation.
//!
//! Every error names the resource kind and the name or identity it concerns.
//! Errors that originate from a remote response also carry the status code
//! and the raw response body.

use crate::kind::ResourceKind;
use std::fmt;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of engine errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The object or its parent does not exist.
    Missing,
    /// An object with the same name already exists in the scope.
    Duplicate,
    /// The version token was stale when the write reached the server.
    Conflict,
    /// The declared resource is invalid.
    Invalid,
    /// The transport failed or the server answered with an unexpected status.
    Remote,
    /// Deletion was not confirmed within the allowed attempts.
    Timeout,
}

impl ErrorCategory {
    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Missing => "Check the scope, section, policy or edge the resource refers to",
            Self::Duplicate => "Import the existing object or choose a different name",
            Self::Conflict => "Another client changed the document; run the command again",
            Self::Invalid => "Fix the resource definition in the manifest",
            Self::Remote => "Check connectivity and the manager's response shown above",
            Self::Timeout => "The manager is slow to propagate deletes; raise engine.poll_attempts",
        }
    }
}

/// Errors that can occur while reconciling a resource.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{} '{name}' not found{}", .kind.label(), within_suffix(.within))]
    NotFound {
        kind: ResourceKind,
        name: String,
        /// The parent that was searched, when it is not obvious from the name.
        within: Option<String>,
    },

    #[error("{} '{name}' already exists in {scope}", .kind.label())]
    AlreadyExists {
        kind: ResourceKind,
        scope: String,
        name: String,
    },

    #[error("{} '{name}': version conflict (status {status}): {body}", .kind.label())]
    Conflict {
        kind: ResourceKind,
        name: String,
        status: u16,
        body: String,
    },

    #[error("{} '{name}': {message}", .kind.label())]
    Validation {
        kind: ResourceKind,
        name: String,
        message: String,
    },

    #[error("{} '{name}': {}", .kind.label(), transport_detail(.status, .message))]
    Transport {
        kind: ResourceKind,
        name: String,
        /// HTTP status, absent when no response was obtained.
        status: Option<u16>,
        message: String,
    },

    #[error("{} '{name}' in {scope} still present after {attempts} checks", .kind.label())]
    Timeout {
        kind: ResourceKind,
        scope: String,
        name: String,
        attempts: u32,
    },
}

fn within_suffix(within: &Option<String>) -> String {
    within
        .as_ref()
        .map(|w| format!(" in {w}"))
        .unwrap_or_default()
}

fn transport_detail(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("status {status}: {message}"),
        None => message.to_string(),
    }
}

impl Error {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
            within: None,
        }
    }

    pub fn validation(kind: ResourceKind, name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Validation {
            kind,
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Wrap a transport failure with resource context.
    pub fn transport(kind: ResourceKind, name: impl Into<String>, source: nsxkit::Error) -> Self {
        Self::Transport {
            kind,
            name: name.into(),
            status: None,
            message: source.to_string(),
        }
    }

    /// An unexpected response status.
    pub fn status(kind: ResourceKind, name: impl Into<String>, status: u16, body: &str) -> Self {
        Self::Transport {
            kind,
            name: name.into(),
            status: Some(status),
            message: body.to_string(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::Missing,
            Error::AlreadyExists { .. } => ErrorCategory::Duplicate,
            Error::Conflict { .. } => ErrorCategory::Conflict,
            Error::Validation { .. } => ErrorCategory::Invalid,
            Error::Transport { .. } => ErrorCategory::Remote,
            Error::Timeout { .. } => ErrorCategory::Timeout,
        }
    }

    /// The resource kind this error concerns.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Error::NotFound { kind, .. }
            | Error::AlreadyExists { kind, .. }
            | Error::Conflict { kind, .. }
            | Error::Validation { kind, .. }
            | Error::Transport { kind, .. }
            | Error::Timeout { kind, .. } => *kind,
        }
    }
}
