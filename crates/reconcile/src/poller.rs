//! Bounded confirmation that a deleted sub-entry is gone.
//!
//! Objects referenced by a rule cannot be deleted until the manager has
//! propagated the rule's removal. Re-reading the container until the entry
//! disappears closes that window.

use crate::error::{Error, Result};
use crate::kind::ResourceKind;
use std::time::Duration;

/// How hard to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Maximum number of checks. Zero skips confirmation.
    pub attempts: u32,
    /// Pause between checks.
    pub interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            interval: Duration::ZERO,
        }
    }
}

/// Check until `still_present` reports false, at most `options.attempts` times.
///
/// Check errors are returned immediately.
pub fn confirm_absent<F>(
    kind: ResourceKind,
    scope: &str,
    name: &str,
    options: PollOptions,
    mut still_present: F,
) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    if options.attempts == 0 {
        return Ok(());
    }

    for attempt in 1..=options.attempts {
        if attempt > 1 && !options.interval.is_zero() {
            std::thread::sleep(options.interval);
        }
        log::debug!(
            "Checking {} {}/{} is deleted: attempt {}",
            kind.label(),
            scope,
            name,
            attempt
        );
        if !still_present()? {
            log::debug!(
                "Confirmed {} {}/{} deleted after {} attempt(s)",
                kind.label(),
                scope,
                name,
                attempt
            );
            return Ok(());
        }
    }

    Err(Error::Timeout {
        kind,
        scope: scope.to_string(),
        name: name.to_string(),
        attempts: options.attempts,
    })
}
