//! Applied state: what fwsync has created or adopted, keyed by address.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reconcile::{DesiredResource, Phase, ResourceKind, Tracked};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One tracked remote object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// External identifier used to find the object again.
    pub handle: String,
    pub phase: Phase,
    /// Remote state as of the last operation.
    pub resource: DesiredResource,
    pub applied_at: DateTime<Utc>,
}

impl Entry {
    pub fn kind(&self) -> ResourceKind {
        self.resource.kind()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppliedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub resources: BTreeMap<String, Entry>,
}

impl AppliedState {
    /// Load state from disk, or return an empty state if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded {} tracked resources from {}", state.resources.len(), path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.last_updated = Some(Utc::now());
        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;
        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&Entry> {
        self.resources.get(address)
    }

    /// Record the outcome of a create, read, update or import.
    pub fn record(&mut self, address: &str, tracked: Tracked<DesiredResource>) {
        self.resources.insert(
            address.to_string(),
            Entry {
                handle: tracked.handle,
                phase: tracked.phase,
                resource: tracked.spec,
                applied_at: Utc::now(),
            },
        );
    }

    pub fn forget(&mut self, address: &str) -> Option<Entry> {
        self.resources.remove(address)
    }

    /// Address already tracking `handle` of `kind`, if any.
    pub fn address_of(&self, kind: ResourceKind, handle: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|(_, e)| e.kind() == kind && e.handle == handle)
            .map(|(address, _)| address.as_str())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
