//! Subcommand implementations

pub mod apply;
pub mod config;
pub mod import;
pub mod state;

use anyhow::{Context as AnyhowContext, Result};
use nsxkit::HttpTransport;
use reconcile::{DesiredResource, Engine};
use std::collections::BTreeMap;
use std::path::Path;

use crate::Context;
use crate::manifest::Manifest;
use crate::state::AppliedState;

/// Open a connection to the configured manager.
pub(crate) fn connect(ctx: &Context) -> Result<Engine> {
    let options = ctx.config.http_options()?;
    let username = options.username.clone();
    let transport = HttpTransport::new(options).context("Failed to set up HTTP client")?;
    log::debug!("Connecting to {} as {username}", transport.endpoint());
    Ok(Engine::new(transport, ctx.config.engine_options()))
}

/// Every resource the manifest at `path` declares, keyed by address.
pub(crate) fn load_desired(path: &Path) -> Result<BTreeMap<String, DesiredResource>> {
    let manifest = Manifest::load(path)?;
    if manifest.is_empty() {
        log::warn!("{} declares no resources; every tracked object will be planned for deletion", path.display());
    }
    let resources = manifest
        .resources()
        .with_context(|| format!("Invalid manifest: {}", path.display()))?;
    log::info!("{} declares {} resources", path.display(), resources.len());
    Ok(resources)
}

pub(crate) fn load_state(ctx: &Context) -> Result<(AppliedState, std::path::PathBuf)> {
    let path = ctx.config.state_path()?;
    let state = AppliedState::load(&path)?;
    Ok((state, path))
}
