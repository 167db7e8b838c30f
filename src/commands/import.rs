use anyhow::{Result, bail};

use super::{connect, load_state};
use crate::Context;
use crate::cli::ImportArgs;
use crate::state::AppliedState;
use crate::ui;
use reconcile::{DesiredResource, Tracked};

pub fn run(ctx: &Context, args: ImportArgs) -> Result<()> {
    let engine = connect(ctx)?;
    let (mut state, state_path) = load_state(ctx)?;

    let tracked = engine.import(args.kind, &args.id)?;
    let address = adopt(&mut state, tracked)?;
    state.save(&state_path)?;

    ui::success(&format!("Imported {} as {address}", args.id));
    ui::dim("Add a matching entry to the manifest, or the next apply will delete it.");
    Ok(())
}

/// Track an imported object under its address.
///
/// Re-importing the same object is a no-op refresh; claiming an address or
/// handle already bound to something else is an error.
fn adopt(state: &mut AppliedState, tracked: Tracked<DesiredResource>) -> Result<String> {
    let address = tracked.spec.address();
    let kind = tracked.spec.kind();

    if let Some(entry) = state.get(&address)
        && entry.handle != tracked.handle
    {
        bail!(
            "{address} is already tracked as {}; remove it with 'fwsync state rm' first",
            entry.handle
        );
    }
    if let Some(other) = state.address_of(kind, &tracked.handle)
        && other != address
    {
        bail!("{} is already tracked as {other}", tracked.handle);
    }

    state.record(&address, tracked);
    Ok(address)
}
