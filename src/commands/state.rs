use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;

use super::load_state;
use crate::Context;
use crate::cli::StateCommand;
use crate::ui;

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    match cmd {
        StateCommand::List => list(ctx),
        StateCommand::Show { address } => show(ctx, &address),
        StateCommand::Rm { address } => rm(ctx, &address),
    }
}

fn list(ctx: &Context) -> Result<()> {
    let (state, path) = load_state(ctx)?;
    if state.is_empty() {
        ui::info(&format!("Nothing tracked in {}", path.display()));
        return Ok(());
    }

    ui::header(&format!("Tracked objects ({})", state.len()));
    for (address, entry) in &state.resources {
        println!(
            "  {:<50} {} {}",
            address,
            entry.handle.dimmed(),
            format!("[{}]", entry.phase).dimmed()
        );
    }
    if let Some(updated) = state.last_updated {
        println!();
        ui::kv("Last updated", &updated.to_rfc3339());
    }
    Ok(())
}

fn show(ctx: &Context, address: &str) -> Result<()> {
    let (state, _) = load_state(ctx)?;
    let entry = state
        .get(address)
        .with_context(|| format!("{address} is not tracked"))?;

    ui::header(address);
    ui::kv("Handle", &entry.handle);
    ui::kv("Phase", &entry.phase.to_string());
    ui::kv("Applied", &entry.applied_at.to_rfc3339());
    println!();
    let body = toml::to_string_pretty(&entry.resource).context("Failed to render resource")?;
    for line in body.lines() {
        println!("  {line}");
    }
    Ok(())
}

fn rm(ctx: &Context, address: &str) -> Result<()> {
    let (mut state, path) = load_state(ctx)?;
    let Some(entry) = state.forget(address) else {
        bail!("{address} is not tracked");
    };
    state.save(&path)?;
    ui::success(&format!(
        "Stopped tracking {address} ({}); the remote object was left in place",
        entry.handle
    ));
    Ok(())
}
