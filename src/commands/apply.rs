//! Reconciliation commands
//!
//! - `plan` - Show what apply would change
//! - `apply` - Make the manager match the manifest
//! - `refresh` - Re-read tracked objects
//! - `destroy` - Delete tracked objects

use anyhow::{Result, bail};
use colored::Colorize;

use super::{connect, load_desired, load_state};
use crate::Context;
use crate::cli::{ApplyArgs, DestroyArgs, PlanArgs};
use crate::engine::{self, AutoConfirm, Confirm, ExecuteOptions, PromptConfirm};
use crate::ui;

pub fn plan(ctx: &Context, args: PlanArgs) -> Result<()> {
    let desired = load_desired(&args.manifest.file)?;
    let engine = connect(ctx)?;
    let (mut state, _) = load_state(ctx)?;

    let report = engine::refresh(&engine, &mut state)?;
    if !ctx.quiet && !args.json {
        for address in &report.forgotten {
            ui::warn(&format!("{address} was deleted outside fwsync"));
        }
    }

    let plan = engine::plan(&desired, &state);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        engine::display_plan(&plan);
    }
    Ok(())
}

pub fn apply(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let desired = load_desired(&args.manifest.file)?;
    let engine = connect(ctx)?;
    let (mut state, state_path) = load_state(ctx)?;

    if !ctx.quiet {
        ui::header("Refreshing");
    }
    let report = engine::refresh(&engine, &mut state)?;
    state.save(&state_path)?;
    if !ctx.quiet {
        ui::dim(&format!("{} tracked objects read", report.refreshed));
        for address in &report.forgotten {
            ui::warn(&format!("{address} was deleted outside fwsync"));
        }
    }

    let plan = engine::plan(&desired, &state);
    engine::display_plan(&plan);

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args.jobs,
        yes: args.yes,
        verbose: ctx.verbose > 0,
    };
    let confirm: &dyn Confirm = if args.yes { &AutoConfirm } else { &PromptConfirm };
    let result = engine::execute(&engine, &plan, &mut state, &opts, confirm);
    state.save(&state_path)?;

    let summary = result?;
    if !summary.is_success() {
        bail!("{} of {} changes failed", summary.failed, plan.actions.len());
    }
    Ok(())
}

pub fn refresh(ctx: &Context) -> Result<()> {
    let engine = connect(ctx)?;
    let (mut state, state_path) = load_state(ctx)?;

    let report = engine::refresh(&engine, &mut state)?;
    state.save(&state_path)?;

    for address in &report.forgotten {
        ui::warn(&format!("{address} no longer exists, stopped tracking it"));
    }
    ui::success(&format!(
        "Refreshed {} objects ({} forgotten)",
        report.refreshed,
        report.forgotten.len()
    ));
    Ok(())
}

pub fn destroy(ctx: &Context, args: DestroyArgs) -> Result<()> {
    let engine = connect(ctx)?;
    let (mut state, state_path) = load_state(ctx)?;

    if let Some(target) = &args.target
        && state.get(target).is_none()
    {
        bail!("{target} is not tracked");
    }

    engine::refresh(&engine, &mut state)?;
    state.save(&state_path)?;

    let plan = engine::plan_destroy(&state, args.target.as_deref());
    if plan.is_empty() {
        ui::info("Nothing to destroy");
        return Ok(());
    }
    engine::display_plan(&plan);
    if !args.yes {
        println!();
        println!(
            "  {} {} objects will be deleted from the manager",
            "⚠".yellow(),
            plan.actions.len()
        );
    }

    let opts = ExecuteOptions {
        dry_run: false,
        jobs: args.jobs,
        yes: args.yes,
        verbose: ctx.verbose > 0,
    };
    let confirm: &dyn Confirm = if args.yes { &AutoConfirm } else { &PromptConfirm };
    let result = engine::execute(&engine, &plan, &mut state, &opts, confirm);
    state.save(&state_path)?;

    let summary = result?;
    if !summary.is_success() {
        bail!("{} of {} deletions failed", summary.failed, plan.actions.len());
    }
    Ok(())
}
