use anyhow::Result;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::{paths, ui};

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    ui::header("Configuration");

    let file = match &ctx.config_path {
        Some(path) => path.clone(),
        None => paths::config_file()?,
    };
    let found = if file.exists() { "" } else { " (not found, using defaults)" };
    ui::kv("Config file", &format!("{}{found}", file.display()));
    ui::kv("State file", &ctx.config.state_path()?.display().to_string());
    println!();

    for line in ctx.config.to_display_toml()?.lines() {
        println!("  {line}");
    }
    Ok(())
}
