mod cli;
mod commands;
mod config;
mod engine;
mod manifest;
mod paths;
mod progress;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::{Config, Overrides};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Effective configuration, overrides applied.
    pub config: Config,
    /// Config file given on the command line, if any.
    pub config_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "fwsync", &mut io::stdout());
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_overrides(Overrides {
        endpoint: cli.connection.endpoint,
        username: cli.connection.username,
        password: cli.connection.password,
    });

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config,
        config_path: cli.config,
    };

    match cli.command {
        Command::Plan(args) => commands::apply::plan(&ctx, args),
        Command::Apply(args) => commands::apply::apply(&ctx, args),
        Command::Refresh => commands::apply::refresh(&ctx),
        Command::Import(args) => commands::import::run(&ctx, args),
        Command::Destroy(args) => commands::apply::destroy(&ctx, args),
        Command::State(cmd) => commands::state::run(&ctx, cmd),
        Command::Config(cmd) => commands::config::run(&ctx, cmd),
        Command::Completions { .. } => Ok(()),
    }
}
