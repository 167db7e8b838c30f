use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use reconcile::ResourceKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fwsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative firewall and security-object sync for NSX managers", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/fwsync/config.toml)
    #[arg(long, global = true, env = "FWSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Manager connection, overriding the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Manager base URL, e.g. https://nsxmanager.example.com
    #[arg(long, global = true, env = "FWSYNC_ENDPOINT")]
    pub endpoint: Option<String>,

    #[arg(long, global = true, env = "FWSYNC_USERNAME")]
    pub username: Option<String>,

    #[arg(long, global = true, env = "FWSYNC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(PlanArgs),

    /// Bring the manager in line with the manifest
    Apply(ApplyArgs),

    /// Re-read tracked objects and update state
    Refresh,

    /// Start tracking an object that already exists
    Import(ImportArgs),

    /// Delete tracked objects
    Destroy(DestroyArgs),

    /// Inspect or edit applied state
    #[command(subcommand)]
    State(StateCommand),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ManifestArgs {
    /// Manifest declaring the desired objects
    #[arg(short, long, default_value = "fwsync.toml")]
    pub file: PathBuf,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Dry run - show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of documents written in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Kind of object: firewall_rule, ip_set, security_policy_rule, service, edge_firewall_rule
    pub kind: ResourceKind,

    /// External identifier, e.g. `globalroot-0_web` or `edge-1_ssh`
    pub id: String,
}

#[derive(Args)]
pub struct DestroyArgs {
    /// Only destroy this address
    #[arg(short, long)]
    pub target: Option<String>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of documents written in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Subcommand)]
pub enum StateCommand {
    /// List tracked addresses
    List,

    /// Show one tracked object
    Show {
        address: String,
    },

    /// Stop tracking an object without deleting it
    Rm {
        address: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration and file locations
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_import_parses_kind() {
        let cli = Cli::try_parse_from(["fwsync", "import", "ip_set", "globalroot-0_web"]).unwrap();
        let Command::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.kind, ResourceKind::IpSet);
        assert_eq!(args.id, "globalroot-0_web");

        assert!(Cli::try_parse_from(["fwsync", "import", "nat_rule", "x"]).is_err());
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::try_parse_from([
            "fwsync", "-vv", "apply", "-f", "site.toml", "--yes", "-j", "8", "--endpoint", "https://m",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.connection.endpoint.as_deref(), Some("https://m"));
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(args.yes);
        assert!(!args.dry_run);
        assert_eq!(args.jobs, 8);
        assert_eq!(args.manifest.file, PathBuf::from("site.toml"));
    }
}
