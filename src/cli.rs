use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "groundwork")]
#[command(version)]
#[command(about = "Provision a workstation into a known-good state, safely re-runnable", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the provisioning pipeline
    Run(RunArgs),

    /// Show what a run would change, without sudo or changes
    Status(StatusArgs),

    /// List the pipeline steps in order
    Steps,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Default)]
pub struct StepSelection {
    /// Only run these steps (comma-separated, e.g. packages,repos)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Skip these steps (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Config file (default: $GROUNDWORK_CONFIG_DIR/config.toml)
    #[arg(long, env = "GROUNDWORK_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: StepSelection,

    /// Dry run - show what would be done
    #[arg(long)]
    pub dry_run: bool,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub selection: StepSelection,
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
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "groundwork",
            "run",
            "--dry-run",
            "--only",
            "packages,repos",
            "--skip=shell",
            "-y",
        ]);
        match cli.command {
            Command::Run(args) => {
                assert!(args.dry_run);
                assert!(args.yes);
                assert_eq!(args.selection.only, vec!["packages", "repos"]);
                assert_eq!(args.selection.skip, vec!["shell"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_verbosity_is_global() {
        let cli = Cli::parse_from(["groundwork", "status", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
