mod cli;
mod commands;
mod engine;
mod git;
mod paths;
mod progress;
mod runner;
mod schema;
mod signals;
mod steps;
mod sudo;
mod system;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
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

    let ctx = Context { quiet: cli.quiet };

    let code = match cli.command {
        Command::Run(args) => commands::run::run(&ctx, args)?,
        Command::Status(args) => commands::status::run(&ctx, args)?,
        Command::Steps => commands::steps::run()?,
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "groundwork", &mut io::stdout());
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
