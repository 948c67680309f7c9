//! Status command - what a run would change, without sudo

use anyhow::Result;

use crate::Context as AppContext;
use crate::cli::StatusArgs;
use crate::commands::run::execute;
use crate::engine::RunOptions;

pub fn run(ctx: &AppContext, args: StatusArgs) -> Result<i32> {
    // A dry run never acquires privilege and never prompts
    let options = RunOptions {
        dry_run: true,
        assume_yes: true,
    };
    execute(ctx, "Groundwork - Status", &args.selection, options)
}
