use anyhow::Result;
use colored::Colorize;

use crate::schema::ProvisionConfig;
use crate::steps;
use crate::ui;

/// Print the step catalog in pipeline order
pub fn run() -> Result<i32> {
    ui::header("Pipeline Steps");
    println!();

    for step in steps::build_pipeline(&ProvisionConfig::default())? {
        println!("  {:<15} {}", step.name().bold(), step.description().dimmed());
    }

    println!();
    ui::section("Usage Examples");
    println!();
    println!("  {} Run every step", "groundwork run".bold());
    println!(
        "  {} Skip specific steps",
        "groundwork run --skip=defaults,mas".bold()
    );
    println!(
        "  {} Run only specific steps",
        "groundwork run --only=packages,repos".bold()
    );
    println!(
        "  {} Preview without changes",
        "groundwork status".bold()
    );
    Ok(0)
}
