//! Pool command - inspect or reset build slots

use crate::cli::args::{OutputFormat, PoolAction, PoolArgs};
use crate::config::Config;
use crate::error::ForgeResult;
use crate::pool::PoolStatus;
use crate::ui;
use console::style;

/// Execute the pool command
pub async fn execute(args: PoolArgs, config: &Config) -> ForgeResult<()> {
    let engine = super::engine(config);

    match args.action {
        PoolAction::Status { format } => {
            let status = engine.pool().status().await;
            match format {
                OutputFormat::Table => print_status_table(&status),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                OutputFormat::Plain => {
                    for slot in &status.slots {
                        println!("{}", slot.path.display());
                    }
                }
            }
        }
        PoolAction::Reset => {
            let report = engine.pool().reset().await?;
            ui::step_ok(&format!(
                "Removed {} stale marker(s) and {} temporary slot(s)",
                report.markers_removed, report.overflow_removed
            ));
        }
    }

    Ok(())
}

fn print_status_table(status: &PoolStatus) {
    println!("{:<10} {:<10} {:<14} {}", "SLOT", "STATE", "DEPENDENCIES", "PATH");
    println!("{}", "-".repeat(72));

    for slot in &status.slots {
        let state = if slot.marker_present {
            style("busy").yellow().to_string()
        } else {
            style("free").green().to_string()
        };
        let deps = if slot.dependencies_present { "copied" } else { "-" };
        println!(
            "{:<10} {:<10} {:<14} {}",
            format!("build-{}", slot.index),
            state,
            deps,
            slot.path.display()
        );
    }

    println!();
    println!("Temporary slots: {}", status.overflow);
    if status.overflow > 0 || status.slots.iter().any(|s| s.marker_present) {
        ui::remark("Stale markers left by a crashed process can be cleared with: forge pool reset");
    }
}
