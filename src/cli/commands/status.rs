//! Status command - check toolchains and workspace health

use crate::config::Config;
use crate::error::ForgeResult;
use crate::fsutil::format_bytes;
use crate::toolchain::{CommandRunner, Invocation, ProcessRunner, ToolchainKind};
use crate::ui;
use console::style;
use std::time::Duration;

/// Execute the status command
pub async fn execute(config: &Config) -> ForgeResult<()> {
    ui::header("contract-forge status");

    let engine = super::engine(config);
    let mut all_ok = true;

    ui::section("Toolchains:");
    for (kind, name, hint) in [
        (ToolchainKind::Managed, "node", "Install Node.js 18+ from https://nodejs.org"),
        (ToolchainKind::Rust, "cargo", "Install Rust from https://rustup.rs"),
    ] {
        match engine.toolchain().version(kind).await {
            Some(version) => ui::step_ok_detail(name, &version),
            None => {
                ui::step_warn_hint(&format!("{} not found", name), hint);
                all_ok = false;
            }
        }
    }
    check_optimizer(config).await;

    ui::section("Workspace template:");
    let template = engine.template();
    if !template.dir().exists() {
        ui::step_info("Not created yet (built on the first JavaScript/TypeScript compile)");
    } else {
        let missing = template.missing_paths();
        if missing.is_empty() {
            ui::step_ok_detail("Verified", &template.dir().display().to_string());
        } else {
            ui::step_warn_hint(
                &format!("Incomplete, missing {} path(s)", missing.len()),
                "Run: forge template init --force",
            );
            all_ok = false;
        }
    }

    ui::section("Build pool:");
    let pool = engine.pool().status().await;
    let busy = pool.slots.iter().filter(|s| s.marker_present).count();
    ui::key_value_status("slots", &format!("{} ({} busy)", pool.slots.len(), busy), busy == 0);
    ui::key_value_status("temporary", &pool.overflow.to_string(), pool.overflow == 0);

    ui::section("Rust cache:");
    let entries = engine.cache().entries().await?;
    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    ui::key_value("entries", &entries.len().to_string());
    ui::key_value("size", &format_bytes(total));
    ui::key_value("root", &engine.layout().root().display().to_string());

    println!();
    if all_ok {
        println!("{}", style("All critical checks passed").green().bold());
    } else {
        println!("{}", style("Some checks failed - see above for details").yellow().bold());
    }

    Ok(())
}

async fn check_optimizer(config: &Config) {
    let settings = &config.optimizer;
    if !settings.enabled {
        ui::step_info(&format!("{} disabled", settings.program));
        return;
    }

    let invocation = Invocation::new(&settings.program, std::env::temp_dir())
        .arg("--version")
        .timeout(Duration::from_secs(15));
    match ProcessRunner::new().run(&invocation).await {
        Ok(output) => ui::step_ok_detail(&settings.program, output.stdout.trim()),
        Err(_) => ui::step_warn_hint(
            &format!("{} not found, artifacts will not be size-optimized", settings.program),
            "Install binaryen",
        ),
    }
}
