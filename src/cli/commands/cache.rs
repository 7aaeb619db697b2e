//! Cache command - manage the Rust build cache

use crate::cache::CacheEntry;
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::ForgeResult;
use crate::fsutil::format_bytes;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> ForgeResult<()> {
    let engine = super::engine(config);

    match args.action {
        CacheAction::List { format } => {
            let entries = engine.cache().entries().await?;
            match format {
                OutputFormat::Table => print_cache_table(&entries),
                OutputFormat::Json => print_cache_json(&entries)?,
                OutputFormat::Plain => {
                    for entry in &entries {
                        println!("{}", entry.key);
                    }
                }
            }
            Ok(())
        }
        CacheAction::Clear { key, yes } => {
            let entries = engine.cache().entries().await?;
            let targets: Vec<&CacheEntry> = entries
                .iter()
                .filter(|e| key.as_deref().is_none_or(|k| e.key == k))
                .collect();

            if targets.is_empty() && key.is_none() {
                println!("No cache entries to clear.");
                return Ok(());
            }

            if key.is_none() {
                println!("This will remove {} cache entr(ies):", targets.len());
                for entry in &targets {
                    println!("  {} {}", style("•").red(), entry.key);
                }
                println!();

                let ctx = UiContext::detect().with_auto_yes(yes);
                if !ui::confirm(&ctx, "Are you sure?", false).await? {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            let removed = engine.cache().clear(key.as_deref()).await?;
            ui::step_ok(&format!("Cleared {} cache entr(ies)", removed));
            Ok(())
        }
    }
}

fn print_cache_table(entries: &[CacheEntry]) {
    if entries.is_empty() {
        println!("No cache entries found.");
        return;
    }

    println!("{:<24} {:<10} {:<10} {:<10} {:<18}", "KEY", "ARTIFACT", "OPTIMIZED", "ON DISK", "BUILT");
    println!("{}", "-".repeat(76));

    for entry in entries {
        let (artifact, optimized, built) = match entry.metadata {
            Some(ref m) => (
                format_bytes(m.artifact_size),
                if m.optimized {
                    style("yes").green().to_string()
                } else {
                    style("no").dim().to_string()
                },
                m.built_at.format("%Y-%m-%d %H:%M").to_string(),
            ),
            None => ("-".to_string(), "-".to_string(), style("incomplete").yellow().to_string()),
        };
        println!(
            "{:<24} {:<10} {:<10} {:<10} {:<18}",
            entry.key,
            artifact,
            optimized,
            format_bytes(entry.size_bytes),
            built
        );
    }

    println!();
    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    println!("Total: {} entr(ies), {}", entries.len(), format_bytes(total));
}

fn print_cache_json(entries: &[CacheEntry]) -> ForgeResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson<'a> {
        key: &'a str,
        path: String,
        size_bytes: u64,
        artifact_size: Option<u64>,
        optimized: Option<bool>,
        built_at: Option<String>,
    }

    let json: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            key: &e.key,
            path: e.path.display().to_string(),
            size_bytes: e.size_bytes,
            artifact_size: e.metadata.as_ref().map(|m| m.artifact_size),
            optimized: e.metadata.as_ref().map(|m| m.optimized),
            built_at: e.metadata.as_ref().map(|m| m.built_at.to_rfc3339()),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
