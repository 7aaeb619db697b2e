//! forge - smart-contract build orchestrator
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use contract_forge::cli::{Cli, Commands, LogFormat};
use contract_forge::config::ConfigManager;
use contract_forge::error::ForgeResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ForgeResult<()> {
    let cli = Cli::parse();

    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = manager.load().await?;

    let json_logs = match cli.log_format {
        Some(format) => format == LogFormat::Json,
        None => config.general.log_format.eq_ignore_ascii_case("json"),
    };
    init_logging(cli.verbose, json_logs);

    match cli.command {
        Commands::Compile(args) => contract_forge::cli::commands::compile(args, &config).await,
        Commands::Migrate(args) => contract_forge::cli::commands::migrate(args).await,
        Commands::Template(args) => contract_forge::cli::commands::template(args, &config).await,
        Commands::Pool(args) => contract_forge::cli::commands::pool(args, &config).await,
        Commands::Cache(args) => contract_forge::cli::commands::cache(args, &config).await,
        Commands::Config(args) => contract_forge::cli::commands::config(args, &config, &manager).await,
        Commands::Status => contract_forge::cli::commands::status(&config).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; `RUST_LOG` wins when set
fn init_logging(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "contract_forge=warn",
        1 => "contract_forge=info",
        _ => "contract_forge=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
