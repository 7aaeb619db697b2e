//! CLI argument definitions using clap derive

use crate::build::Language;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// contract-forge - smart-contract build orchestrator
///
/// Compiles NEAR contracts written in Rust, JavaScript or TypeScript
/// using reusable workspaces and a persistent compilation cache.
#[derive(Parser, Debug)]
#[command(name = "forge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "FORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format (overrides general.log_format)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a contract to WebAssembly
    Compile(CompileArgs),

    /// Rewrite legacy near-sdk Rust syntax to the current form
    Migrate(MigrateArgs),

    /// Manage the JavaScript/TypeScript workspace template
    Template(TemplateArgs),

    /// Inspect or reset the build slot pool
    Pool(PoolArgs),

    /// Manage the Rust build cache
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Check toolchains and workspace health
    Status,
}

/// Arguments for the compile command
#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Contract source file
    pub file: PathBuf,

    /// Source language (inferred from the file extension when omitted)
    #[arg(short, long)]
    pub language: Option<Language>,

    /// Cache key for Rust builds, replacing the content digest
    #[arg(short, long)]
    pub project_id: Option<String>,

    /// Where to write the artifact (defaults to <file stem>.wasm)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Rust contract source file
    pub file: PathBuf,

    /// Only report whether the file needs migrating
    #[arg(long)]
    pub check: bool,
}

#[derive(Parser, Debug)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub action: TemplateAction,
}

/// Template subcommands
#[derive(Subcommand, Debug)]
pub enum TemplateAction {
    /// Bootstrap the template if missing or incomplete
    Init {
        /// Delete and rebuild even a verified template
        #[arg(short, long)]
        force: bool,
    },

    /// Check the template against the required paths
    Verify,
}

#[derive(Parser, Debug)]
pub struct PoolArgs {
    #[command(subcommand)]
    pub action: PoolAction,
}

/// Pool subcommands
#[derive(Subcommand, Debug)]
pub enum PoolAction {
    /// Show slot markers and overflow directories
    Status {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove stale markers and temporary slots left by a crash
    Reset,
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cache entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove one entry, or all of them
    Clear {
        /// Entry key (project id or source digest)
        key: Option<String>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_compile() {
        let cli = Cli::parse_from(["forge", "compile", "contract.ts", "--project-id", "demo", "-f", "json"]);
        match cli.command {
            Commands::Compile(args) => {
                assert_eq!(args.file, PathBuf::from("contract.ts"));
                assert_eq!(args.project_id.as_deref(), Some("demo"));
                assert_eq!(args.format, OutputFormat::Json);
                assert!(args.language.is_none());
            }
            _ => panic!("expected Compile command"),
        }
    }

    #[test]
    fn cli_parses_language_alias() {
        let cli = Cli::parse_from(["forge", "compile", "c.txt", "--language", "ts"]);
        match cli.command {
            Commands::Compile(args) => assert_eq!(args.language, Some(Language::TypeScript)),
            _ => panic!("expected Compile command"),
        }
    }

    #[test]
    fn cli_parses_migrate_check() {
        let cli = Cli::parse_from(["forge", "migrate", "lib.rs", "--check"]);
        assert!(matches!(cli.command, Commands::Migrate(MigrateArgs { check: true, .. })));
    }

    #[test]
    fn cli_parses_cache_clear() {
        let cli = Cli::parse_from(["forge", "cache", "clear", "demo", "-y"]);
        match cli.command {
            Commands::Cache(CacheArgs {
                action: CacheAction::Clear { key, yes },
            }) => {
                assert_eq!(key.as_deref(), Some("demo"));
                assert!(yes);
            }
            _ => panic!("expected cache clear"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["forge", "status", "-vv", "--log-format", "json"]);
        assert!(matches!(cli.command, Commands::Status));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, Some(LogFormat::Json));
    }

    #[test]
    fn cli_parses_config_without_action() {
        let cli = Cli::parse_from(["forge", "config"]);
        assert!(matches!(cli.command, Commands::Config(ConfigArgs { action: None })));
    }
}
