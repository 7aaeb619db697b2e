//! Configuration schema for contract-forge
//!
//! Configuration is stored at `~/.config/contract-forge/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const MB: usize = 1024 * 1024;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Filesystem locations
    pub paths: PathsConfig,

    /// Build slot pool settings
    pub pool: PoolConfig,

    /// JavaScript/TypeScript toolchain settings
    pub managed: ManagedConfig,

    /// Rust toolchain settings
    pub rust: RustConfig,

    /// wasm-opt pass settings
    pub optimizer: OptimizerConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append every compile outcome to the build journal
    pub journal: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            journal: true,
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root for templates, slots and caches (defaults to the data dir)
    pub root: Option<PathBuf>,
}

/// Build slot pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of persistent numbered slots
    pub size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { size: 5 }
    }
}

/// JavaScript/TypeScript (near-sdk-js) toolchain settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagedConfig {
    /// npm package providing the contract compiler
    pub sdk_package: String,

    /// Pinned SDK version installed into the template
    pub sdk_version: String,

    /// Timeout for the one-time dependency install
    pub install_timeout_secs: u64,

    /// Timeout for a single contract build
    pub build_timeout_secs: u64,

    /// Per-stream output cap for toolchain processes
    pub max_output_mb: usize,

    /// Sub-paths that must exist before the template is trusted
    pub required_paths: Vec<String>,

    /// Sub-paths whose files need execute permission after copying
    pub executable_paths: Vec<String>,

    /// Post-install hook re-run once when verification fails
    pub repair_command: Vec<String>,
}

impl ManagedConfig {
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn max_output_bytes(&self) -> usize {
        self.max_output_mb.max(1) * MB
    }
}

impl Default for ManagedConfig {
    fn default() -> Self {
        Self {
            sdk_package: "near-sdk-js".to_string(),
            sdk_version: "2.0.0".to_string(),
            install_timeout_secs: 180,
            build_timeout_secs: 240,
            max_output_mb: 50,
            required_paths: vec![
                "node_modules/near-sdk-js".to_string(),
                "node_modules/.bin/near-sdk-js".to_string(),
                "node_modules/near-sdk-js/lib/cli/deps/qjsc".to_string(),
                "node_modules/near-sdk-js/lib/cli/deps/wasi-sdk".to_string(),
            ],
            executable_paths: vec![
                "node_modules/.bin".to_string(),
                "node_modules/near-sdk-js/lib/cli/deps".to_string(),
            ],
            repair_command: vec![
                "npm".to_string(),
                "rebuild".to_string(),
                "near-sdk-js".to_string(),
            ],
        }
    }
}

/// Rust (near-sdk) toolchain settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RustConfig {
    /// Compilation target triple
    pub target: String,

    /// near-sdk version requirement written into the base project
    pub sdk_version: String,

    /// RUSTFLAGS passed to cargo
    pub rustflags: String,

    /// Timeout for a single cargo build
    pub build_timeout_secs: u64,

    /// Per-stream output cap for cargo
    pub max_output_mb: usize,

    /// Pre-build the base project to populate the shared target dir
    pub warm_base_project: bool,
}

impl RustConfig {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn max_output_bytes(&self) -> usize {
        self.max_output_mb.max(1) * MB
    }
}

impl Default for RustConfig {
    fn default() -> Self {
        Self {
            target: "wasm32-unknown-unknown".to_string(),
            sdk_version: "5".to_string(),
            rustflags: "-C link-arg=-s".to_string(),
            build_timeout_secs: 600,
            max_output_mb: 10,
            warm_base_project: true,
        }
    }
}

/// Binary-size optimizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Run the optimizer after successful builds
    pub enabled: bool,

    /// Optimizer executable
    pub program: String,

    /// Arguments placed before `-o <out> <in>`
    pub args: Vec<String>,

    /// Timeout for a single optimizer run
    pub timeout_secs: u64,
}

impl OptimizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "wasm-opt".to_string(),
            args: vec!["-Oz".to_string()],
            timeout_secs: 60,
        }
    }
}
