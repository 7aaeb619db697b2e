//! Error types for contract-forge
//!
//! All modules use `ForgeResult<T>` as their return type.

use crate::toolchain::InvokeError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for forge operations
pub type ForgeResult<T> = Result<T, ForgeError>;

/// All errors that can occur while orchestrating a build
#[derive(Error, Debug)]
pub enum ForgeError {
    // Environment errors
    #[error("Toolchain unavailable for {toolchain}: {reason}")]
    ToolchainUnavailable { toolchain: String, reason: String },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    // Template errors
    #[error("Workspace template at {path} is incomplete, missing: {}", .missing.join(", "))]
    TemplateIncomplete { path: PathBuf, missing: Vec<String> },

    #[error("Workspace template bootstrap failed: {0}")]
    TemplateBootstrap(String),

    // Build errors
    #[error("{message}")]
    CompileFailure {
        message: String,
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
        timed_out: bool,
    },

    #[error("Build reported success but no artifact was found at {0}")]
    ArtifactMissing(PathBuf),

    #[error("Invalid project id '{id}': {reason}")]
    InvalidProjectId { id: String, reason: String },

    #[error("Cache entry not found: {0}")]
    CacheEntryNotFound(String),

    // Subprocess errors
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ForgeError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a toolchain-unavailable error
    pub fn unavailable(toolchain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolchainUnavailable {
            toolchain: toolchain.into(),
            reason: reason.into(),
        }
    }

    /// Whether this failure came from the toolchain exceeding its timeout
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::CompileFailure { timed_out, .. } => *timed_out,
            Self::Invoke(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ToolchainUnavailable { toolchain, .. } if toolchain == "rust" => {
                Some("Install Rust from https://rustup.rs, then: rustup target add wasm32-unknown-unknown")
            }
            Self::ToolchainUnavailable { .. } => Some("Install Node.js 18+ from https://nodejs.org"),
            Self::TemplateIncomplete { .. } => {
                Some("Run: forge template init (the template is rebuilt from scratch)")
            }
            Self::UnsupportedPlatform(_) => Some("Write the contract in Rust, or build on Linux/macOS"),
            Self::InvalidProjectId { .. } => {
                Some("Use only letters, digits, '-' and '_' in project ids")
            }
            _ => None,
        }
    }
}
