use crate::error::ForgeError;
use crate::toolchain::InvokeError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Contract source languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[value(alias = "rs")]
    Rust,
    #[value(name = "javascript", alias = "js")]
    JavaScript,
    #[value(name = "typescript", alias = "ts")]
    TypeScript,
}

impl Language {
    /// Infer the language from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "rs" => Some(Self::Rust),
            "js" | "mjs" => Some(Self::JavaScript),
            "ts" | "mts" => Some(Self::TypeScript),
            _ => None,
        }
    }

    /// Extension of the contract entry file inside a build slot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Rust => "rs",
            Self::JavaScript => "js",
            Self::TypeScript => "ts",
        }
    }

    /// Whether the language builds through the managed near-sdk-js toolchain
    pub fn is_managed(&self) -> bool {
        !matches!(self, Self::Rust)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rust => "Rust",
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
        };
        write!(f, "{}", name)
    }
}

/// A single compile request
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub source: String,
    pub language: Language,
    /// Explicit cache key for Rust builds, overriding the content digest
    pub project_id: Option<String>,
}

impl CompileRequest {
    pub fn new(source: impl Into<String>, language: Language) -> Self {
        Self {
            source: source.into(),
            language,
            project_id: None,
        }
    }

    pub fn with_project_id(mut self, id: impl Into<String>) -> Self {
        self.project_id = Some(id.into());
        self
    }
}

/// Outcome of a compile request
///
/// Artifact bytes are not serialized; callers write them out separately.
#[derive(Debug, Clone, Serialize)]
pub struct CompilationResult {
    pub success: bool,
    pub language: Language,
    #[serde(skip)]
    pub artifact: Option<Vec<u8>>,
    pub artifact_size: u64,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub compile_duration_secs: f64,
    pub cached: bool,
    pub optimized: bool,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CompilationResult {
    pub(crate) fn succeeded(language: Language, artifact: Vec<u8>, stdout: String, stderr: String) -> Self {
        Self {
            success: true,
            language,
            artifact_size: artifact.len() as u64,
            artifact: Some(artifact),
            stdout,
            stderr,
            exit_code: Some(0),
            compile_duration_secs: 0.0,
            cached: false,
            optimized: false,
            timed_out: false,
            cache_key: None,
            project_path: None,
            error_message: None,
        }
    }

    /// Failed result carrying whatever output the toolchain produced
    pub(crate) fn failed(language: Language, err: &ForgeError) -> Self {
        let (stdout, stderr, exit_code) = match err {
            ForgeError::CompileFailure {
                stdout,
                stderr,
                exit_code,
                ..
            } => (stdout.clone(), stderr.clone(), *exit_code),
            ForgeError::Invoke(e) => (e.stdout().to_string(), e.stderr().to_string(), e.exit_code()),
            _ => (String::new(), String::new(), None),
        };

        Self {
            success: false,
            language,
            artifact: None,
            artifact_size: 0,
            stdout,
            stderr,
            exit_code,
            compile_duration_secs: 0.0,
            cached: false,
            optimized: false,
            timed_out: err.is_timeout(),
            cache_key: None,
            project_path: None,
            error_message: Some(err.to_string()),
        }
    }
}

/// Convert a toolchain failure into a compile failure with a readable message
pub(crate) fn compile_failure(err: InvokeError) -> ForgeError {
    let diagnosis = crate::toolchain::classify_invoke(&err);
    ForgeError::CompileFailure {
        message: diagnosis.message,
        stdout: err.stdout().to_string(),
        stderr: err.stderr().to_string(),
        exit_code: err.exit_code(),
        timed_out: err.is_timeout(),
    }
}
