//! On-disk layout of the forge root directory

use std::path::{Path, PathBuf};

/// Paths of every persisted component, derived from a single root
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Workspace template for the managed-language toolchain
    pub fn template_dir(&self) -> PathBuf {
        self.root.join("contract-template")
    }

    /// Numbered build slots
    pub fn pool_dir(&self) -> PathBuf {
        self.root.join("build-pool")
    }

    /// Temporary slots created when the pool is exhausted
    pub fn overflow_dir(&self) -> PathBuf {
        self.pool_dir().join("overflow")
    }

    /// Rust project template copied into new cache entries
    pub fn base_project_dir(&self) -> PathBuf {
        self.root.join("base-project")
    }

    /// Rust cache entries keyed by digest or project id
    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("persistent-builds")
    }

    /// CARGO_TARGET_DIR shared by every Rust build
    pub fn shared_target_dir(&self) -> PathBuf {
        self.root.join("shared-target")
    }

    /// Append-only build journal
    pub fn journal_path(&self) -> PathBuf {
        self.root.join("journal.log")
    }
}
