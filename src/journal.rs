//! Build journal
//!
//! Every finished compile, hit or miss, success or failure, becomes one
//! [`JournalEntry`] line in `<root>/journal.log`. Artifact bytes and
//! toolchain output stay out of the journal.

use crate::build::{CompilationResult, Language};
use crate::config::{Config, Layout};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Outcome recorded for a compile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompileEvent {
    #[serde(rename = "compile.succeeded")]
    Succeeded,
    #[serde(rename = "compile.failed")]
    Failed,
}

/// One line of the journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub event: CompileEvent,
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    pub cached: bool,
    pub optimized: bool,
    pub timed_out: bool,
    pub artifact_size: u64,
    pub duration_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&CompilationResult> for JournalEntry {
    fn from(result: &CompilationResult) -> Self {
        Self {
            timestamp: Utc::now(),
            event: if result.success {
                CompileEvent::Succeeded
            } else {
                CompileEvent::Failed
            },
            language: result.language,
            cache_key: result.cache_key.clone(),
            cached: result.cached,
            optimized: result.optimized,
            timed_out: result.timed_out,
            artifact_size: result.artifact_size,
            duration_secs: result.compile_duration_secs,
            error: result.error_message.clone(),
        }
    }
}

/// Append-only JSON-lines record of compiles
pub struct BuildJournal {
    enabled: bool,
    path: PathBuf,
}

impl BuildJournal {
    pub fn new(config: &Config, layout: &Layout) -> Self {
        Self {
            enabled: config.general.journal,
            path: layout.journal_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the outcome of one compile.
    ///
    /// A journal that cannot be written is logged and skipped; it never
    /// changes the result of the build it describes.
    pub async fn record(&self, result: &CompilationResult) {
        if !self.enabled {
            return;
        }

        let entry = JournalEntry::from(result);
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                warn!(language = %entry.language, "Journal entry not serializable: {}", e);
                return;
            }
        };

        if let Err(e) = self.append_line(&line).await {
            warn!(path = %self.path.display(), "Journal write failed: {}", e);
        }
    }

    /// Entries in file order; lines that do not parse are skipped
    pub async fn entries(&self) -> std::io::Result<Vec<JournalEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    async fn append_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // one write per line so concurrent compiles never interleave
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await
    }
}
