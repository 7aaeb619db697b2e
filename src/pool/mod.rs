//! Build slot pool for managed-language builds
//!
//! A fixed set of numbered working directories, each guarded by an
//! in-memory flag and an on-disk `.lock` marker. Acquisition probes
//! round-robin and never waits: when every slot is busy a temporary
//! slot is created in the overflow directory instead.

mod materialize;

pub use materialize::{materialize, Materialized};

use crate::config::Layout;
use crate::error::{ForgeError, ForgeResult};
use crate::fsutil;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// On-disk lock marker inside a pooled slot
pub const LOCK_MARKER: &str = ".lock";

const TEMP_PREFIX: &str = "build-temp-";

/// Identity of a build slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    Pooled(usize),
    Temporary(Uuid),
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pooled(index) => write!(f, "build-{}", index),
            Self::Temporary(id) => write!(f, "{}{}", TEMP_PREFIX, id.simple()),
        }
    }
}

/// A slot held by exactly one in-flight build.
///
/// Not `Clone`: giving it back to [`SlotPool::release`] consumes it.
#[derive(Debug)]
pub struct BuildSlot {
    id: SlotId,
    path: PathBuf,
}

impl BuildSlot {
    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self.id, SlotId::Temporary(_))
    }

    pub fn src_dir(&self) -> PathBuf {
        self.path.join("src")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.path.join("build")
    }
}

/// Snapshot of one pooled slot
#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub index: usize,
    pub path: PathBuf,
    pub locked: bool,
    pub marker_present: bool,
    pub dependencies_present: bool,
}

/// Snapshot of the whole pool
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub slots: Vec<SlotStatus>,
    pub overflow: usize,
}

/// What `reset` cleaned up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub markers_removed: usize,
    pub overflow_removed: usize,
}

#[derive(Debug, Default)]
struct PoolState {
    next: usize,
    locked: HashSet<usize>,
    temporary: HashSet<Uuid>,
    initialized: bool,
}

/// Mutex-guarded pool of build slots
pub struct SlotPool {
    pool_dir: PathBuf,
    overflow_dir: PathBuf,
    size: usize,
    state: Mutex<PoolState>,
}

impl SlotPool {
    pub fn new(layout: &Layout, size: usize) -> Self {
        Self {
            pool_dir: layout.pool_dir(),
            overflow_dir: layout.overflow_dir(),
            size,
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn slot_path(&self, index: usize) -> PathBuf {
        self.pool_dir.join(SlotId::Pooled(index).to_string())
    }

    /// Take a free slot, or a fresh temporary one when none is free.
    ///
    /// Never blocks on another build and never fails because the pool
    /// is exhausted.
    pub async fn acquire(&self) -> ForgeResult<BuildSlot> {
        let mut state = self.state.lock().await;
        if !state.initialized {
            for index in 0..self.size {
                let path = self.slot_path(index);
                tokio::fs::create_dir_all(&path)
                    .await
                    .map_err(|e| ForgeError::io(format!("creating {}", path.display()), e))?;
            }
            state.initialized = true;
        }

        for _ in 0..self.size * 2 {
            let index = state.next % self.size;
            state.next = state.next.wrapping_add(1);

            if state.locked.contains(&index) {
                continue;
            }

            let path = self.slot_path(index);
            match create_marker(&path.join(LOCK_MARKER)).await {
                Ok(()) => {
                    state.locked.insert(index);
                    debug!(slot = index, "Acquired build slot");
                    return Ok(BuildSlot {
                        id: SlotId::Pooled(index),
                        path,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(slot = index, "Slot marker present, skipping");
                }
                Err(e) => {
                    warn!(slot = index, error = %e, "Could not write slot marker, skipping");
                }
            }
        }

        let id = Uuid::new_v4();
        state.temporary.insert(id);
        drop(state);

        let id_slot = SlotId::Temporary(id);
        let path = self.overflow_dir.join(id_slot.to_string());
        if let Err(e) = tokio::fs::create_dir_all(&path).await {
            self.state.lock().await.temporary.remove(&id);
            return Err(ForgeError::io(format!("creating {}", path.display()), e));
        }
        info!(slot = %id_slot, "Build pool exhausted, using temporary slot");

        Ok(BuildSlot { id: id_slot, path })
    }

    /// Return a slot to the pool.
    ///
    /// Pooled slots keep their dependency copy; temporary slots are
    /// removed entirely. Cleanup problems are logged, never returned.
    ///
    /// The slot stays marked as held until its directory is clean; the
    /// state lock is only taken for the final bookkeeping, so a large
    /// removal never stalls a concurrent `acquire`.
    pub async fn release(&self, slot: BuildSlot) {
        match slot.id {
            SlotId::Pooled(index) => {
                fsutil::remove_best_effort(&slot.build_dir()).await;
                fsutil::remove_best_effort(&slot.src_dir()).await;
                fsutil::remove_best_effort(&slot.path.join(LOCK_MARKER)).await;
                self.state.lock().await.locked.remove(&index);
            }
            SlotId::Temporary(id) => {
                fsutil::remove_best_effort(&slot.path).await;
                self.state.lock().await.temporary.remove(&id);
            }
        }
        debug!(slot = %slot.id, "Released build slot");
    }

    pub async fn status(&self) -> PoolStatus {
        let state = self.state.lock().await;
        let slots = (0..self.size)
            .map(|index| {
                let path = self.slot_path(index);
                SlotStatus {
                    index,
                    locked: state.locked.contains(&index),
                    marker_present: path.join(LOCK_MARKER).exists(),
                    dependencies_present: path.join("node_modules").exists(),
                    path,
                }
            })
            .collect();

        PoolStatus {
            slots,
            overflow: self.overflow_entries().await.len(),
        }
    }

    /// Clear stale markers and leftover temporary slots, e.g. after a crash.
    ///
    /// Slots held by this process are left alone.
    pub async fn reset(&self) -> ForgeResult<ResetReport> {
        let state = self.state.lock().await;
        let mut report = ResetReport::default();

        for index in 0..self.size {
            if state.locked.contains(&index) {
                continue;
            }
            let marker = self.slot_path(index).join(LOCK_MARKER);
            match tokio::fs::remove_file(&marker).await {
                Ok(()) => report.markers_removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(ForgeError::io(format!("removing {}", marker.display()), e)),
            }
        }

        for (path, id) in self.overflow_entries().await {
            if id.is_some_and(|id| state.temporary.contains(&id)) {
                continue;
            }
            fsutil::remove_best_effort(&path).await;
            report.overflow_removed += 1;
        }

        info!(
            markers = report.markers_removed,
            overflow = report.overflow_removed,
            "Build pool reset"
        );
        Ok(report)
    }

    async fn overflow_entries(&self) -> Vec<(PathBuf, Option<Uuid>)> {
        let mut entries = Vec::new();
        let Ok(mut dir) = tokio::fs::read_dir(&self.overflow_dir).await else {
            return entries;
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(raw) = name.strip_prefix(TEMP_PREFIX) {
                entries.push((entry.path(), Uuid::parse_str(raw).ok()));
            }
        }
        entries
    }
}

/// Create the marker only if it does not already exist
async fn create_marker(path: &Path) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(chrono::Utc::now().timestamp_millis().to_string().as_bytes())
        .await?;
    file.flush().await
}
