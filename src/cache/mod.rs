//! Persistent build cache for Rust contracts
//!
//! One project directory per key under `persistent-builds/`, all built
//! against a single shared `CARGO_TARGET_DIR` so dependencies compile
//! once.
//!
//! # Entry validity
//!
//! | Stored `src/lib.rs` | Persisted artifact | Result |
//! |---------------------|--------------------|--------|
//! | equals request | present | Hit |
//! | equals request | missing | Rebuild |
//! | differs | any | Rebuild in place |
//!
//! The persisted artifact and `entry.json` are deleted before every
//! rebuild, so a failed build can never pair new source with an old
//! artifact. Entries are never evicted automatically.

pub mod digest;
pub mod project;

pub use digest::{cache_key, source_digest, validate_project_id};

use crate::build::BuildPhase;
use crate::config::schema::RustConfig;
use crate::config::Layout;
use crate::error::{ForgeError, ForgeResult};
use crate::fsutil;
use crate::toolchain::{CommandRunner, Optimizer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const METADATA_FILE: &str = "entry.json";

/// Outcome of `build_or_reuse`
#[derive(Debug, Clone)]
pub struct RustBuild {
    pub key: String,
    pub digest: String,
    pub artifact: Vec<u8>,
    pub optimized: bool,
    pub cached: bool,
    pub stdout: String,
    pub stderr: String,
    pub project_path: PathBuf,
}

/// Metadata persisted next to a verified artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub key: String,
    pub digest: String,
    pub artifact_size: u64,
    pub optimized: bool,
    pub built_at: DateTime<Utc>,
}

/// A cache entry as found on disk
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub key: String,
    pub path: PathBuf,
    pub metadata: Option<EntryMetadata>,
    pub size_bytes: u64,
}

/// Digest-keyed store of built Rust projects
pub struct BuildCache {
    projects_dir: PathBuf,
    base_dir: PathBuf,
    target_dir: PathBuf,
    settings: RustConfig,
    runner: Arc<dyn CommandRunner>,
    optimizer: Arc<Optimizer>,
    key_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    target_lock: Mutex<()>,
    base_ready: Mutex<bool>,
}

impl BuildCache {
    pub fn new(
        layout: &Layout,
        settings: RustConfig,
        runner: Arc<dyn CommandRunner>,
        optimizer: Arc<Optimizer>,
    ) -> Self {
        Self {
            projects_dir: layout.projects_dir(),
            base_dir: layout.base_project_dir(),
            target_dir: layout.shared_target_dir(),
            settings,
            runner,
            optimizer,
            key_locks: StdMutex::new(HashMap::new()),
            target_lock: Mutex::new(()),
            base_ready: Mutex::new(false),
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.projects_dir.join(key)
    }

    /// Project-local copy of the artifact that belongs to the stored source
    fn persisted_artifact(&self, project: &Path) -> PathBuf {
        project::release_dir(&project.join("target"), &self.settings).join(project::ARTIFACT_NAME)
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Return the cached artifact for `source`, building it if needed.
    ///
    /// `source` must already be migrated. Builds of the same key are
    /// serialized; only verified successes are persisted.
    pub async fn build_or_reuse(&self, source: &str, project_id: Option<&str>) -> ForgeResult<RustBuild> {
        let digest = source_digest(source);
        let key = cache_key(&digest, project_id)?;
        let lock = self.key_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            self.build_locked(source, key.clone(), digest).await
        };
        self.forget_key_lock(&key, lock);
        result
    }

    /// Drop the map entry once no other task holds or waits on the lock
    fn forget_key_lock(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        // one reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    async fn build_locked(&self, source: &str, key: String, digest: String) -> ForgeResult<RustBuild> {
        let project = self.entry_dir(&key);
        BuildPhase::CacheCheck.enter(&key);
        if let Some(artifact) = self.lookup(&project, source).await? {
            BuildPhase::Hit.enter(&key);
            return self.serve_hit(key, digest, project, artifact).await;
        }

        BuildPhase::Building.enter(&key);
        self.ensure_base_project().await?;
        self.prepare_project(&project, source).await?;

        let (output, artifact) = {
            let _target = self.target_lock.lock().await;
            // a stale artifact from the previous build must not be picked up
            let shared = project::release_dir(&self.target_dir, &self.settings).join(project::ARTIFACT_NAME);
            fsutil::remove_best_effort(&shared).await;

            let invocation = project::cargo_build(&project, &self.target_dir, &self.settings);
            let output = self.runner.run(&invocation).await?;
            let artifact = self.locate_artifact(&project).await?;
            (output, artifact)
        };

        BuildPhase::Optimizing.enter(&key);
        let persisted = self.persisted_artifact(&project);
        fsutil::write_atomic(&persisted, &artifact).await?;
        let result = self.optimizer.optimize(&persisted, artifact, &project).await;
        if result.optimized {
            fsutil::write_atomic(&persisted, &result.bytes).await?;
        }
        self.write_metadata(&project, &key, &digest, result.size(), result.optimized)
            .await?;

        info!(
            key = %key,
            size = result.size(),
            optimized = result.optimized,
            "Rust contract built"
        );
        Ok(RustBuild {
            key,
            digest,
            artifact: result.bytes,
            optimized: result.optimized,
            cached: false,
            stdout: output.stdout,
            stderr: output.stderr,
            project_path: project,
        })
    }

    /// The persisted artifact, if the entry is valid for `source`
    async fn lookup(&self, project: &Path, source: &str) -> ForgeResult<Option<Vec<u8>>> {
        let stored = match tokio::fs::read(project::lib_rs(project)).await {
            Ok(stored) => stored,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ForgeError::io(format!("reading {}", project.display()), e)),
        };
        if stored != source.as_bytes() {
            debug!(project = %project.display(), "Stored source differs, rebuilding");
            return Ok(None);
        }

        match tokio::fs::read(self.persisted_artifact(project)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(project = %project.display(), "Persisted artifact missing, rebuilding");
                Ok(None)
            }
            Err(e) => Err(ForgeError::io(format!("reading artifact in {}", project.display()), e)),
        }
    }

    /// Re-run the optimizer on a hit; older artifacts may predate it
    async fn serve_hit(&self, key: String, digest: String, project: PathBuf, artifact: Vec<u8>) -> ForgeResult<RustBuild> {
        let persisted = self.persisted_artifact(&project);
        let result = self.optimizer.optimize(&persisted, artifact, &project).await;

        if result.optimized {
            fsutil::write_atomic(&persisted, &result.bytes).await?;
            self.write_metadata(&project, &key, &digest, result.size(), true)
                .await?;
        }

        info!(key = %key, size = result.size(), "Reusing cached build");
        let optimized = result.optimized || self.read_metadata(&project).await.is_some_and(|m| m.optimized);
        Ok(RustBuild {
            key,
            digest,
            artifact: result.bytes,
            optimized,
            cached: true,
            stdout: "Build reused from cache".to_string(),
            stderr: String::new(),
            project_path: project,
        })
    }

    async fn ensure_base_project(&self) -> ForgeResult<()> {
        let mut ready = self.base_ready.lock().await;
        if *ready {
            return Ok(());
        }

        if !project::is_scaffolded(&self.base_dir) {
            info!(path = %self.base_dir.display(), "Creating Rust base project");
            project::scaffold(&self.base_dir, &self.settings).await?;

            if self.settings.warm_base_project {
                info!("Building base project to cache dependencies");
                let _target = self.target_lock.lock().await;
                let invocation = project::cargo_build(&self.base_dir, &self.target_dir, &self.settings);
                if let Err(e) = self.runner.run(&invocation).await {
                    warn!("Base project build failed, dependencies will build on first compile: {}", e);
                }
            }
        }

        *ready = true;
        Ok(())
    }

    /// Create or reuse the entry directory and write the new source into it
    async fn prepare_project(&self, project: &Path, source: &str) -> ForgeResult<()> {
        if !project::is_scaffolded(project) {
            fsutil::copy_tree(&self.base_dir, project, &project::COPY_SKIP).await?;
        }

        fsutil::remove_best_effort(&self.persisted_artifact(project)).await;
        fsutil::remove_best_effort(&project.join(METADATA_FILE)).await;
        if self.persisted_artifact(project).exists() {
            return Err(ForgeError::Internal(format!(
                "could not invalidate previous artifact in {}",
                project.display()
            )));
        }

        fsutil::write_atomic(&project::lib_rs(project), source.as_bytes()).await
    }

    /// Find the artifact cargo just produced
    async fn locate_artifact(&self, project: &Path) -> ForgeResult<Vec<u8>> {
        let shared_release = project::release_dir(&self.target_dir, &self.settings);
        let candidates = [
            shared_release.join(project::ARTIFACT_NAME),
            project::release_dir(&project.join("target"), &self.settings).join(project::ARTIFACT_NAME),
        ];
        for candidate in &candidates {
            if let Ok(bytes) = tokio::fs::read(candidate).await {
                return Ok(bytes);
            }
        }

        // other .wasm files in the shared target belong to other projects
        Err(ForgeError::ArtifactMissing(candidates[0].clone()))
    }

    async fn write_metadata(&self, project: &Path, key: &str, digest: &str, size: u64, optimized: bool) -> ForgeResult<()> {
        let metadata = EntryMetadata {
            key: key.to_string(),
            digest: digest.to_string(),
            artifact_size: size,
            optimized,
            built_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&metadata)?;
        fsutil::write_atomic(&project.join(METADATA_FILE), &json).await
    }

    async fn read_metadata(&self, project: &Path) -> Option<EntryMetadata> {
        let bytes = tokio::fs::read(project.join(METADATA_FILE)).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Every entry on disk, sorted by key
    pub async fn entries(&self) -> ForgeResult<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.projects_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(ForgeError::io(format!("reading {}", self.projects_dir.display()), e)),
        };

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| ForgeError::io(format!("reading {}", self.projects_dir.display()), e))?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let key = entry.file_name().to_string_lossy().into_owned();
            let metadata = self.read_metadata(&path).await;
            let size_path = path.clone();
            let size_bytes = tokio::task::spawn_blocking(move || fsutil::dir_size(&size_path))
                .await
                .unwrap_or(0);
            entries.push(CacheEntry {
                key,
                path,
                metadata,
                size_bytes,
            });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    /// Remove one entry, or every entry when `key` is `None`
    pub async fn clear(&self, key: Option<&str>) -> ForgeResult<usize> {
        let keys = match key {
            Some(key) => {
                validate_project_id(key)?;
                if !self.entry_dir(key).is_dir() {
                    return Err(ForgeError::CacheEntryNotFound(key.to_string()));
                }
                vec![key.to_string()]
            }
            None => self.entries().await?.into_iter().map(|e| e.key).collect(),
        };

        for key in &keys {
            let lock = self.key_lock(key);
            let dir = self.entry_dir(key);
            let removed = {
                let _guard = lock.lock().await;
                tokio::fs::remove_dir_all(&dir).await
            };
            self.forget_key_lock(key, lock);
            removed.map_err(|e| ForgeError::io(format!("removing {}", dir.display()), e))?;
            debug!(key = %key, "Removed cache entry");
        }

        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::OptimizerConfig;
    use crate::toolchain::testing::{not_found, ScriptedRunner};
    use crate::toolchain::{CommandOutput, Invocation, InvokeError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    const SOURCE_A: &str = "#[near(contract_state)]\npub struct A {}\n";
    const SOURCE_B: &str = "#[near(contract_state)]\npub struct B {}\n";

    /// Fake cargo: the artifact is the wasm magic followed by the source
    fn fake_cargo(inv: &Invocation) -> Result<CommandOutput, InvokeError> {
        let source = std::fs::read_to_string(inv.cwd.join("src/lib.rs")).unwrap();
        if source.contains("broken") {
            return Err(InvokeError::NonZeroExit {
                command: inv.command_line(),
                code: Some(101),
                stdout: String::new(),
                stderr: "error[E0425]: cannot find value `x` in this scope\n".to_string(),
            });
        }
        if source.contains("no_artifact") {
            return Ok(CommandOutput::default());
        }
        let release = PathBuf::from(inv.env_value("CARGO_TARGET_DIR").unwrap()).join("wasm32-unknown-unknown/release");
        std::fs::create_dir_all(&release).unwrap();
        if source.contains("renamed_crate") {
            std::fs::write(release.join("other_project.wasm"), b"\0asm-other").unwrap();
            return Ok(CommandOutput::default());
        }
        let mut artifact = b"\0asm".to_vec();
        artifact.extend_from_slice(source.as_bytes());
        std::fs::write(release.join("contract.wasm"), artifact).unwrap();
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: "   Compiling contract v0.1.0\n    Finished release\n".to_string(),
            exit_code: 0,
        })
    }

    fn settings() -> RustConfig {
        RustConfig {
            warm_base_project: false,
            ..RustConfig::default()
        }
    }

    fn cache_with(dir: &TempDir, runner: Arc<ScriptedRunner>, settings: RustConfig) -> BuildCache {
        let optimizer = Arc::new(Optimizer::new(OptimizerConfig::default(), runner.clone()));
        BuildCache::new(&Layout::new(dir.path()), settings, runner, optimizer)
    }

    fn cache(dir: &TempDir) -> (BuildCache, Arc<ScriptedRunner>) {
        let runner = ScriptedRunner::new(|inv| match inv.program.as_str() {
            "cargo" => fake_cargo(inv),
            _ => Err(not_found(inv)),
        });
        (cache_with(dir, runner.clone(), settings()), runner)
    }

    #[tokio::test]
    async fn second_identical_build_is_a_byte_identical_hit() {
        let dir = TempDir::new().unwrap();
        let (cache, runner) = cache(&dir);

        let first = cache.build_or_reuse(SOURCE_A, None).await.unwrap();
        let second = cache.build_or_reuse(SOURCE_A, None).await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.artifact, second.artifact);
        assert_eq!(first.key, source_digest(SOURCE_A));
        assert_eq!(runner.count("cargo"), 1);
        assert!(first.project_path.join("entry.json").exists());
    }

    #[tokio::test]
    async fn changed_source_under_project_id_rebuilds() {
        let dir = TempDir::new().unwrap();
        let (cache, runner) = cache(&dir);

        let a = cache.build_or_reuse(SOURCE_A, Some("counter")).await.unwrap();
        let b = cache.build_or_reuse(SOURCE_B, Some("counter")).await.unwrap();
        let a_again = cache.build_or_reuse(SOURCE_A, Some("counter")).await.unwrap();

        assert!(!b.cached);
        assert!(!a_again.cached, "original source must not be a stale hit");
        assert_ne!(a.artifact, b.artifact);
        assert_eq!(a.artifact, a_again.artifact);
        assert_eq!(runner.count("cargo"), 3);
        assert_eq!(cache.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_rebuild_leaves_no_stale_artifact() {
        let dir = TempDir::new().unwrap();
        let (cache, _runner) = cache(&dir);

        let good = cache.build_or_reuse(SOURCE_A, Some("p")).await.unwrap();
        let err = cache
            .build_or_reuse("// broken\npub struct A {}\n", Some("p"))
            .await
            .unwrap_err();

        assert!(matches!(err, ForgeError::Invoke(InvokeError::NonZeroExit { .. })));
        assert!(!cache.persisted_artifact(&good.project_path).exists());
        assert!(!good.project_path.join("entry.json").exists());
        let stored = std::fs::read_to_string(project::lib_rs(&good.project_path)).unwrap();
        assert!(stored.contains("broken"));
    }

    #[tokio::test]
    async fn failures_are_never_cached() {
        let dir = TempDir::new().unwrap();
        let (cache, runner) = cache(&dir);
        let broken = "// broken\n";

        assert!(cache.build_or_reuse(broken, None).await.is_err());
        assert!(cache.build_or_reuse(broken, None).await.is_err());
        assert_eq!(runner.count("cargo"), 2);
    }

    #[tokio::test]
    async fn missing_artifact_is_reported() {
        let dir = TempDir::new().unwrap();
        let (cache, _runner) = cache(&dir);

        let err = cache.build_or_reuse("// no_artifact\n", None).await.unwrap_err();
        assert!(matches!(err, ForgeError::ArtifactMissing(_)));

        let entries = cache.entries().await.unwrap();
        assert!(entries[0].metadata.is_none());
    }

    #[tokio::test]
    async fn foreign_wasm_in_shared_target_is_not_served() {
        let dir = TempDir::new().unwrap();
        let (cache, _runner) = cache(&dir);

        let err = cache.build_or_reuse("// renamed_crate\n", None).await.unwrap_err();
        match err {
            ForgeError::ArtifactMissing(path) => assert!(path.ends_with("contract.wasm")),
            other => panic!("expected ArtifactMissing, got {other:?}"),
        }
        assert!(dir
            .path()
            .join("shared-target/wasm32-unknown-unknown/release/other_project.wasm")
            .exists());
    }

    #[tokio::test]
    async fn key_locks_are_dropped_after_use() {
        let dir = TempDir::new().unwrap();
        let (cache, _runner) = cache(&dir);
        let cache = Arc::new(cache);

        let handles: Vec<_> = [SOURCE_A, SOURCE_A, SOURCE_B]
            .into_iter()
            .map(|source| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.build_or_reuse(source, None).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(cache.build_or_reuse("// broken\n", Some("p")).await.is_err());
        assert!(cache.key_locks.lock().unwrap().is_empty());

        cache.clear(None).await.unwrap();
        assert!(cache.key_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_project_id_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let (cache, runner) = cache(&dir);

        let err = cache.build_or_reuse(SOURCE_A, Some("../escape")).await.unwrap_err();
        assert!(matches!(err, ForgeError::InvalidProjectId { .. }));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn project_copies_base_without_target() {
        let dir = TempDir::new().unwrap();
        let (cache, _runner) = cache(&dir);
        std::fs::create_dir_all(dir.path().join("base-project/target/release")).unwrap();
        project::scaffold(&dir.path().join("base-project"), &settings()).await.unwrap();

        let build = cache.build_or_reuse(SOURCE_A, None).await.unwrap();

        assert!(build.project_path.join("Cargo.toml").exists());
        assert_eq!(
            std::fs::read_to_string(project::lib_rs(&build.project_path)).unwrap(),
            SOURCE_A
        );
        assert!(!build.project_path.join("target/release").exists());
    }

    #[tokio::test]
    async fn warm_build_runs_once_for_new_base_project() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(|inv| match inv.program.as_str() {
            "cargo" => fake_cargo(inv),
            _ => Err(not_found(inv)),
        });
        let settings = RustConfig {
            warm_base_project: true,
            ..RustConfig::default()
        };
        let cache = cache_with(&dir, runner.clone(), settings);

        cache.build_or_reuse(SOURCE_A, None).await.unwrap();
        cache.build_or_reuse(SOURCE_B, None).await.unwrap();

        let base_builds = runner
            .calls()
            .iter()
            .filter(|c| c.program == "cargo" && c.cwd.ends_with("base-project"))
            .count();
        assert_eq!(base_builds, 1);
        assert_eq!(runner.count("cargo"), 3);
    }

    #[tokio::test]
    async fn hit_is_reoptimized_when_optimizer_becomes_available() {
        let dir = TempDir::new().unwrap();
        let available = Arc::new(AtomicBool::new(false));
        let flag = available.clone();
        let runner = ScriptedRunner::new(move |inv| match inv.program.as_str() {
            "cargo" => fake_cargo(inv),
            "wasm-opt" if flag.load(Ordering::SeqCst) => {
                let out = inv.args.iter().position(|a| a == "-o").unwrap();
                std::fs::write(&inv.args[out + 1], b"\0asm").unwrap();
                Ok(CommandOutput::default())
            }
            _ => Err(not_found(inv)),
        });
        let cache = cache_with(&dir, runner, settings());

        let first = cache.build_or_reuse(SOURCE_A, None).await.unwrap();
        assert!(!first.optimized);

        available.store(true, Ordering::SeqCst);
        let hit = cache.build_or_reuse(SOURCE_A, None).await.unwrap();
        assert!(hit.cached);
        assert!(hit.optimized);
        assert_eq!(hit.artifact, b"\0asm".to_vec());

        let entries = cache.entries().await.unwrap();
        let metadata = entries[0].metadata.as_ref().unwrap();
        assert!(metadata.optimized);
        assert_eq!(metadata.artifact_size, 4);
    }

    #[tokio::test]
    async fn concurrent_identical_builds_compile_once() {
        let dir = TempDir::new().unwrap();
        let (cache, runner) = cache(&dir);
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.build_or_reuse(SOURCE_A, None).await.unwrap() })
            })
            .collect();
        let mut cached = 0;
        for handle in handles {
            if handle.await.unwrap().cached {
                cached += 1;
            }
        }

        assert_eq!(cached, 2);
        assert_eq!(runner.count("cargo"), 1);
    }

    #[tokio::test]
    async fn clear_removes_entries() {
        let dir = TempDir::new().unwrap();
        let (cache, _runner) = cache(&dir);
        cache.build_or_reuse(SOURCE_A, Some("one")).await.unwrap();
        cache.build_or_reuse(SOURCE_B, Some("two")).await.unwrap();

        let entries = cache.entries().await.unwrap();
        assert_eq!(entries.iter().map(|e| e.key.as_str()).collect::<Vec<_>>(), vec!["one", "two"]);
        assert!(entries.iter().all(|e| e.size_bytes > 0));

        assert_eq!(cache.clear(Some("one")).await.unwrap(), 1);
        assert!(matches!(
            cache.clear(Some("one")).await,
            Err(ForgeError::CacheEntryNotFound(_))
        ));
        assert_eq!(cache.clear(None).await.unwrap(), 1);
        assert!(cache.entries().await.unwrap().is_empty());
    }
}
