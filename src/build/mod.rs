//! Build engine
//!
//! Routes a compile request to the managed-language path (template,
//! slot pool, near-sdk-js) or the Rust path (migration, persistent
//! cache, cargo) and converts every failure into a failed
//! `CompilationResult` at this boundary.

mod phase;
mod result;

pub use phase::BuildPhase;
pub use result::{CompilationResult, CompileRequest, Language};

use crate::cache::BuildCache;
use crate::config::schema::ManagedConfig;
use crate::config::{Config, ConfigManager, Layout};
use crate::error::{ForgeError, ForgeResult};
use crate::journal::BuildJournal;
use crate::migrate::migrate;
use crate::pool::{materialize, BuildSlot, SlotPool};
use crate::template::{manifest, WorkspaceTemplate};
use crate::toolchain::{CommandRunner, Invocation, Optimizer, Toolchain, ToolchainKind};
use result::compile_failure;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

/// Compiles contracts; cheap to share behind an `Arc`
pub struct BuildEngine {
    layout: Layout,
    managed: ManagedConfig,
    runner: Arc<dyn CommandRunner>,
    toolchain: Toolchain,
    template: WorkspaceTemplate,
    pool: SlotPool,
    cache: BuildCache,
    journal: BuildJournal,
}

impl BuildEngine {
    pub fn new(config: &Config, runner: Arc<dyn CommandRunner>) -> Self {
        let layout = ConfigManager::layout(config);
        let optimizer = Arc::new(Optimizer::new(config.optimizer.clone(), runner.clone()));

        Self {
            managed: config.managed.clone(),
            toolchain: Toolchain::new(runner.clone()),
            template: WorkspaceTemplate::new(layout.template_dir(), config.managed.clone(), runner.clone()),
            pool: SlotPool::new(&layout, config.pool.size),
            cache: BuildCache::new(&layout, config.rust.clone(), runner.clone(), optimizer),
            journal: BuildJournal::new(config, &layout),
            runner,
            layout,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn template(&self) -> &WorkspaceTemplate {
        &self.template
    }

    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    /// Compile one contract. Never returns an error: failures are
    /// reported in the result.
    pub async fn compile(&self, request: &CompileRequest) -> CompilationResult {
        let id = Uuid::new_v4().simple().to_string();
        let span = info_span!("compile", id = %&id[..8], language = %request.language);
        self.compile_inner(request, &id).instrument(span).await
    }

    async fn compile_inner(&self, request: &CompileRequest, id: &str) -> CompilationResult {
        let start = Instant::now();
        BuildPhase::Queued.enter(id);

        let outcome = if request.language.is_managed() {
            self.compile_managed(request, id).await
        } else {
            self.compile_rust(request, id).await
        };

        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => {
                BuildPhase::Reporting.enter(id);
                info!(error = %e, "Compilation failed");
                CompilationResult::failed(request.language, &e)
            }
        };
        result.compile_duration_secs = start.elapsed().as_secs_f64();
        BuildPhase::Done.enter(id);

        self.journal.record(&result).await;
        result
    }

    async fn compile_managed(&self, request: &CompileRequest, id: &str) -> ForgeResult<CompilationResult> {
        self.toolchain.probe(ToolchainKind::Managed).await?;

        BuildPhase::AcquiringResources.enter(id);
        self.template.ensure().await?;
        let slot = self.pool.acquire().await?;
        debug!(slot = %slot.id(), "Building in slot");

        let outcome = self.build_in_slot(&slot, request, id).await;
        // release never masks the build outcome
        self.pool.release(slot).await;
        outcome
    }

    async fn build_in_slot(&self, slot: &BuildSlot, request: &CompileRequest, id: &str) -> ForgeResult<CompilationResult> {
        materialize(slot, &self.template).await?;

        let entry = format!("src/contract.{}", request.language.extension());
        let src_dir = slot.src_dir();
        let build_dir = slot.build_dir();
        for dir in [&src_dir, &build_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ForgeError::io(format!("creating {}", dir.display()), e))?;
        }

        let entry_path = slot.path().join(&entry);
        tokio::fs::write(&entry_path, &request.source)
            .await
            .map_err(|e| ForgeError::io(format!("writing {}", entry_path.display()), e))?;

        let package = serde_json::to_string_pretty(&manifest::package_json(&self.managed, &entry))?;
        let package_path = slot.path().join("package.json");
        tokio::fs::write(&package_path, package)
            .await
            .map_err(|e| ForgeError::io(format!("writing {}", package_path.display()), e))?;

        BuildPhase::Building.enter(id);
        let invocation = Invocation::new("npx", slot.path())
            .args([self.managed.sdk_package.as_str(), "build", entry.as_str(), manifest::ARTIFACT_PATH])
            .env("NODE_ENV", "production")
            .timeout(self.managed.build_timeout())
            .max_output(self.managed.max_output_bytes());
        let output = self.runner.run(&invocation).await.map_err(compile_failure)?;

        let artifact_path = slot.path().join(manifest::ARTIFACT_PATH);
        let artifact = match tokio::fs::read(&artifact_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ForgeError::ArtifactMissing(artifact_path));
            }
            Err(e) => return Err(ForgeError::io(format!("reading {}", artifact_path.display()), e)),
        };

        info!(size = artifact.len(), "{} contract built", request.language);
        Ok(CompilationResult::succeeded(
            request.language,
            artifact,
            output.stdout,
            output.stderr,
        ))
    }

    async fn compile_rust(&self, request: &CompileRequest, id: &str) -> ForgeResult<CompilationResult> {
        self.toolchain.probe(ToolchainKind::Rust).await?;

        BuildPhase::AcquiringResources.enter(id);
        let migrated = migrate(&request.source);
        if migrated != request.source {
            debug!("Source migrated to current near-sdk syntax");
        }

        let build = self
            .cache
            .build_or_reuse(&migrated, request.project_id.as_deref())
            .await
            .map_err(|e| match e {
                ForgeError::Invoke(e) => compile_failure(e),
                other => other,
            })?;

        let mut result = CompilationResult::succeeded(Language::Rust, build.artifact, build.stdout, build.stderr);
        result.cached = build.cached;
        result.optimized = build.optimized;
        result.cache_key = Some(build.key);
        result.project_path = Some(build.project_path);
        Ok(result)
    }
}
