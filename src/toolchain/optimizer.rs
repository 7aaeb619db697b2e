//! Optional wasm-opt size pass
//!
//! The optimizer never fails a build: any error falls back to the
//! unoptimized artifact.

use crate::config::schema::OptimizerConfig;
use crate::toolchain::runner::{CommandRunner, Invocation};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of an optimization attempt
#[derive(Debug, Clone)]
pub struct OptimizedArtifact {
    pub bytes: Vec<u8>,
    pub original_size: u64,
    pub optimized: bool,
}

impl OptimizedArtifact {
    fn unchanged(bytes: Vec<u8>) -> Self {
        Self {
            original_size: bytes.len() as u64,
            bytes,
            optimized: false,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Binary-size optimizer driven through a `CommandRunner`
pub struct Optimizer {
    settings: OptimizerConfig,
    runner: Arc<dyn CommandRunner>,
}

impl Optimizer {
    pub fn new(settings: OptimizerConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { settings, runner }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Optimize the artifact at `input` whose contents are `bytes`.
    ///
    /// The optimized output is written to a unique file in `scratch_dir` and
    /// adopted only when it is non-empty and smaller than the input.
    pub async fn optimize(&self, input: &Path, bytes: Vec<u8>, scratch_dir: &Path) -> OptimizedArtifact {
        if !self.settings.enabled {
            return OptimizedArtifact::unchanged(bytes);
        }

        let output = scratch_dir.join(format!("contract_optimized-{}.wasm", Uuid::new_v4().simple()));
        let invocation = Invocation::new(&self.settings.program, scratch_dir)
            .args(self.settings.args.iter().cloned())
            .arg("-o")
            .arg(output.display().to_string())
            .arg(input.display().to_string())
            .timeout(self.settings.timeout());

        let result = match self.runner.run(&invocation).await {
            Ok(_) => match tokio::fs::read(&output).await {
                Ok(optimized) if !optimized.is_empty() && optimized.len() < bytes.len() => {
                    let original = bytes.len() as u64;
                    let reduction = (original - optimized.len() as u64) as f64 / original as f64 * 100.0;
                    info!(
                        original,
                        optimized = optimized.len(),
                        "Artifact optimized ({:.1}% reduction)",
                        reduction
                    );
                    OptimizedArtifact {
                        bytes: optimized,
                        original_size: original,
                        optimized: true,
                    }
                }
                Ok(_) => {
                    debug!("Optimizer produced no size gain, keeping original artifact");
                    OptimizedArtifact::unchanged(bytes)
                }
                Err(e) => {
                    warn!("Optimizer output unreadable, continuing unoptimized: {}", e);
                    OptimizedArtifact::unchanged(bytes)
                }
            },
            Err(e) if e.is_not_found() => {
                warn!(
                    "{} not installed, continuing with unoptimized artifact (install binaryen to enable)",
                    self.settings.program
                );
                OptimizedArtifact::unchanged(bytes)
            }
            Err(e) => {
                warn!("Optimizer failed, continuing with unoptimized artifact: {}", e);
                OptimizedArtifact::unchanged(bytes)
            }
        };

        let _ = tokio::fs::remove_file(&output).await;
        result
    }
}
