use crate::error::{ForgeError, ForgeResult};
use crate::fsutil;
use crate::pool::BuildSlot;
use crate::template::{manifest::MANIFEST_FILES, WorkspaceTemplate};
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// How a slot obtained its dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    /// The slot already held a dependency copy from an earlier build
    Reused,
    /// The template's `node_modules` was copied in
    Copied,
}

/// Populate a slot with the template's dependency set and manifests.
///
/// The copy lands in a scratch directory and is renamed into place, so an
/// interrupted copy is never mistaken for a reusable one.
pub async fn materialize(slot: &BuildSlot, template: &WorkspaceTemplate) -> ForgeResult<Materialized> {
    let node_modules = slot.path().join("node_modules");

    let outcome = if node_modules.exists() {
        debug!(slot = %slot.id(), "Reusing slot dependencies");
        Materialized::Reused
    } else {
        let start = Instant::now();
        let scratch = slot
            .path()
            .join(format!(".node_modules-{}", Uuid::new_v4().simple()));
        let copied = fsutil::copy_tree(&template.dir().join("node_modules"), &scratch, &[]).await;
        if let Err(e) = copied {
            fsutil::remove_best_effort(&scratch).await;
            return Err(e);
        }
        tokio::fs::rename(&scratch, &node_modules)
            .await
            .map_err(|e| ForgeError::io(format!("moving dependencies into {}", node_modules.display()), e))?;

        let roots: Vec<_> = template
            .settings()
            .executable_paths
            .iter()
            .map(|rel| fsutil::join_rel(slot.path(), rel))
            .collect();
        let touched = tokio::task::spawn_blocking(move || {
            roots
                .iter()
                .map(|root| fsutil::make_executable(root))
                .sum::<ForgeResult<usize>>()
        })
        .await
        .map_err(|e| ForgeError::Internal(format!("permission task failed: {}", e)))??;

        info!(
            slot = %slot.id(),
            executables = touched,
            "Dependencies copied in {:.2}s",
            start.elapsed().as_secs_f64()
        );
        Materialized::Copied
    };

    for name in MANIFEST_FILES {
        let from = template.dir().join(name);
        let to = slot.path().join(name);
        tokio::fs::copy(&from, &to)
            .await
            .map_err(|e| ForgeError::io(format!("copying {} into slot", name), e))?;
    }

    Ok(outcome)
}
