//! Workspace template for the managed-language toolchain
//!
//! A directory holding an installed `node_modules` closure, baseline
//! manifests and a placeholder contract. Built once, verified against a
//! checklist of required sub-paths, then used read-only as the source
//! for slot materialization.

pub mod manifest;

use crate::config::schema::ManagedConfig;
use crate::error::{ForgeError, ForgeResult};
use crate::fsutil;
use crate::toolchain::{classify_invoke, CommandRunner, Invocation};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Output cap for install and repair commands
const INSTALL_OUTPUT_CAP: usize = 10 * 1024 * 1024;

/// Lazily bootstrapped, verified dependency template
pub struct WorkspaceTemplate {
    dir: PathBuf,
    settings: ManagedConfig,
    runner: Arc<dyn CommandRunner>,
    verified: Mutex<bool>,
}

impl WorkspaceTemplate {
    pub fn new(dir: PathBuf, settings: ManagedConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            dir,
            settings,
            runner,
            verified: Mutex::new(false),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings(&self) -> &ManagedConfig {
        &self.settings
    }

    /// Required sub-paths that are not present on disk
    pub fn missing_paths(&self) -> Vec<String> {
        fsutil::missing_under(&self.dir, &self.settings.required_paths)
    }

    /// Whether the template exists and passes verification
    pub fn is_ready(&self) -> bool {
        self.dir.exists() && self.missing_paths().is_empty()
    }

    /// Make sure a verified template exists, bootstrapping it if needed.
    ///
    /// Concurrent callers wait on the same bootstrap. A partial template
    /// left by a failed attempt is deleted so the next call starts clean.
    pub async fn ensure(&self) -> ForgeResult<()> {
        let mut verified = self.verified.lock().await;
        if *verified {
            return Ok(());
        }

        if self.dir.exists() {
            let missing = self.missing_paths();
            if missing.is_empty() {
                debug!(path = %self.dir.display(), "Workspace template verified");
                *verified = true;
                return Ok(());
            }
            warn!(
                path = %self.dir.display(),
                missing = %missing.join(", "),
                "Workspace template incomplete, rebuilding"
            );
            self.remove_dir().await?;
        }

        let start = Instant::now();
        info!(path = %self.dir.display(), "Bootstrapping workspace template (runs once)");
        if let Err(e) = self.bootstrap().await {
            fsutil::remove_best_effort(&self.dir).await;
            return Err(e);
        }

        info!(
            path = %self.dir.display(),
            "Workspace template ready in {:.2}s",
            start.elapsed().as_secs_f64()
        );
        *verified = true;
        Ok(())
    }

    /// Delete the template so the next `ensure` rebuilds it
    pub async fn discard(&self) -> ForgeResult<()> {
        let mut verified = self.verified.lock().await;
        *verified = false;
        self.remove_dir().await
    }

    async fn remove_dir(&self) -> ForgeResult<()> {
        if self.dir.exists() {
            tokio::fs::remove_dir_all(&self.dir)
                .await
                .map_err(|e| ForgeError::io(format!("removing {}", self.dir.display()), e))?;
        }
        Ok(())
    }

    async fn bootstrap(&self) -> ForgeResult<()> {
        self.scaffold().await?;

        let install = Invocation::new("npm", &self.dir)
            .arg("install")
            .arg(format!("{}@{}", self.settings.sdk_package, self.settings.sdk_version))
            .args(["--legacy-peer-deps", "--no-audit", "--no-fund", "--loglevel=error"])
            .timeout(self.settings.install_timeout())
            .max_output(INSTALL_OUTPUT_CAP);

        self.runner.run(&install).await.map_err(|e| {
            ForgeError::TemplateBootstrap(format!(
                "installing {} failed: {}",
                self.settings.sdk_package,
                classify_invoke(&e).message
            ))
        })?;

        let missing = self.missing_paths();
        if missing.is_empty() {
            return Ok(());
        }

        warn!(missing = %missing.join(", "), "Template incomplete after install, running repair");
        self.repair().await;

        let missing = self.missing_paths();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ForgeError::TemplateIncomplete {
                path: self.dir.clone(),
                missing,
            })
        }
    }

    async fn scaffold(&self) -> ForgeResult<()> {
        for sub in ["src", "build"] {
            let dir = self.dir.join(sub);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| ForgeError::io(format!("creating {}", dir.display()), e))?;
        }

        let package = manifest::package_json(&self.settings, "src/contract.js");
        let files = [
            ("package.json", serde_json::to_string_pretty(&package)?),
            ("tsconfig.json", serde_json::to_string_pretty(&manifest::tsconfig_json())?),
            ("src/contract.js", manifest::PLACEHOLDER_CONTRACT.to_string()),
        ];
        for (rel, contents) in files {
            let path = fsutil::join_rel(&self.dir, rel);
            tokio::fs::write(&path, contents)
                .await
                .map_err(|e| ForgeError::io(format!("writing {}", path.display()), e))?;
        }
        Ok(())
    }

    /// Run the SDK's post-install step once; failures only surface through re-verification
    async fn repair(&self) {
        let Some((program, args)) = self.settings.repair_command.split_first() else {
            return;
        };
        let invocation = Invocation::new(program, &self.dir)
            .args(args.iter().cloned())
            .timeout(self.settings.install_timeout())
            .max_output(INSTALL_OUTPUT_CAP);

        if let Err(e) = self.runner.run(&invocation).await {
            warn!("Template repair failed: {}", classify_invoke(&e).message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::testing::ScriptedRunner;
    use crate::toolchain::{CommandOutput, InvokeError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn create_paths(root: &Path, paths: &[String]) {
        for rel in paths {
            std::fs::create_dir_all(root.join(rel)).unwrap();
        }
    }

    fn template(dir: &TempDir, runner: Arc<ScriptedRunner>) -> WorkspaceTemplate {
        WorkspaceTemplate::new(dir.path().join("contract-template"), ManagedConfig::default(), runner)
    }

    fn installing_runner() -> Arc<ScriptedRunner> {
        let required = ManagedConfig::default().required_paths;
        ScriptedRunner::new(move |inv| {
            if inv.args.first().is_some_and(|a| a == "install") {
                create_paths(&inv.cwd, &required);
            }
            Ok(CommandOutput::default())
        })
    }

    #[tokio::test]
    async fn bootstrap_writes_scaffold_and_installs() {
        let dir = TempDir::new().unwrap();
        let runner = installing_runner();
        let template = template(&dir, runner.clone());

        template.ensure().await.unwrap();

        assert!(template.is_ready());
        assert!(template.dir().join("package.json").exists());
        assert!(template.dir().join("tsconfig.json").exists());
        assert!(template.dir().join("src/contract.js").exists());
        assert!(template.dir().join("build").is_dir());

        let install = &runner.calls()[0];
        assert_eq!(install.program, "npm");
        assert_eq!(install.args[1], "near-sdk-js@2.0.0");
        assert!(install.args.contains(&"--legacy-peer-deps".to_string()));
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let runner = installing_runner();
        let template = template(&dir, runner.clone());

        template.ensure().await.unwrap();
        template.ensure().await.unwrap();

        assert_eq!(runner.count("install"), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_bootstrap() {
        let dir = TempDir::new().unwrap();
        let runner = installing_runner();
        let template = Arc::new(template(&dir, runner.clone()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let template = template.clone();
                tokio::spawn(async move { template.ensure().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(runner.count("install"), 1);
    }

    #[tokio::test]
    async fn existing_complete_template_is_trusted() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(|_| panic!("no commands expected"));
        let template = template(&dir, runner.clone());
        create_paths(template.dir(), &ManagedConfig::default().required_paths);

        template.ensure().await.unwrap();
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn incomplete_install_is_repaired_once() {
        let dir = TempDir::new().unwrap();
        let required = ManagedConfig::default().required_paths;
        let runner = ScriptedRunner::new(move |inv| {
            match inv.args.first().map(String::as_str) {
                // the post-install download is what fails
                Some("install") => create_paths(&inv.cwd, &required[..2]),
                Some("rebuild") => create_paths(&inv.cwd, &required[2..]),
                _ => {}
            }
            Ok(CommandOutput::default())
        });
        let template = template(&dir, runner.clone());

        template.ensure().await.unwrap();
        assert_eq!(runner.count("rebuild"), 1);
        assert!(template.missing_paths().is_empty());
    }

    #[tokio::test]
    async fn still_incomplete_reports_missing_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let required = ManagedConfig::default().required_paths;
        let runner = ScriptedRunner::new(move |inv| {
            if inv.args.first().is_some_and(|a| a == "install") {
                create_paths(&inv.cwd, &required[..1]);
            }
            Ok(CommandOutput::default())
        });
        let template = template(&dir, runner.clone());

        let err = template.ensure().await.unwrap_err();
        match err {
            ForgeError::TemplateIncomplete { missing, .. } => {
                assert_eq!(missing.len(), 3);
                assert!(missing.contains(&"node_modules/.bin/near-sdk-js".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!template.dir().exists());
        assert_eq!(runner.count("rebuild"), 1);
    }

    #[tokio::test]
    async fn install_failure_removes_partial_template() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(|inv| {
            Err(InvokeError::NonZeroExit {
                command: inv.command_line(),
                code: Some(1),
                stdout: String::new(),
                stderr: "npm ERR! network request failed\n".to_string(),
            })
        });
        let template = template(&dir, runner);

        let err = template.ensure().await.unwrap_err();
        assert!(matches!(err, ForgeError::TemplateBootstrap(_)));
        assert!(err.to_string().contains("network request failed"));
        assert!(!template.dir().exists());
    }

    #[tokio::test]
    async fn partial_template_on_disk_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        let installs = Arc::new(AtomicUsize::new(0));
        let counter = installs.clone();
        let required = ManagedConfig::default().required_paths;
        let runner = ScriptedRunner::new(move |inv| {
            counter.fetch_add(1, Ordering::SeqCst);
            create_paths(&inv.cwd, &required);
            Ok(CommandOutput::default())
        });
        let template = template(&dir, runner);
        std::fs::create_dir_all(template.dir().join("node_modules/near-sdk-js")).unwrap();
        std::fs::write(template.dir().join("stale.txt"), "left over").unwrap();

        template.ensure().await.unwrap();

        assert_eq!(installs.load(Ordering::SeqCst), 1);
        assert!(!template.dir().join("stale.txt").exists());
    }
}
