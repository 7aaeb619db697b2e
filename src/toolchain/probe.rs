//! Toolchain availability checks
//!
//! Fails fast before any workspace is touched. Successful probes are
//! remembered for the lifetime of the `Toolchain`.

use crate::error::{ForgeError, ForgeResult};
use crate::toolchain::runner::{CommandRunner, Invocation};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// External toolchain families driven by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainKind {
    /// near-sdk-js on Node.js (JavaScript and TypeScript)
    Managed,
    /// cargo + near-sdk
    Rust,
}

impl ToolchainKind {
    fn probe_command(&self) -> (&'static str, &'static str) {
        match self {
            Self::Managed => ("node", "--version"),
            Self::Rust => ("cargo", "--version"),
        }
    }
}

impl fmt::Display for ToolchainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Managed => write!(f, "managed"),
            Self::Rust => write!(f, "rust"),
        }
    }
}

/// Memoizing availability prober
pub struct Toolchain {
    runner: Arc<dyn CommandRunner>,
    managed_ok: AtomicBool,
    rust_ok: AtomicBool,
}

impl Toolchain {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            managed_ok: AtomicBool::new(false),
            rust_ok: AtomicBool::new(false),
        }
    }

    fn flag(&self, kind: ToolchainKind) -> &AtomicBool {
        match kind {
            ToolchainKind::Managed => &self.managed_ok,
            ToolchainKind::Rust => &self.rust_ok,
        }
    }

    /// Ensure the toolchain can run
    pub async fn probe(&self, kind: ToolchainKind) -> ForgeResult<()> {
        if self.flag(kind).load(Ordering::Acquire) {
            return Ok(());
        }

        check_platform(kind, std::env::consts::OS)?;

        let (program, arg) = kind.probe_command();
        let invocation = Invocation::new(program, std::env::temp_dir())
            .arg(arg)
            .timeout(PROBE_TIMEOUT);

        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|e| ForgeError::unavailable(kind.to_string(), e.to_string()))?;

        debug!(toolchain = %kind, version = output.stdout.trim(), "Toolchain available");
        self.flag(kind).store(true, Ordering::Release);
        Ok(())
    }

    /// Probe without memoizing or failing, for status reporting
    pub async fn version(&self, kind: ToolchainKind) -> Option<String> {
        let (program, arg) = kind.probe_command();
        let invocation = Invocation::new(program, std::env::temp_dir())
            .arg(arg)
            .timeout(PROBE_TIMEOUT);
        self.runner
            .run(&invocation)
            .await
            .ok()
            .map(|o| o.stdout.trim().to_string())
    }
}

/// near-sdk-js ships unix-only build tooling
fn check_platform(kind: ToolchainKind, os: &str) -> ForgeResult<()> {
    if kind == ToolchainKind::Managed && os == "windows" {
        return Err(ForgeError::UnsupportedPlatform(
            "near-sdk-js requires Linux or macOS".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::testing::ScriptedRunner;
    use crate::toolchain::{CommandOutput, InvokeError};

    #[test]
    fn managed_toolchain_refused_on_windows() {
        let err = check_platform(ToolchainKind::Managed, "windows").unwrap_err();
        assert!(matches!(err, ForgeError::UnsupportedPlatform(_)));
        assert!(err.to_string().contains("Linux or macOS"));
        assert!(err.hint().unwrap().contains("Rust"));

        assert!(check_platform(ToolchainKind::Rust, "windows").is_ok());
        assert!(check_platform(ToolchainKind::Managed, "linux").is_ok());
        assert!(check_platform(ToolchainKind::Managed, "macos").is_ok());
    }

    #[tokio::test]
    async fn probe_memoizes_success() {
        let runner = ScriptedRunner::new(|_| {
            Ok(CommandOutput {
                stdout: "cargo 1.82.0\n".to_string(),
                ..CommandOutput::default()
            })
        });
        let toolchain = Toolchain::new(runner.clone());

        toolchain.probe(ToolchainKind::Rust).await.unwrap();
        toolchain.probe(ToolchainKind::Rust).await.unwrap();

        assert_eq!(runner.calls().len(), 1);
        assert_eq!(runner.calls()[0].program, "cargo");
    }

    #[tokio::test]
    async fn probe_failure_is_unavailable() {
        let runner = ScriptedRunner::new(|inv| {
            Err(InvokeError::Spawn {
                command: inv.command_line(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
            })
        });
        let toolchain = Toolchain::new(runner.clone());

        let err = toolchain.probe(ToolchainKind::Rust).await.unwrap_err();
        assert!(matches!(err, ForgeError::ToolchainUnavailable { .. }));

        // failures are not memoized
        let _ = toolchain.probe(ToolchainKind::Rust).await;
        assert_eq!(runner.calls().len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn managed_probe_runs_node() {
        let runner = ScriptedRunner::new(|_| Ok(CommandOutput::default()));
        let toolchain = Toolchain::new(runner.clone());
        toolchain.probe(ToolchainKind::Managed).await.unwrap();
        assert_eq!(runner.calls()[0].program, "node");
    }
}
