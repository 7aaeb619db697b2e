//! Toolchain invocation
//!
//! Drives the external compilers as black boxes:
//! - `runner`: subprocess execution with timeout and bounded capture
//! - `classify`: readable messages scraped from compiler output
//! - `optimizer`: optional, never-fatal wasm-opt pass
//! - `probe`: fail-fast availability checks

pub mod classify;
mod optimizer;
mod probe;
mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{classify, classify_invoke, Diagnosis};
pub use optimizer::{OptimizedArtifact, Optimizer};
pub use probe::{Toolchain, ToolchainKind};
pub use runner::{CommandOutput, CommandRunner, Invocation, InvokeError, ProcessRunner, DEFAULT_OUTPUT_CAP};
