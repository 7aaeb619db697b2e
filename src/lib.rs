//! contract-forge - smart-contract build orchestrator
//!
//! Compiles NEAR contracts from Rust, JavaScript and TypeScript sources.
//! Managed-language builds run in pooled workspaces copied from a
//! verified dependency template; Rust builds go through a syntax
//! migrator and a persistent, content-addressed build cache.

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod journal;
pub mod migrate;
pub mod pool;
pub mod template;
pub mod toolchain;
pub mod ui;

pub use build::{BuildEngine, CompilationResult, CompileRequest, Language};
pub use error::{ForgeError, ForgeResult};
