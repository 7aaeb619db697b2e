//! Rust project scaffolding shared by every cache entry

use crate::config::schema::RustConfig;
use crate::error::{ForgeError, ForgeResult};
use crate::toolchain::Invocation;
use std::path::{Path, PathBuf};

/// File name cargo gives the artifact of the `contract` package
pub const ARTIFACT_NAME: &str = "contract.wasm";

/// Top-level entries never copied from the base project
pub const COPY_SKIP: [&str; 2] = ["target", ".git"];

pub const DEFAULT_LIB_RS: &str = r#"use near_sdk::near;
use near_sdk::PanicOnDefault;

#[derive(PanicOnDefault)]
#[near(contract_state)]
pub struct Contract {}

#[near]
impl Contract {
    #[init]
    pub fn new() -> Self {
        Self {}
    }

    pub fn hello_world(&self) -> String {
        "Hello, NEAR!".to_string()
    }
}
"#;

pub fn cargo_toml(settings: &RustConfig) -> String {
    format!(
        r#"[package]
name = "contract"
version = "0.1.0"
edition = "2021"

[lib]
crate-type = ["cdylib"]

[dependencies]
near-sdk = "{}"
borsh = "1"

[profile.release]
opt-level = "z"
lto = "thin"
codegen-units = 1
panic = "abort"
"#,
        settings.sdk_version
    )
}

/// Source file of a project
pub fn lib_rs(project: &Path) -> PathBuf {
    project.join("src").join("lib.rs")
}

/// Where cargo leaves the release artifact under `target_dir`
pub fn release_dir(target_dir: &Path, settings: &RustConfig) -> PathBuf {
    target_dir.join(&settings.target).join("release")
}

/// Whether `dir` holds a usable base project
pub fn is_scaffolded(dir: &Path) -> bool {
    dir.join("Cargo.toml").exists() && lib_rs(dir).exists()
}

/// Write `Cargo.toml` and the default contract into `dir`
pub async fn scaffold(dir: &Path, settings: &RustConfig) -> ForgeResult<()> {
    let src = dir.join("src");
    tokio::fs::create_dir_all(&src)
        .await
        .map_err(|e| ForgeError::io(format!("creating {}", src.display()), e))?;

    let files = [
        (dir.join("Cargo.toml"), cargo_toml(settings)),
        (lib_rs(dir), DEFAULT_LIB_RS.to_string()),
    ];
    for (path, contents) in files {
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| ForgeError::io(format!("writing {}", path.display()), e))?;
    }
    Ok(())
}

/// `cargo build` for `project` against the shared target directory
pub fn cargo_build(project: &Path, target_dir: &Path, settings: &RustConfig) -> Invocation {
    Invocation::new("cargo", project)
        .args(["build", "--target", settings.target.as_str(), "--release"])
        .env("CARGO_TARGET_DIR", target_dir.display().to_string())
        .env("RUSTFLAGS", settings.rustflags.as_str())
        .timeout(settings.build_timeout())
        .max_output(settings.max_output_bytes())
}
