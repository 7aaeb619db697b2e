//! Integration tests for the forge binary

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const LEGACY: &str = r#"use near_sdk::borsh::{self, BorshDeserialize, BorshSerialize};
use near_sdk::near_bindgen;

#[near_bindgen]
#[derive(BorshDeserialize, BorshSerialize)]
pub struct Contract {
    value: u64,
}

impl Default for Contract {
    fn default() -> Self {
        Self { value: 1 }
    }
}

#[near_bindgen]
impl Contract {
    pub fn get(&self) -> u64 {
        self.value
    }
}
"#;

    const CURRENT: &str = r#"use near_sdk::near;
use near_sdk::PanicOnDefault;

#[derive(PanicOnDefault)]
#[near(contract_state)]
pub struct Contract {}
"#;

    fn forge() -> Command {
        cargo_bin_cmd!("forge")
    }

    /// A command whose config points every path into `dir`
    fn forge_in(dir: &TempDir) -> Command {
        let config = dir.path().join("config.toml");
        if !config.exists() {
            let root = dir.path().join("root").display().to_string();
            std::fs::write(&config, format!("[paths]\nroot = {:?}\n\n[pool]\nsize = 2\n", root)).unwrap();
        }
        let mut cmd = forge();
        cmd.env("FORGE_CONFIG", &config).env_remove("RUST_LOG");
        cmd
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        forge()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Smart-contract build orchestrator"))
            .stdout(predicate::str::contains("compile"))
            .stdout(predicate::str::contains("migrate"));
    }

    #[test]
    fn version_displays() {
        forge()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("forge"));
    }

    #[test]
    fn migrate_prints_current_syntax() {
        let dir = TempDir::new().unwrap();
        let file = write(dir.path(), "lib.rs", LEGACY);

        forge_in(&dir)
            .arg("migrate")
            .arg(&file)
            .assert()
            .success()
            .stdout(predicate::str::contains("#[near(contract_state)]"))
            .stdout(predicate::str::contains("#[derive(PanicOnDefault)]"))
            .stdout(predicate::str::contains("impl Default for Contract").not())
            .stdout(predicate::str::contains("near_bindgen").not());

        // the file itself is left alone
        assert_eq!(std::fs::read_to_string(&file).unwrap(), LEGACY);
    }

    #[test]
    fn migrate_check_flags_legacy_source() {
        let dir = TempDir::new().unwrap();
        let file = write(dir.path(), "lib.rs", LEGACY);

        forge_in(&dir)
            .args(["migrate", "--check"])
            .arg(&file)
            .assert()
            .failure()
            .stderr(predicate::str::contains("legacy near-sdk syntax"));
    }

    #[test]
    fn migrate_check_accepts_current_source() {
        let dir = TempDir::new().unwrap();
        let file = write(dir.path(), "lib.rs", CURRENT);

        forge_in(&dir)
            .args(["migrate", "--check"])
            .arg(&file)
            .assert()
            .success()
            .stdout(predicate::str::contains("is up to date"));
    }

    #[test]
    fn migrate_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        forge_in(&dir)
            .args(["migrate", "does-not-exist.rs"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("does-not-exist.rs"));
    }

    #[test]
    fn config_path_honors_env() {
        let dir = TempDir::new().unwrap();
        forge_in(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_merges_defaults() {
        let dir = TempDir::new().unwrap();
        forge_in(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("size = 2"))
            .stdout(predicate::str::contains("wasm-opt"));
    }

    #[test]
    fn config_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("nested").join("config.toml");

        forge()
            .env("FORGE_CONFIG", &config)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(config.exists());

        forge()
            .env("FORGE_CONFIG", &config)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--force"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let config = write(dir.path(), "config.toml", "[pool]\nsize = \"many\"\n");

        forge()
            .env("FORGE_CONFIG", &config)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn cache_list_empty() {
        let dir = TempDir::new().unwrap();
        forge_in(&dir)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entries found"));
    }

    #[test]
    fn cache_list_and_clear_entry() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("root/persistent-builds/demo/src")).unwrap();

        forge_in(&dir)
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("demo"));

        forge_in(&dir)
            .args(["cache", "clear", "demo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cleared 1"));
        assert!(!dir.path().join("root/persistent-builds/demo").exists());
    }

    #[test]
    fn cache_clear_unknown_key_fails() {
        let dir = TempDir::new().unwrap();
        forge_in(&dir)
            .args(["cache", "clear", "nope", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache entry not found"));
    }

    #[test]
    fn cache_clear_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        forge_in(&dir)
            .args(["cache", "clear", "../escape", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid project id"));
    }

    #[test]
    fn pool_status_json() {
        let dir = TempDir::new().unwrap();
        forge_in(&dir)
            .args(["pool", "status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"overflow\": 0"))
            .stdout(predicate::str::contains("build-1"));
    }

    #[test]
    fn pool_reset_clears_stale_markers() {
        let dir = TempDir::new().unwrap();
        let slot = dir.path().join("root/build-pool/build-0");
        std::fs::create_dir_all(&slot).unwrap();
        std::fs::write(slot.join(".lock"), "0").unwrap();
        std::fs::create_dir_all(dir.path().join("root/build-pool/overflow/build-temp-abc")).unwrap();

        forge_in(&dir)
            .args(["pool", "reset"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 1 stale marker(s) and 1 temporary slot(s)"));
        assert!(!slot.join(".lock").exists());
    }

    #[test]
    fn template_verify_without_template_fails() {
        let dir = TempDir::new().unwrap();
        forge_in(&dir)
            .args(["template", "verify"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }

    #[test]
    fn compile_needs_known_language() {
        let dir = TempDir::new().unwrap();
        let file = write(dir.path(), "contract.txt", "pub struct A;");

        forge_in(&dir)
            .arg("compile")
            .arg(&file)
            .assert()
            .failure()
            .stderr(predicate::str::contains("--language"));
    }

    #[test]
    fn compile_rejects_bad_project_id() {
        let dir = TempDir::new().unwrap();
        let file = write(dir.path(), "lib.rs", CURRENT);

        // fails on the id or on a missing cargo, never succeeds
        forge_in(&dir)
            .arg("compile")
            .arg(&file)
            .args(["--project-id", "../x", "--format", "json"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("\"success\": false"));
    }

    #[test]
    fn status_runs() {
        let dir = TempDir::new().unwrap();
        forge_in(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Build pool"));
    }
}
