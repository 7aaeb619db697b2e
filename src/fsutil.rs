//! Filesystem helpers shared by the template, pool and cache
//!
//! Tree copies run on the blocking pool; they touch thousands of files
//! when materializing `node_modules`.

use crate::error::{ForgeError, ForgeResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Recursively copy `src` into `dst`, skipping top-level entries named in `skip`.
///
/// Symlinks are recreated as symlinks on Unix so `node_modules/.bin` shims
/// keep pointing into the copied tree.
pub async fn copy_tree(src: &Path, dst: &Path, skip: &[&str]) -> ForgeResult<u64> {
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    let skip: Vec<String> = skip.iter().map(|s| s.to_string()).collect();

    tokio::task::spawn_blocking(move || copy_tree_blocking(&src, &dst, &skip))
        .await
        .map_err(|e| ForgeError::Internal(format!("copy task failed: {}", e)))?
}

fn copy_tree_blocking(src: &Path, dst: &Path, skip: &[String]) -> ForgeResult<u64> {
    let mut copied = 0u64;
    let walker = WalkDir::new(src)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() == 1 && skip.iter().any(|s| e.file_name() == s.as_str()))
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            ForgeError::io(
                format!("walking {}", src.display()),
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::other("directory walk failed")),
            )
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| ForgeError::Internal(e.to_string()))?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| ForgeError::io(format!("creating {}", target.display()), e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|e| ForgeError::io(format!("copying to {}", target.display()), e))?;
            copied += 1;
        }
    }

    debug!(src = %src.display(), dst = %dst.display(), files = copied, "Copied tree");
    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> ForgeResult<()> {
    let pointee = fs::read_link(link)
        .map_err(|e| ForgeError::io(format!("reading link {}", link.display()), e))?;
    if target.symlink_metadata().is_ok() {
        let _ = fs::remove_file(target);
    }
    std::os::unix::fs::symlink(&pointee, target)
        .map_err(|e| ForgeError::io(format!("creating link {}", target.display()), e))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> ForgeResult<()> {
    fs::copy(link, target)
        .map(|_| ())
        .map_err(|e| ForgeError::io(format!("copying to {}", target.display()), e))
}

/// Add execute permission to every regular file under `root`.
///
/// A recursive copy does not reliably carry execute bits, and helper
/// binaries shipped inside `node_modules` fail with EACCES without them.
/// Returns the number of files touched. Missing roots are ignored.
#[cfg(unix)]
pub fn make_executable(root: &Path) -> ForgeResult<usize> {
    use std::os::unix::fs::PermissionsExt;

    if !root.exists() {
        return Ok(0);
    }

    let mut touched = 0;
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = entry
            .metadata()
            .map_err(|e| ForgeError::Internal(format!("metadata for {}: {}", entry.path().display(), e)))?;
        let mode = metadata.permissions().mode();
        if mode & 0o111 != 0o111 {
            fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode | 0o755))
                .map_err(|e| ForgeError::io(format!("chmod {}", entry.path().display()), e))?;
            touched += 1;
        }
    }
    Ok(touched)
}

#[cfg(not(unix))]
pub fn make_executable(_root: &Path) -> ForgeResult<usize> {
    Ok(0)
}

/// Write `contents` to `path` via a sibling temp file and rename.
///
/// Readers never observe a partially written file.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> ForgeResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| ForgeError::Internal(format!("{} has no parent", path.display())))?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| ForgeError::io(format!("creating {}", parent.display()), e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.tmp-{}", file_name, Uuid::new_v4().simple()));

    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| ForgeError::io(format!("writing {}", tmp.display()), e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(ForgeError::io(format!("renaming into {}", path.display()), e));
    }
    Ok(())
}

/// Remove a file or directory tree, logging instead of failing
pub async fn remove_best_effort(path: &Path) {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Cleanup failed, continuing");
    }
}

/// Total size in bytes of regular files under `root`
pub fn dir_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Relative paths from `required` that do not exist under `root`
pub fn missing_under(root: &Path, required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|rel| !root.join(rel.as_str()).exists())
        .cloned()
        .collect()
}

/// Join a relative path, used for config-supplied sub-paths
pub fn join_rel(root: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Format bytes as human-readable size (e.g., "1.5 MB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn copy_tree_skips_top_level_entries() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("src")).unwrap();
        fs::create_dir_all(src.path().join("target/release")).unwrap();
        fs::create_dir_all(src.path().join("nested/target")).unwrap();
        fs::write(src.path().join("Cargo.toml"), "[package]").unwrap();
        fs::write(src.path().join("src/lib.rs"), "// lib").unwrap();
        fs::write(src.path().join("target/release/big.rlib"), "x").unwrap();
        fs::write(src.path().join("nested/target/keep.txt"), "kept").unwrap();

        let out = dst.path().join("project");
        let copied = copy_tree(src.path(), &out, &["target", ".git"]).await.unwrap();

        assert_eq!(copied, 3);
        assert!(out.join("src/lib.rs").exists());
        assert!(!out.join("target").exists());
        // only top-level names are skipped
        assert!(out.join("nested/target/keep.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn copy_tree_preserves_relative_symlinks() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("node_modules/.bin")).unwrap();
        fs::create_dir_all(src.path().join("node_modules/tool")).unwrap();
        fs::write(src.path().join("node_modules/tool/cli.js"), "#!/usr/bin/env node").unwrap();
        std::os::unix::fs::symlink("../tool/cli.js", src.path().join("node_modules/.bin/tool")).unwrap();

        let out = dst.path().join("copy");
        copy_tree(src.path(), &out, &[]).await.unwrap();

        let link = out.join("node_modules/.bin/tool");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("../tool/cli.js"));
        assert!(link.exists());
    }

    #[cfg(unix)]
    #[test]
    fn make_executable_sets_bits_through_links() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("qjsc"), "binary").unwrap();
        fs::set_permissions(bin.join("qjsc"), fs::Permissions::from_mode(0o644)).unwrap();

        let touched = make_executable(&bin).unwrap();
        assert_eq!(touched, 1);
        let mode = fs::metadata(bin.join("qjsc")).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);

        // idempotent
        assert_eq!(make_executable(&bin).unwrap(), 0);
        assert_eq!(make_executable(&dir.path().join("absent")).unwrap(), 0);
    }

    #[tokio::test]
    async fn write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src").join("lib.rs");

        write_atomic(&path, b"first").await.unwrap();
        write_atomic(&path, b"second").await.unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("src"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn remove_best_effort_handles_missing() {
        let dir = TempDir::new().unwrap();
        remove_best_effort(&dir.path().join("missing")).await;

        let tree = dir.path().join("tree/a/b");
        fs::create_dir_all(&tree).unwrap();
        remove_best_effort(&dir.path().join("tree")).await;
        assert!(!dir.path().join("tree").exists());
    }

    #[test]
    fn missing_under_reports_absent_paths() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/near-sdk-js")).unwrap();
        let required = vec![
            "node_modules/near-sdk-js".to_string(),
            "node_modules/.bin/near-sdk-js".to_string(),
        ];
        assert_eq!(
            missing_under(dir.path(), &required),
            vec!["node_modules/.bin/near-sdk-js".to_string()]
        );
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
