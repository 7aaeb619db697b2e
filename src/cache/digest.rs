//! Content digests and cache keys for Rust builds
//!
//! Same migrated source = same key. An explicit project id takes
//! precedence and is validated before it is used as a directory name.

use crate::error::{ForgeError, ForgeResult};
use sha2::{Digest, Sha256};

/// Hex characters kept from the SHA-256 of the source
pub const DIGEST_LEN: usize = 16;

/// Hash migrated source using SHA256, returning the first 16 hex chars
pub fn source_digest(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let result = hasher.finalize();

    hex::encode(&result[..DIGEST_LEN / 2])
}

/// Reject ids that could escape the cache directory
pub fn validate_project_id(id: &str) -> ForgeResult<()> {
    let invalid = |reason: &str| ForgeError::InvalidProjectId {
        id: id.to_string(),
        reason: reason.to_string(),
    };

    if id.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if id.contains('/') || id.contains('\\') || id.contains("..") || id.contains('\0') {
        return Err(invalid("must not contain path separators or '..'"));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(invalid(
            "must contain only alphanumeric characters, hyphens, or underscores",
        ));
    }
    Ok(())
}

/// Directory key for a build: the project id when given, else the digest
pub fn cache_key(digest: &str, project_id: Option<&str>) -> ForgeResult<String> {
    match project_id {
        Some(id) => {
            validate_project_id(id)?;
            Ok(id.to_string())
        }
        None => Ok(digest.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_truncated_sha256() {
        assert_eq!(source_digest(""), "e3b0c44298fc1c14");
        assert_eq!(source_digest("x").len(), DIGEST_LEN);
    }

    #[test]
    fn digest_deterministic_and_content_sensitive() {
        assert_eq!(source_digest("pub struct A;"), source_digest("pub struct A;"));
        assert_ne!(source_digest("pub struct A;"), source_digest("pub struct B;"));
    }

    #[test]
    fn project_id_rejects_traversal() {
        assert!(validate_project_id("../etc").is_err());
        assert!(validate_project_id("foo/bar").is_err());
        assert!(validate_project_id("foo\\bar").is_err());
        assert!(validate_project_id("..").is_err());
        assert!(validate_project_id("").is_err());
    }

    #[test]
    fn project_id_rejects_special_chars() {
        assert!(validate_project_id("my project").is_err());
        assert!(validate_project_id("proj.v2").is_err());
        assert!(validate_project_id("naïve").is_err());
    }

    #[test]
    fn project_id_wins_over_digest() {
        assert_eq!(cache_key("abcdef0123456789", Some("counter-v2")).unwrap(), "counter-v2");
        assert_eq!(cache_key("abcdef0123456789", None).unwrap(), "abcdef0123456789");
        assert!(matches!(
            cache_key("abcdef0123456789", Some("a/b")),
            Err(ForgeError::InvalidProjectId { .. })
        ));
    }
}
