//! Deterministic object-path derivation (§4.1).
//!
//! The path is independent of placement: it only determines where on a
//! disk's directory tree an object's `xl.meta` and chunk files live, not
//! which disk owns them.

use crate::checksum::{blake2b_256, hex_encode};

/// `hash = hex(BLAKE2b-256(bucket + "/" + key))[..16]`, `prefix = hash[..2]`.
///
/// Returns the on-disk directory path `{prefix}/{hash}` (no trailing slash,
/// no leading `{data_dir}`/`{bucket}` component — callers join those on).
#[must_use]
pub fn object_path(bucket: &str, key: &str) -> String {
    let (prefix, hash) = object_hash(bucket, key);
    format!("{prefix}/{hash}")
}

/// The `(prefix, full_hash)` pair backing [`object_path`], exposed
/// separately because the migration scanner (§4.10) and placement ring
/// (§4.5) both need the raw hash for their own lookups.
#[must_use]
pub fn object_hash(bucket: &str, key: &str) -> (String, String) {
    let mut input = String::with_capacity(bucket.len() + 1 + key.len());
    input.push_str(bucket);
    input.push('/');
    input.push_str(key);
    let digest = blake2b_256(input.as_bytes());
    let hash = hex_encode(&digest[..8]);
    let prefix = hash[..2].to_string();
    (prefix, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_deterministic() {
        let a = object_path("bucket", "key");
        let b = object_path("bucket", "key");
        assert_eq!(a, b);
    }

    #[test]
    fn test_object_path_depends_on_both_parts() {
        assert_ne!(object_path("b1", "k"), object_path("b2", "k"));
        assert_ne!(object_path("b", "k1"), object_path("b", "k2"));
    }

    #[test]
    fn test_object_path_shape() {
        let path = object_path("my-bucket", "a/b/c.txt");
        let (prefix, hash) = path.split_once('/').unwrap();
        assert_eq!(prefix.len(), 2);
        assert_eq!(hash.len(), 16);
        assert!(hash.starts_with(prefix));
    }
}
