//! Core value types shared across the placement, storage and migration crates.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a disk, stable across topology generations.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiskId(Uuid);

impl DiskId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DiskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiskId({})", self.0)
    }
}

impl fmt::Display for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DiskId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DiskId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Uuid::parse_str(&s)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// A version identifier. The unversioned case is represented by the absence
/// of a `VersionId` (`Option::None`), not by an empty string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize)]
pub struct VersionId(String);

impl VersionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors raised validating an S3 bucket name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BucketNameError {
    #[error("bucket name must be 3-63 characters, got {0}")]
    InvalidLength(usize),
    #[error("bucket name contains invalid character: {0:?}")]
    InvalidCharacter(char),
    #[error("bucket name must start and end with a lowercase letter or digit")]
    InvalidEdge,
    #[error("bucket name must not be formatted as an IP address")]
    LooksLikeIpAddress,
}

/// A validated S3 bucket name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
pub struct BucketName(String);

impl BucketName {
    pub fn parse(name: impl Into<String>) -> Result<Self, BucketNameError> {
        let name = name.into();
        validate_bucket_name(&name)?;
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_bucket_name(name: &str) -> Result<(), BucketNameError> {
    if name.len() < 3 || name.len() > 63 {
        return Err(BucketNameError::InvalidLength(name.len()));
    }
    for c in name.chars() {
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-') {
            return Err(BucketNameError::InvalidCharacter(c));
        }
    }
    let first = name.chars().next().unwrap();
    let last = name.chars().next_back().unwrap();
    if !(first.is_ascii_lowercase() || first.is_ascii_digit())
        || !(last.is_ascii_lowercase() || last.is_ascii_digit())
    {
        return Err(BucketNameError::InvalidEdge);
    }
    if name.matches('.').count() == 3 && name.split('.').all(|octet| octet.parse::<u8>().is_ok()) {
        return Err(BucketNameError::LooksLikeIpAddress);
    }
    Ok(())
}

/// Errors raised validating an object key.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ObjectKeyError {
    #[error("object key must not be empty")]
    Empty,
    #[error("object key exceeds 1024 bytes")]
    TooLong,
}

/// A validated object key. Keys are otherwise close to unrestricted byte
/// strings in S3; the only rules enforced here are non-empty and a length
/// cap, matching the contract the out-of-scope S3 front-end relies on.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn parse(key: impl Into<String>) -> Result<Self, ObjectKeyError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ObjectKeyError::Empty);
        }
        if key.len() > 1024 {
            return Err(ObjectKeyError::TooLong);
        }
        Ok(Self(key))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Erasure coding shape: `K` data shards, `M` parity shards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureConfig {
    pub data_shards: u8,
    pub parity_shards: u8,
}

impl ErasureConfig {
    #[must_use]
    pub const fn new(data_shards: u8, parity_shards: u8) -> Self {
        Self {
            data_shards,
            parity_shards,
        }
    }

    #[must_use]
    pub const fn total_shards(&self) -> u8 {
        self.data_shards + self.parity_shards
    }

    /// Default shape named in `SPEC_FULL.md` §4.7: 8 data, 4 parity.
    pub const DEFAULT: Self = Self::new(8, 4);
}

impl Default for ErasureConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_name_valid() {
        assert!(BucketName::parse("my-bucket-1").is_ok());
    }

    #[test]
    fn test_bucket_name_invalid() {
        assert_eq!(
            BucketName::parse("ab"),
            Err(BucketNameError::InvalidLength(2))
        );
        assert_eq!(
            BucketName::parse("My-Bucket"),
            Err(BucketNameError::InvalidCharacter('M'))
        );
        assert_eq!(
            BucketName::parse("-bucket"),
            Err(BucketNameError::InvalidEdge)
        );
        assert_eq!(
            BucketName::parse("192.168.1.1"),
            Err(BucketNameError::LooksLikeIpAddress)
        );
    }

    #[test]
    fn test_object_key() {
        assert!(ObjectKey::parse("a/b/c.txt").is_ok());
        assert_eq!(ObjectKey::parse(""), Err(ObjectKeyError::Empty));
    }

    #[test]
    fn test_erasure_config_default() {
        let cfg = ErasureConfig::default();
        assert_eq!(cfg.data_shards, 8);
        assert_eq!(cfg.parity_shards, 4);
        assert_eq!(cfg.total_shards(), 12);
    }

    #[test]
    fn test_disk_id_roundtrip() {
        let id = DiskId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: DiskId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
