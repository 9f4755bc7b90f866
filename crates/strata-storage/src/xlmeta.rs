//! `xl.meta` in-memory model and JSON codec (§3, §4.2).
//!
//! One `XlMeta` is written, byte-identical except for `erasure.index`, to
//! every disk in an object's set (§3 invariant 1). The codec is JSON with a
//! fixed field order; `inline_data` is modeled in memory as raw bytes and
//! base64-encoded only at serialize time (§4.7 "inline_data encoding").

use serde::{Deserialize, Serialize};
use strata_common::{Error, Result};

pub const XL_META_VERSION: u32 = 1;
pub const XL_META_FORMAT: &str = "xl";
pub const CHECKSUM_ALGO: &str = "BLAKE2b-256";
pub const ERASURE_ALGORITHM: &str = "ReedSolomon";

/// Per-chunk checksum record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkChecksum {
    pub algo: String,
    #[serde(with = "hex_hash")]
    pub hash: [u8; 32],
}

impl ChunkChecksum {
    #[must_use]
    pub fn new(hash: [u8; 32]) -> Self {
        Self {
            algo: CHECKSUM_ALGO.to_string(),
            hash,
        }
    }
}

mod hex_hash {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("hash must be 32 bytes"))
    }
}

/// Erasure-coding metadata: shape, this disk's slot, and per-chunk checksums.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureMeta {
    pub algorithm: String,
    pub data: u32,
    pub parity: u32,
    pub block_size: u32,
    /// This disk's slot, `1..=K+M`. Identical `XlMeta` copies across a set
    /// differ only in this field (§3 invariant 1).
    pub index: u32,
    /// Permutation of `1..=K+M` recording which chunk index lives on which
    /// disk slot (§3 invariant 2).
    pub distribution: Vec<u32>,
    pub checksums: Vec<ChunkChecksum>,
}

/// Object-level metadata: content headers, ETag, user metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    pub etag: String,
    #[serde(default)]
    pub user_meta: std::collections::BTreeMap<String, String>,
}

/// Version/delete-marker state for one `xl.meta` record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub is_latest: bool,
    pub is_delete_marker: bool,
}

impl Default for Versioning {
    fn default() -> Self {
        Self {
            version_id: None,
            is_latest: true,
            is_delete_marker: false,
        }
    }
}

/// `stat { size, mod_time }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub size: u64,
    /// ISO-8601 timestamp, e.g. `2026-07-27T00:00:00Z`.
    pub mod_time: String,
}

/// The full per-disk `xl.meta` record (§3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct XlMeta {
    pub version: u32,
    pub format: String,
    /// Object identity this record belongs to. The on-disk path is a hash
    /// of `(bucket, key)` and cannot be inverted (§4.1), so the migration
    /// scanner (§4.10) recovers identity by reading it back out of the
    /// record itself rather than from the directory tree.
    pub bucket: String,
    pub key: String,
    pub stat: Stat,
    pub erasure: ErasureMeta,
    pub meta: ObjectMeta,
    pub versioning: Versioning,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_opt"
    )]
    pub inline_data: Option<Vec<u8>>,
}

mod base64_opt {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        data: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match data {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let opt = Option::<String>::deserialize(deserializer)?;
        opt.map(|s| STANDARD.decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

impl XlMeta {
    /// Validate the structural invariants from §3 that the codec alone
    /// cannot enforce via the type system (lengths, delete-marker shape).
    pub fn validate(&self) -> Result<()> {
        let num_chunks = (self.erasure.data + self.erasure.parity) as usize;
        if self.erasure.distribution.len() != num_chunks {
            return Err(Error::invalid_meta(format!(
                "distribution has {} entries, expected {num_chunks}",
                self.erasure.distribution.len()
            )));
        }
        if self.erasure.checksums.len() != num_chunks {
            return Err(Error::invalid_meta(format!(
                "checksums has {} entries, expected {num_chunks}",
                self.erasure.checksums.len()
            )));
        }
        {
            let mut sorted = self.erasure.distribution.clone();
            sorted.sort_unstable();
            let expected: Vec<u32> = (1..=num_chunks as u32).collect();
            if sorted != expected {
                return Err(Error::invalid_meta(
                    "distribution is not a permutation of 1..=K+M",
                ));
            }
        }
        if !(1..=num_chunks as u32).contains(&self.erasure.index) {
            return Err(Error::invalid_meta(format!(
                "erasure.index {} out of range 1..={num_chunks}",
                self.erasure.index
            )));
        }
        if self.versioning.is_delete_marker
            && (self.stat.size != 0 || self.inline_data.is_some())
        {
            return Err(Error::invalid_meta(
                "delete marker must have size 0 and no inline_data",
            ));
        }
        Ok(())
    }

    /// Serialize to the on-disk/on-wire JSON form (§4.2).
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| Error::invalid_meta(format!("serialize xl.meta: {e}")))
    }

    /// Parse from JSON, then validate structural invariants.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let meta: Self = serde_json::from_slice(bytes)
            .map_err(|e| Error::invalid_meta(format!("parse xl.meta: {e}")))?;
        meta.validate()?;
        Ok(meta)
    }

    /// A deep clone, the only way the metadata cache (§4.9) or a per-disk
    /// fan-out copy (§4.6) duplicates a record.
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        self.clone()
    }

    /// Per-disk copy with `erasure.index` set to this disk's slot, matching
    /// §3 invariant 1 and §4.6's "per-disk `xl.meta` copy sets
    /// `erasure.index = i+1`".
    #[must_use]
    pub fn for_disk_index(&self, index: u32) -> Self {
        let mut copy = self.clone();
        copy.erasure.index = index;
        copy
    }
}
