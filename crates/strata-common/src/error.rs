//! Error taxonomy shared across the placement, storage and migration crates.
//!
//! Variants follow the ten kinds named in the error handling design:
//! `InvalidArg`, `NotFound`, `InvalidMeta`, `ChecksumMismatch`,
//! `InsufficientShards`, `QuorumFailed`, `Io`, `Rpc`, `Oom`, `InvalidState`.

use crate::types::{BucketNameError, ObjectKeyError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid xl.meta: {0}")]
    InvalidMeta(String),

    #[error("checksum mismatch on chunk {index}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        index: u32,
        expected: String,
        actual: String,
    },

    #[error("insufficient shards for reconstruction: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    #[error("quorum failed: {succeeded} of {total} disks, needed {required}")]
    QuorumFailed {
        succeeded: usize,
        required: usize,
        total: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("out of memory: {0}")]
    Oom(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidState { from: String, to: String },

    #[error("invalid bucket name: {0}")]
    InvalidBucketName(#[from] BucketNameError),

    #[error("invalid object key: {0}")]
    InvalidObjectKey(#[from] ObjectKeyError),

    #[error("erasure coding error: {0}")]
    ErasureCoding(String),
}

impl Error {
    #[must_use]
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Self::InvalidArg(msg.into())
    }

    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    #[must_use]
    pub fn invalid_meta(msg: impl Into<String>) -> Self {
        Self::InvalidMeta(msg.into())
    }

    /// Errors the migration worker (§4.12) and remote transport retry loop
    /// treat as transient: worth a bounded number of retries with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Rpc(_))
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
