//! Reed-Solomon encoder/decoder
//!
//! This module provides both a high-level `ErasureCodec` API and low-level
//! backend access via the `backend` module. `SPEC_FULL.md` §1 treats the
//! codec as an opaque K+M primitive; this is that primitive's concrete
//! implementation.
//!
//! ```
//! use strata_erasure::ErasureCodec;
//! use strata_common::ErasureConfig;
//!
//! let codec = ErasureCodec::new(ErasureConfig::new(4, 2)).unwrap();
//! let data = b"Hello, World!";
//! let shards = codec.encode(data).unwrap();
//! ```

use crate::backend::{BackendConfig, BackendFactory, ErasureBackend};
use std::sync::Arc;
use strata_common::{Error as CommonError, ErasureConfig, Result};
use thiserror::Error;

/// Errors specific to erasure coding operations
#[derive(Debug, Error)]
pub enum ErasureError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("decoding failed: {0}")]
    DecodingFailed(String),

    #[error("insufficient shards: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    #[error("shard size mismatch")]
    ShardSizeMismatch,
}

impl From<ErasureError> for CommonError {
    fn from(e: ErasureError) -> Self {
        CommonError::ErasureCoding(e.to_string())
    }
}

/// Reed-Solomon codec: any `K` of the `K+M` shards reconstruct the data.
pub struct ErasureCodec {
    config: ErasureConfig,
    backend: Arc<dyn ErasureBackend>,
}

impl ErasureCodec {
    /// Create a new erasure codec with the given configuration.
    ///
    /// Automatically selects the best backend for the platform (ISA-L on
    /// x86 if compiled in, `rust_simd` otherwise).
    pub fn new(config: ErasureConfig) -> Result<Self> {
        if config.data_shards == 0 {
            return Err(ErasureError::InvalidConfig("data_shards must be > 0".into()).into());
        }
        if config.parity_shards == 0 {
            return Err(ErasureError::InvalidConfig("parity_shards must be > 0".into()).into());
        }

        let backend_config = BackendConfig::mds(config.data_shards, config.parity_shards);
        let backend = BackendFactory::create_mds(&backend_config)?;

        Ok(Self { config, backend })
    }

    #[must_use]
    pub const fn config(&self) -> ErasureConfig {
        self.config
    }

    #[must_use]
    pub fn data_shards(&self) -> usize {
        self.backend.data_shards()
    }

    #[must_use]
    pub fn parity_shards(&self) -> usize {
        self.backend.parity_shards()
    }

    #[must_use]
    pub fn total_shards(&self) -> usize {
        self.data_shards() + self.parity_shards()
    }

    /// Encode data into k data shards and m parity shards.
    ///
    /// The input data is split into k equal-sized chunks, then m parity
    /// shards are computed. Returns a vector of k+m shards.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        let k = self.data_shards();

        let shard_size = data.len().div_ceil(k).max(64);
        let padded_size = shard_size * k;

        let mut padded = vec![0u8; padded_size];
        padded[..data.len()].copy_from_slice(data);

        let data_shards: Vec<&[u8]> = (0..k)
            .map(|i| &padded[i * shard_size..(i + 1) * shard_size])
            .collect();

        let shards = self
            .backend
            .encode(&data_shards, shard_size)
            .map_err(|e| ErasureError::EncodingFailed(e.to_string()))?;

        Ok(shards)
    }

    /// Decode shards back to original data.
    ///
    /// Takes a slice of `Option<Vec<u8>>` where `None` represents a missing
    /// shard. At least k shards must be present to reconstruct the data.
    pub fn decode(&self, shards: &mut [Option<Vec<u8>>], original_size: usize) -> Result<Vec<u8>> {
        let k = self.data_shards();

        let available = shards.iter().filter(|s| s.is_some()).count();
        if available < k {
            return Err(ErasureError::InsufficientShards {
                available,
                required: k,
            }
            .into());
        }

        let shard_size = shards
            .iter()
            .find_map(|s| s.as_ref().map(Vec::len))
            .ok_or(ErasureError::InsufficientShards {
                available: 0,
                required: k,
            })?;

        let data_shards_ok = shards[..k].iter().all(Option::is_some);
        if data_shards_ok {
            let mut result = Vec::with_capacity(k * shard_size);
            for shard in shards.iter().take(k) {
                if let Some(data) = shard {
                    result.extend_from_slice(data);
                }
            }
            result.truncate(original_size);
            return Ok(result);
        }

        let missing_indices: Vec<usize> = shards
            .iter()
            .enumerate()
            .filter_map(|(i, s)| if s.is_none() { Some(i) } else { None })
            .collect();

        let shard_refs: Vec<Option<&[u8]>> = shards
            .iter()
            .map(|s| s.as_ref().map(Vec::as_slice))
            .collect();
        let decoded = self
            .backend
            .decode(&shard_refs, shard_size, &missing_indices)
            .map_err(|e| ErasureError::DecodingFailed(e.to_string()))?;

        let mut output = Vec::with_capacity(k * shard_size);
        for shard in decoded.iter().take(k) {
            output.extend_from_slice(shard);
        }

        output.truncate(original_size);
        Ok(output)
    }

    /// Verify shard consistency by re-encoding the data shards and comparing
    /// computed parity against the provided parity shards.
    pub fn verify(&self, shards: &[Vec<u8>]) -> Result<bool> {
        let total = self.total_shards();

        if shards.len() != total {
            return Ok(false);
        }

        if let Some(first_len) = shards.first().map(Vec::len) {
            if !shards.iter().all(|s| s.len() == first_len) {
                return Ok(false);
            }
        }

        let shard_refs: Vec<&[u8]> = shards.iter().map(Vec::as_slice).collect();
        self.backend
            .verify(&shard_refs)
            .map_err(|e| ErasureError::EncodingFailed(e.to_string()).into())
    }
}

impl Default for ErasureCodec {
    fn default() -> Self {
        Self::new(ErasureConfig::default()).expect("default config is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_mds() {
        let codec = ErasureCodec::new(ErasureConfig::new(4, 2)).unwrap();
        let data = b"Hello, World! This is a test of erasure coding.";

        let shards = codec.encode(data).unwrap();
        assert_eq!(shards.len(), 6);

        let shard_size = shards[0].len();
        assert!(shards.iter().all(|s| s.len() == shard_size));

        let mut shard_opts: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        let decoded = codec.decode(&mut shard_opts, data.len()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_decode_with_missing_shards() {
        let codec = ErasureCodec::new(ErasureConfig::new(8, 4)).unwrap();
        let data = b"Hello, World! This is a test of erasure coding with recovery.";

        let shards = codec.encode(data).unwrap();
        assert_eq!(shards.len(), 12);

        let mut shard_opts: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        for i in [1usize, 4, 9, 11] {
            shard_opts[i] = None;
        }

        let decoded = codec.decode(&mut shard_opts, data.len()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_insufficient_shards() {
        let codec = ErasureCodec::new(ErasureConfig::new(4, 2)).unwrap();

        let mut shards: Vec<Option<Vec<u8>>> = vec![
            Some(vec![0u8; 64]),
            Some(vec![0u8; 64]),
            Some(vec![0u8; 64]),
            None,
            None,
            None,
        ];

        let result = codec.decode(&mut shards, 64);
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_detects_corruption() {
        let codec = ErasureCodec::new(ErasureConfig::new(4, 2)).unwrap();
        let data = b"Data to verify with erasure coding.";

        let shards = codec.encode(data).unwrap();
        assert!(codec.verify(&shards).unwrap());

        let mut corrupted = shards.clone();
        corrupted[0][0] ^= 0xFF;
        assert!(!codec.verify(&corrupted).unwrap());
    }

    #[test]
    fn test_codec_helper_methods() {
        let codec = ErasureCodec::new(ErasureConfig::new(8, 4)).unwrap();
        assert_eq!(codec.data_shards(), 8);
        assert_eq!(codec.parity_shards(), 4);
        assert_eq!(codec.total_shards(), 12);
    }
}
