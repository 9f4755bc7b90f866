//! Configuration shape (§2.1, §6).
//!
//! This crate owns the *shape* of configuration, not the file-format parser:
//! loading a TOML/YAML/env source into a [`Config`] is the embedding
//! binary's job (`SPEC_FULL.md` §6, "the config loader must supply a
//! validated `Config`"). Every numeric default here matches one named
//! explicitly in `SPEC_FULL.md`.

use crate::types::ErasureConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Root configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub erasure: ErasureSettings,
    pub cache: CacheConfig,
    pub migration: MigrationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            erasure: ErasureSettings::default(),
            cache: CacheConfig::default(),
            migration: MigrationConfig::default(),
        }
    }
}

/// Identifies this node for the "is local?" decision in remote disk
/// transport (§4.4) and lists the disk roots it owns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    pub endpoint: SocketAddr,
    pub disks: Vec<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            endpoint: "0.0.0.0:9300".parse().expect("valid default endpoint"),
            disks: Vec::new(),
        }
    }
}

/// Erasure settings a bucket's default storage class draws from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErasureSettings {
    #[serde(flatten)]
    pub config: ErasureConfig,
    pub enabled: bool,
    /// Objects at or below this size skip erasure coding entirely and are
    /// inlined into `xl.meta` (§3, §4.7).
    pub inline_threshold_bytes: u64,
}

impl Default for ErasureSettings {
    fn default() -> Self {
        Self {
            config: ErasureConfig::default(),
            enabled: true,
            inline_threshold_bytes: 128 * 1024,
        }
    }
}

/// Metadata LRU+TTL cache configuration (§4.9).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl_seconds: 300,
        }
    }
}

/// Migration engine defaults (§4.11, §4.12, §4.13).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub max_retries: u32,
    pub retry_backoff_initial_ms: u64,
    pub retry_backoff_ceiling_ms: u64,
    pub checkpoint_every_objects: u64,
    pub checkpoint_every_secs: u64,
    pub throttle_rate_bytes_per_sec: Option<u64>,
    pub throttle_burst_bytes: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            worker_count: 16,
            queue_capacity: 10_000,
            max_retries: 3,
            retry_backoff_initial_ms: 100,
            retry_backoff_ceiling_ms: 5_000,
            checkpoint_every_objects: 1_000,
            checkpoint_every_secs: 300,
            throttle_rate_bytes_per_sec: None,
            throttle_burst_bytes: 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_spec_numbers() {
        let cfg = Config::default();
        assert_eq!(cfg.cache.max_entries, 10_000);
        assert_eq!(cfg.cache.ttl_seconds, 300);
        assert_eq!(cfg.migration.worker_count, 16);
        assert_eq!(cfg.migration.queue_capacity, 10_000);
        assert_eq!(cfg.migration.max_retries, 3);
        assert_eq!(cfg.erasure.inline_threshold_bytes, 131_072);
        assert_eq!(cfg.erasure.config.data_shards, 8);
        assert_eq!(cfg.erasure.config.parity_shards, 4);
    }
}
