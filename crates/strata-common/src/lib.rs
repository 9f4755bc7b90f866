//! Shared types, error taxonomy, checksums and config shape for Strata.

pub mod checksum;
pub mod config;
pub mod error;
pub mod path;
pub mod time;
pub mod types;

pub use checksum::{blake2b_256, hex_encode, verify_blake2b_256, xxhash64, Blake2bCalculator};
pub use config::Config;
pub use error::{Error, Result};
pub use path::{object_hash, object_path};
pub use time::now_iso8601;
pub use types::*;
