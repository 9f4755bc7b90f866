//! Strata Storage - per-disk object storage over a plain filesystem
//!
//! Implements `SPEC_FULL.md` §3-§4.9: the `xl.meta` model and codec, local
//! disk operations, the local/remote `DiskOps` capability split and its
//! wire transport, parallel shard/metadata fan-out, the quorum layer over a
//! set, the metadata LRU+TTL cache, and the object pipeline (put/get/head/
//! delete, plain and versioned) built on top of all of the above.

pub mod cache;
pub mod disk;
pub mod diskops;
pub mod fanout;
pub mod pipeline;
pub mod quorum;
pub mod transport;
pub mod xlmeta;

pub use cache::{cache_key, CacheStats, CacheStatsSnapshot, MetadataCache};
pub use disk::{DiskStats, DiskStatsSnapshot, LocalDisk};
pub use diskops::{is_local_endpoint, DiskHandle, DiskOps, DiskRegistry};
pub use fanout::{
    parallel_delete_chunks, parallel_read_chunks, parallel_read_meta, parallel_write_chunks,
    parallel_write_meta, FanoutTarget,
};
pub use quorum::{heal, quorum_for, read_meta, validate, write_meta, Disagreement, QuorumDisk};
pub use transport::{router, RemoteDisk, TransportState};
pub use xlmeta::{
    ChunkChecksum, ErasureMeta, ObjectMeta, Stat, Versioning, XlMeta, CHECKSUM_ALGO,
    ERASURE_ALGORITHM, XL_META_FORMAT, XL_META_VERSION,
};
