//! Strata Placement - deterministic object placement over a cluster topology
//!
//! Implements `SPEC_FULL.md` §3-§4.5: the `ClusterTopology`/`Pool`/`Set`/
//! `DiskRef` data model, the consistent-hash ring that maps `(bucket, key)`
//! to an owning `(pool, set)`, and the `placement` function that turns that
//! into an ordered `K+M` disk list ready for the fan-out layer in
//! `strata-storage`.
//!
//! ```
//! use strata_placement::{placement, ClusterTopology, DiskRef, Pool, Set};
//!
//! let topology = ClusterTopology::new(
//!     "dep-1",
//!     vec![Pool::new(vec![Set::new(vec![
//!         DiskRef::new("10.0.0.1:9000/disk1", "uuid-1", 1_000_000),
//!         DiskRef::new("10.0.0.2:9000/disk1", "uuid-2", 1_000_000),
//!     ])])],
//! );
//! let result = placement("my-bucket", "my-key", &topology, 2, None).unwrap();
//! assert_eq!(result.num_chunks(), 2);
//! ```

pub mod placement;
pub mod ring;
pub mod topology;

pub use placement::{placement, sequential_distribution, PlacementResult, ShardPlacement};
pub use ring::ConsistentHashRing;
pub use topology::{ClusterTopology, DiskRef, Pool, Set};
