//! `placement(bucket, key, topology) -> [(disk_path, disk_endpoint); K+M]` (§4.5).
//!
//! Ring lookup decides the owning `(pool, set)`; within that set, disk order
//! follows a `distribution` permutation — the one already baked into a
//! written `xl.meta` when reconstructing a read, or a fresh sequential one
//! when a writer is placing a brand-new object.

use crate::ring::ConsistentHashRing;
use crate::topology::{ClusterTopology, Set};
use strata_common::{Error, Result};

/// One shard's placement: which disk it lives on and the network endpoint
/// to reach it through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardPlacement {
    pub chunk_index: u32,
    pub disk_path: String,
    pub disk_endpoint: String,
}

/// The full `K+M`-length placement of one object under one topology.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacementResult {
    pub pool: usize,
    pub set: usize,
    pub distribution: Vec<u32>,
    pub shards: Vec<ShardPlacement>,
}

impl PlacementResult {
    #[must_use]
    pub fn num_chunks(&self) -> usize {
        self.shards.len()
    }
}

/// Sequential `1..=n` distribution, the default a writer picks for a brand
/// new object (§4.5).
#[must_use]
pub fn sequential_distribution(n: usize) -> Vec<u32> {
    (1..=n as u32).collect()
}

/// Look up `(pool, set)` for `bucket/key` against `topology`'s ring, then
/// order that set's disks by `distribution`.
///
/// `distribution[slot]` is the 1-based chunk index assigned to disk `slot`
/// in the set's disk list (the same convention `xl.meta.erasure.distribution`
/// uses, §3 invariant 1). Pass `None` to get the writer's default sequential
/// distribution for a new object; pass `Some(d)` taken from an existing
/// `xl.meta` to reconstruct the placement a previous write used.
pub fn placement(
    bucket: &str,
    key: &str,
    topology: &ClusterTopology,
    num_chunks: usize,
    distribution: Option<&[u32]>,
) -> Result<PlacementResult> {
    let ring = ConsistentHashRing::build(topology);
    let (pool, set_idx) = ring
        .lookup(bucket, key)
        .ok_or_else(|| Error::invalid_arg("topology has no sets to place into"))?;
    let set = topology
        .set(pool, set_idx)
        .ok_or_else(|| Error::invalid_arg("ring lookup returned an out-of-range set"))?;

    if set.disk_count < num_chunks {
        return Err(Error::invalid_arg(format!(
            "set {pool}/{set_idx} has {} disks, need {num_chunks} for K+M",
            set.disk_count
        )));
    }

    let distribution: Vec<u32> = match distribution {
        Some(d) => {
            if d.len() != num_chunks {
                return Err(Error::invalid_meta(format!(
                    "distribution has {} entries, expected {num_chunks}",
                    d.len()
                )));
            }
            d.to_vec()
        }
        None => sequential_distribution(num_chunks),
    };

    Ok(PlacementResult {
        pool,
        set: set_idx,
        distribution: distribution.clone(),
        shards: disks_in_distribution_order(set, &distribution)?,
    })
}

/// Build shard placements for `set`'s disks in the order `distribution`
/// specifies: `shards[slot]` gets `chunk_index = distribution[slot]`, and
/// the disk used for chunk index `c` is `set.disks[position of c in distribution]`.
fn disks_in_distribution_order(set: &Set, distribution: &[u32]) -> Result<Vec<ShardPlacement>> {
    let mut shards = Vec::with_capacity(distribution.len());
    for (slot, &chunk_index) in distribution.iter().enumerate() {
        let disk = set.disks.get(slot).ok_or_else(|| {
            Error::invalid_arg(format!("distribution slot {slot} has no matching disk"))
        })?;
        shards.push(ShardPlacement {
            chunk_index,
            disk_path: disk.disk_path().to_string(),
            disk_endpoint: disk.network_address().to_string(),
        });
    }
    // Shards are returned ordered by chunk index (1..=K+M), not by disk
    // slot, matching "chunk index 1 goes to the first [disk], etc." (§3)
    // once a distribution is applied.
    shards.sort_by_key(|s| s.chunk_index);
    Ok(shards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{DiskRef, Pool};

    fn disk(n: u8) -> DiskRef {
        DiskRef::new(format!("10.0.0.{n}:9000/data/disk{n}"), format!("uuid-{n}"), 1)
    }

    fn topology() -> ClusterTopology {
        ClusterTopology::new(
            "dep-1",
            vec![Pool::new(vec![
                Set::new(vec![disk(1), disk(2), disk(3), disk(4)]),
                Set::new(vec![disk(5), disk(6), disk(7), disk(8)]),
            ])],
        )
    }

    #[test]
    fn test_placement_deterministic() {
        let topo = topology();
        let a = placement("b", "k", &topo, 4, None).unwrap();
        let b = placement("b", "k", &topo, 4, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_placement_default_sequential_distribution() {
        let topo = topology();
        let result = placement("b", "k", &topo, 4, None).unwrap();
        assert_eq!(result.distribution, vec![1, 2, 3, 4]);
        let indices: Vec<u32> = result.shards.iter().map(|s| s.chunk_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_placement_respects_existing_distribution() {
        let topo = topology();
        let written = placement("b", "k", &topo, 4, None).unwrap();
        // Reconstruct a read using a rotated distribution as if it had been
        // chosen at write time.
        let rotated = vec![4, 1, 2, 3];
        let read = placement("b", "k", &topo, 4, Some(&rotated)).unwrap();
        assert_eq!(read.pool, written.pool);
        assert_eq!(read.set, written.set);
        let indices: Vec<u32> = read.shards.iter().map(|s| s.chunk_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_placement_rejects_undersized_set() {
        let topo = topology();
        let err = placement("b", "k", &topo, 12, None).unwrap_err();
        assert!(matches!(err, Error::InvalidArg(_)));
    }
}
