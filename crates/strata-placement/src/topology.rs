//! Cluster topology data model (§3): `ClusterTopology { generation, pools }`,
//! `Pool { sets }`, `Set { disk_count, disks }`, `DiskRef { endpoint, uuid, capacity }`.
//!
//! A topology is immutable once built: growing a pool or adding a set
//! constructs a *new* `ClusterTopology` with `generation + 1` rather than
//! mutating shards already placed under the prior generation (§3). Callers
//! hold topology snapshots behind `Arc` and pass non-owning references into
//! placement and migration (§9 "Global process state").

use serde::{Deserialize, Serialize};

/// A disk's address, as seen by the placement and transport layers.
///
/// `endpoint` bundles the owning node's network address with the disk's
/// local filesystem path (§3: "endpoint carries the node's network address
/// and the disk path"), in the form `host:port/disk/path`. [`DiskRef::split`]
/// separates the two for callers that need them individually (remote
/// transport needs the address to dial, local disk ops need the path).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskRef {
    pub endpoint: String,
    pub uuid: String,
    pub capacity: u64,
}

impl DiskRef {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, uuid: impl Into<String>, capacity: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            uuid: uuid.into(),
            capacity,
        }
    }

    /// Split `endpoint` into `(network_address, disk_path)`.
    ///
    /// `network_address` is the `host:port` prefix; `disk_path` is
    /// everything after the first `/`. An endpoint with no `/` is treated
    /// as address-only with an empty disk path.
    #[must_use]
    pub fn split(&self) -> (&str, &str) {
        match self.endpoint.split_once('/') {
            Some((addr, path)) => (addr, path),
            None => (self.endpoint.as_str(), ""),
        }
    }

    #[must_use]
    pub fn network_address(&self) -> &str {
        self.split().0
    }

    #[must_use]
    pub fn disk_path(&self) -> &str {
        self.split().1
    }
}

/// A durability unit: all `K+M` shards of an object placed in this set live
/// on the disks listed here, one shard per disk (§3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Set {
    pub disk_count: usize,
    pub disks: Vec<DiskRef>,
}

impl Set {
    #[must_use]
    pub fn new(disks: Vec<DiskRef>) -> Self {
        Self {
            disk_count: disks.len(),
            disks,
        }
    }
}

/// A group of sets. The topology is a flat list of pools.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub sets: Vec<Set>,
}

impl Pool {
    #[must_use]
    pub fn new(sets: Vec<Set>) -> Self {
        Self { sets }
    }
}

/// A versioned snapshot of the cluster's placement topology (§3).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTopology {
    pub generation: u64,
    pub deployment_id: String,
    pub pools: Vec<Pool>,
}

impl ClusterTopology {
    #[must_use]
    pub fn new(deployment_id: impl Into<String>, pools: Vec<Pool>) -> Self {
        Self {
            generation: 0,
            deployment_id: deployment_id.into(),
            pools,
        }
    }

    /// Build a new topology with `pools` replaced and `generation`
    /// incremented, per §3's "constructing a new topology from an old one
    /// ... always increments `generation`".
    #[must_use]
    pub fn with_pools(&self, pools: Vec<Pool>) -> Self {
        Self {
            generation: self.generation + 1,
            deployment_id: self.deployment_id.clone(),
            pools,
        }
    }

    #[must_use]
    pub fn set(&self, pool: usize, set: usize) -> Option<&Set> {
        self.pools.get(pool)?.sets.get(set)
    }

    /// Total number of `(pool, set)` pairs in the topology, in ring-node
    /// iteration order.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.pools.iter().map(|p| p.sets.len()).sum()
    }

    pub fn iter_sets(&self) -> impl Iterator<Item = (usize, usize, &Set)> {
        self.pools.iter().enumerate().flat_map(|(pool_idx, pool)| {
            pool.sets
                .iter()
                .enumerate()
                .map(move |(set_idx, set)| (pool_idx, set_idx, set))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(n: u8) -> DiskRef {
        DiskRef::new(format!("10.0.0.1:9000/data/disk{n}"), format!("uuid-{n}"), 1_000_000)
    }

    #[test]
    fn test_disk_ref_split() {
        let d = disk(1);
        assert_eq!(d.network_address(), "10.0.0.1:9000");
        assert_eq!(d.disk_path(), "data/disk1");
    }

    #[test]
    fn test_with_pools_bumps_generation() {
        let t0 = ClusterTopology::new("dep-1", vec![Pool::new(vec![Set::new(vec![disk(1)])])]);
        assert_eq!(t0.generation, 0);
        let t1 = t0.with_pools(vec![Pool::new(vec![
            Set::new(vec![disk(1)]),
            Set::new(vec![disk(2)]),
        ])]);
        assert_eq!(t1.generation, 1);
        assert_eq!(t1.set_count(), 2);
        // t0 untouched.
        assert_eq!(t0.set_count(), 1);
    }

    #[test]
    fn test_iter_sets_order() {
        let t = ClusterTopology::new(
            "dep-1",
            vec![
                Pool::new(vec![Set::new(vec![disk(1)]), Set::new(vec![disk(2)])]),
                Pool::new(vec![Set::new(vec![disk(3)])]),
            ],
        );
        let order: Vec<_> = t.iter_sets().map(|(p, s, _)| (p, s)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0)]);
    }
}
