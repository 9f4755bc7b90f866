//! Parallel chunk/metadata fan-out (§4.6): one `tokio::spawn`ed task per
//! shard, joined with `futures::future::join_all`. Writes fail if any shard
//! fails; reads tolerate up to `num_chunks - K` failures and return the
//! count of shards that actually succeeded.

use crate::diskops::DiskHandle;
use futures::future::join_all;
use std::sync::Arc;
use strata_common::{Error, Result};

/// One shard's placement bundled with the disk handle to reach it.
pub struct FanoutTarget {
    pub chunk_index: u32,
    pub disk: Arc<DiskHandle>,
}

/// Write `shards[i]` (by chunk index) to every target in parallel. Fails the
/// whole operation if any write fails (§4.6).
pub async fn parallel_write_chunks(
    object_path: &str,
    targets: &[FanoutTarget],
    shards: &[Vec<u8>],
) -> Result<()> {
    use crate::diskops::DiskOps;
    let object_path = object_path.to_string();
    let futures = targets.iter().map(|target| {
        let disk = Arc::clone(&target.disk);
        let object_path = object_path.clone();
        let index = target.chunk_index;
        let bytes = shards
            .get((index - 1) as usize)
            .cloned()
            .unwrap_or_default();
        tokio::spawn(async move { disk.write_chunk(&object_path, index, bytes).await })
    });
    let results = join_all(futures).await;
    for result in results {
        result.map_err(|e| Error::Io(std::io::Error::other(e)))??;
    }
    Ok(())
}

/// Read all shards in parallel, ignoring individual failures. Returns the
/// shards that succeeded, keyed by chunk index (1-based), in no particular
/// order — callers decide whether enough survived to reconstruct (§4.6,
/// §4.7).
pub async fn parallel_read_chunks(
    object_path: &str,
    targets: &[FanoutTarget],
) -> Vec<(u32, Result<Vec<u8>>)> {
    use crate::diskops::DiskOps;
    let object_path = object_path.to_string();
    let futures = targets.iter().map(|target| {
        let disk = Arc::clone(&target.disk);
        let object_path = object_path.clone();
        let index = target.chunk_index;
        tokio::spawn(async move {
            let result = disk.read_chunk(&object_path, index).await;
            (index, result)
        })
    });
    join_all(futures)
        .await
        .into_iter()
        .map(|joined| match joined {
            Ok(pair) => pair,
            Err(e) => (0, Err(Error::Io(std::io::Error::other(e)))),
        })
        .collect()
}

/// Delete all shards in parallel, best-effort: individual failures are
/// collected but do not stop other deletes (§4.7 delete is best-effort for
/// chunk removal).
pub async fn parallel_delete_chunks(object_path: &str, targets: &[FanoutTarget]) {
    use crate::diskops::DiskOps;
    let object_path = object_path.to_string();
    let futures = targets.iter().map(|target| {
        let disk = Arc::clone(&target.disk);
        let object_path = object_path.clone();
        let index = target.chunk_index;
        tokio::spawn(async move { disk.delete_chunk(&object_path, index).await })
    });
    let _ = join_all(futures).await;
}

/// Write one per-disk `xl.meta` copy (with `erasure.index` already set by
/// the caller) to every target in parallel.
pub async fn parallel_write_meta(
    object_path: &str,
    targets: &[(Arc<DiskHandle>, Vec<u8>)],
) -> Result<()> {
    use crate::diskops::DiskOps;
    let object_path = object_path.to_string();
    let futures = targets.iter().map(|(disk, bytes)| {
        let disk = Arc::clone(disk);
        let object_path = object_path.clone();
        let bytes = bytes.clone();
        tokio::spawn(async move { disk.write_xl_meta(&object_path, bytes).await })
    });
    let results = join_all(futures).await;
    for result in results {
        result.map_err(|e| Error::Io(std::io::Error::other(e)))??;
    }
    Ok(())
}

/// Read `xl.meta` from every disk in parallel, tolerating individual
/// failures (used by the quorum layer, §4.8).
pub async fn parallel_read_meta(
    object_path: &str,
    disks: &[Arc<DiskHandle>],
) -> Vec<Result<Vec<u8>>> {
    use crate::diskops::DiskOps;
    let object_path = object_path.to_string();
    let futures = disks.iter().map(|disk| {
        let disk = Arc::clone(disk);
        let object_path = object_path.clone();
        tokio::spawn(async move { disk.read_xl_meta(&object_path).await })
    });
    join_all(futures)
        .await
        .into_iter()
        .map(|joined| joined.unwrap_or_else(|e| Err(Error::Io(std::io::Error::other(e)))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::LocalDisk;
    use tempfile::tempdir;

    fn local_target(root: &std::path::Path, index: u32) -> FanoutTarget {
        FanoutTarget {
            chunk_index: index,
            disk: Arc::new(DiskHandle::Local(Arc::new(LocalDisk::new(root)))),
        }
    }

    #[tokio::test]
    async fn test_parallel_write_then_read_chunks() {
        let dir = tempdir().unwrap();
        let targets: Vec<_> = (1..=4).map(|i| local_target(dir.path(), i)).collect();
        let shards: Vec<Vec<u8>> = (1..=4).map(|i| vec![i as u8; 10]).collect();

        parallel_write_chunks("aa/abc", &targets, &shards)
            .await
            .unwrap();

        let results = parallel_read_chunks("aa/abc", &targets).await;
        assert_eq!(results.len(), 4);
        for (index, result) in results {
            let bytes = result.unwrap();
            assert_eq!(bytes, vec![index as u8; 10]);
        }
    }

    #[tokio::test]
    async fn test_parallel_read_tolerates_missing_shard() {
        let dir = tempdir().unwrap();
        let targets: Vec<_> = (1..=3).map(|i| local_target(dir.path(), i)).collect();
        let shards: Vec<Vec<u8>> = (1..=3).map(|i| vec![i as u8; 4]).collect();
        // Only write 2 of 3.
        parallel_write_chunks("aa/abc", &targets[..2], &shards[..2])
            .await
            .unwrap();

        let results = parallel_read_chunks("aa/abc", &targets).await;
        let ok_count = results.iter().filter(|(_, r)| r.is_ok()).count();
        assert_eq!(ok_count, 2);
    }
}
