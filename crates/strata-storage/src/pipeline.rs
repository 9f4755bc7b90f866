//! Object pipeline (§4.7): put/get/head/delete and their versioned
//! counterparts, built on placement, fan-out, the quorum layer and the
//! metadata cache.
//!
//! Versioning note: the `.latest` pointer (§6 "a `.latest` symlink points at
//! the current version") is represented here as a small `xl.meta`-shaped
//! record at `{object_path}/versions/latest-ptr`, written through the same
//! atomic `write_xl_meta` primitive every other metadata write uses, rather
//! than a literal filesystem symlink — `DiskOps` has no symlink primitive,
//! and every version's files are already written (and individually
//! fsync+rename atomic) before the pointer is flipped last, which is the
//! safety property the resolved open question actually asks for.

use crate::cache::{cache_key, MetadataCache};
use crate::diskops::{DiskHandle, DiskRegistry};
use crate::fanout::{
    parallel_delete_chunks, parallel_read_chunks, parallel_write_chunks, parallel_write_meta,
    FanoutTarget,
};
use crate::quorum::{self, QuorumDisk};
use crate::xlmeta::{ChunkChecksum, ErasureMeta, ObjectMeta, Stat, Versioning, XlMeta, XL_META_FORMAT, XL_META_VERSION};
use std::sync::Arc;
use strata_common::config::ErasureSettings;
use strata_common::{blake2b_256, hex_encode, now_iso8601, object_path as derive_object_path, Error, Result};
use strata_erasure::ErasureCodec;
use strata_placement::{placement, ClusterTopology};

const LATEST_PTR_DIR: &str = "versions/latest-ptr";

fn version_dir(object_path: &str, version_id: &str) -> String {
    format!("{object_path}/versions/{version_id}")
}

fn latest_ptr_path(object_path: &str) -> String {
    format!("{object_path}/{LATEST_PTR_DIR}")
}

fn resolve_targets(
    registry: &dyn DiskRegistry,
    result: &strata_placement::PlacementResult,
) -> Vec<FanoutTarget> {
    result
        .shards
        .iter()
        .map(|s| FanoutTarget {
            chunk_index: s.chunk_index,
            disk: registry.resolve(&s.disk_endpoint, &s.disk_path),
        })
        .collect()
}

fn quorum_disks(
    registry: &dyn DiskRegistry,
    result: &strata_placement::PlacementResult,
) -> Vec<QuorumDisk> {
    result
        .shards
        .iter()
        .map(|s| QuorumDisk::online(registry.resolve(&s.disk_endpoint, &s.disk_path)))
        .collect()
}

struct EncodedObject {
    shards: Vec<Vec<u8>>,
    checksums: Vec<ChunkChecksum>,
    block_size: u32,
}

fn encode(erasure: &ErasureSettings, bytes: &[u8]) -> Result<EncodedObject> {
    let codec = ErasureCodec::new(erasure.config)?;
    let shards = codec.encode(bytes)?;
    let checksums = shards.iter().map(|s| ChunkChecksum::new(blake2b_256(s))).collect();
    let block_size = shards.first().map(|s| s.len() as u32).unwrap_or(0);
    Ok(EncodedObject {
        shards,
        checksums,
        block_size,
    })
}

async fn write_shards_and_meta(
    registry: &dyn DiskRegistry,
    topology: &ClusterTopology,
    bucket: &str,
    key: &str,
    disk_object_path: &str,
    encoded: &EncodedObject,
    mut meta: XlMeta,
    distribution: Option<&[u32]>,
) -> Result<XlMeta> {
    let num_chunks = encoded.shards.len();
    let result = placement(bucket, key, topology, num_chunks, distribution)?;
    let targets = resolve_targets(registry, &result);

    parallel_write_chunks(disk_object_path, &targets, &encoded.shards).await?;

    meta.erasure.distribution = result.distribution.clone();
    let per_disk_metas: Vec<Vec<u8>> = targets
        .iter()
        .map(|t| meta.for_disk_index(t.chunk_index).to_json())
        .collect::<Result<Vec<_>>>()?;
    let meta_targets: Vec<(Arc<DiskHandle>, Vec<u8>)> = targets
        .iter()
        .zip(per_disk_metas)
        .map(|(t, bytes)| (Arc::clone(&t.disk), bytes))
        .collect();
    parallel_write_meta(disk_object_path, &meta_targets).await?;

    Ok(meta)
}

#[allow(clippy::too_many_arguments)]
fn build_meta_shell(
    erasure: &ErasureSettings,
    bucket: &str,
    key: &str,
    size: u64,
    object_meta: ObjectMeta,
    versioning: Versioning,
    inline_data: Option<Vec<u8>>,
    num_chunks: usize,
    block_size: u32,
    checksums: Vec<ChunkChecksum>,
) -> XlMeta {
    XlMeta {
        version: XL_META_VERSION,
        format: XL_META_FORMAT.to_string(),
        bucket: bucket.to_string(),
        key: key.to_string(),
        stat: Stat {
            size,
            mod_time: now_iso8601(),
        },
        erasure: ErasureMeta {
            algorithm: "ReedSolomon".to_string(),
            data: erasure.config.data_shards as u32,
            parity: erasure.config.parity_shards as u32,
            block_size,
            index: 0,
            distribution: strata_placement::sequential_distribution(num_chunks),
            checksums,
        },
        meta: object_meta,
        versioning,
        inline_data,
    }
}

/// Put a non-versioned object (§4.7 "Put"). Inlines small payloads into
/// `xl.meta`; otherwise erasure-codes and fans out shards + metadata.
pub async fn put_object(
    registry: &dyn DiskRegistry,
    cache: &MetadataCache,
    topology: &ClusterTopology,
    erasure: &ErasureSettings,
    bucket: &str,
    key: &str,
    bytes: &[u8],
    mut object_meta: ObjectMeta,
) -> Result<XlMeta> {
    object_meta.etag = hex_encode(&blake2b_256(bytes));
    let object_path = derive_object_path(bucket, key);

    let meta = if (bytes.len() as u64) <= erasure.inline_threshold_bytes {
        let shell = build_meta_shell(
            erasure,
            bucket,
            key,
            bytes.len() as u64,
            object_meta,
            Versioning::default(),
            Some(bytes.to_vec()),
            1,
            0,
            vec![ChunkChecksum::new(blake2b_256(bytes))],
        );
        // A degenerate single-slot erasure shape: inline objects write no
        // shards, so `data=1, parity=0` keeps `validate()`'s invariants
        // (distribution/checksums length, index range) satisfied without
        // a real erasure group.
        let mut shell = shell;
        shell.erasure.data = 1;
        shell.erasure.parity = 0;
        shell.erasure.index = 1;
        let result = placement(bucket, key, topology, erasure.config.total_shards() as usize, None)?;
        let targets = resolve_targets(registry, &result);
        let meta_targets: Vec<(Arc<DiskHandle>, Vec<u8>)> = targets
            .iter()
            .map(|t| Ok((Arc::clone(&t.disk), shell.clone().to_json()?)))
            .collect::<Result<Vec<_>>>()?;
        parallel_write_meta(&object_path, &meta_targets).await?;
        shell
    } else {
        let encoded = encode(erasure, bytes)?;
        let shell = build_meta_shell(
            erasure,
            bucket,
            key,
            bytes.len() as u64,
            object_meta,
            Versioning::default(),
            None,
            encoded.shards.len(),
            encoded.block_size,
            encoded.checksums.clone(),
        );
        write_shards_and_meta(registry, topology, bucket, key, &object_path, &encoded, shell, None).await?
    };

    cache.invalidate(&cache_key(bucket, key, None));
    Ok(meta)
}

/// Head/stat a non-versioned object (§4.7 "Head/Stat"): cache preferred,
/// falling back to a quorum read across the owning set.
pub async fn head_object(
    registry: &dyn DiskRegistry,
    cache: &MetadataCache,
    topology: &ClusterTopology,
    erasure: &ErasureSettings,
    bucket: &str,
    key: &str,
) -> Result<XlMeta> {
    let ck = cache_key(bucket, key, None);
    if let Some(meta) = cache.get(&ck) {
        return Ok(meta);
    }
    let object_path = derive_object_path(bucket, key);
    let result = placement(bucket, key, topology, erasure.config.total_shards() as usize, None)?;
    let disks = quorum_disks(registry, &result);
    let meta = quorum::read_meta(&object_path, &disks).await?;
    cache.put(&ck, &meta);
    Ok(meta)
}

/// Get a non-versioned object (§4.7 "Get").
pub async fn get_object(
    registry: &dyn DiskRegistry,
    cache: &MetadataCache,
    topology: &ClusterTopology,
    erasure: &ErasureSettings,
    bucket: &str,
    key: &str,
) -> Result<Vec<u8>> {
    let meta = head_object(registry, cache, topology, erasure, bucket, key).await?;
    if let Some(data) = &meta.inline_data {
        return Ok(data.clone());
    }
    let object_path = derive_object_path(bucket, key);
    read_erasure_coded(registry, topology, bucket, key, &object_path, &meta).await
}

async fn read_erasure_coded(
    registry: &dyn DiskRegistry,
    topology: &ClusterTopology,
    bucket: &str,
    key: &str,
    disk_object_path: &str,
    meta: &XlMeta,
) -> Result<Vec<u8>> {
    let num_chunks = (meta.erasure.data + meta.erasure.parity) as usize;
    let k = meta.erasure.data as usize;
    let result = placement(
        bucket,
        key,
        topology,
        num_chunks,
        Some(&meta.erasure.distribution),
    )?;
    let targets = resolve_targets(registry, &result);
    let read_results = parallel_read_chunks(disk_object_path, &targets).await;

    let mut shards: Vec<Option<Vec<u8>>> = vec![None; num_chunks];
    for (index, outcome) in read_results {
        if index == 0 || (index as usize) > num_chunks {
            continue;
        }
        let Ok(bytes) = outcome else { continue };
        let Some(expected) = meta.erasure.checksums.get((index - 1) as usize) else {
            continue;
        };
        if blake2b_256(&bytes) == expected.hash {
            shards[(index - 1) as usize] = Some(bytes);
        }
    }

    let available = shards.iter().filter(|s| s.is_some()).count();
    if available < k {
        return Err(Error::InsufficientShards {
            available,
            required: k,
        });
    }

    let codec = ErasureCodec::new(strata_common::ErasureConfig::new(
        meta.erasure.data as u8,
        meta.erasure.parity as u8,
    ))?;
    codec.decode(&mut shards, meta.stat.size as usize)
}

/// Delete a non-versioned object (§4.7 "Delete"): parallel best-effort
/// shard + `xl.meta` removal across all `K+M` disks, then best-effort
/// directory cleanup.
pub async fn delete_object(
    registry: &dyn DiskRegistry,
    cache: &MetadataCache,
    topology: &ClusterTopology,
    erasure: &ErasureSettings,
    bucket: &str,
    key: &str,
) -> Result<()> {
    let object_path = derive_object_path(bucket, key);
    let result = placement(bucket, key, topology, erasure.config.total_shards() as usize, None)?;
    let targets = resolve_targets(registry, &result);

    parallel_delete_chunks(&object_path, &targets).await;
    for target in &targets {
        use crate::diskops::DiskOps;
        let _ = target.disk.delete_xl_meta(&object_path).await;
    }
    cache.invalidate(&cache_key(bucket, key, None));
    Ok(())
}

// ---------------------------------------------------------------------
// Versioned operations
// ---------------------------------------------------------------------

/// Put one version of an object (§4.7 "Versioned ops" + the resolved
/// versioned-put-atomicity open question).
pub async fn put_object_version(
    registry: &dyn DiskRegistry,
    cache: &MetadataCache,
    topology: &ClusterTopology,
    erasure: &ErasureSettings,
    bucket: &str,
    key: &str,
    version_id: &str,
    bytes: &[u8],
    mut object_meta: ObjectMeta,
) -> Result<XlMeta> {
    object_meta.etag = hex_encode(&blake2b_256(bytes));
    let object_path = derive_object_path(bucket, key);
    let disk_object_path = version_dir(&object_path, version_id);
    let versioning = Versioning {
        version_id: Some(version_id.to_string()),
        is_latest: true,
        is_delete_marker: false,
    };

    let meta = if (bytes.len() as u64) <= erasure.inline_threshold_bytes {
        let mut shell = build_meta_shell(
            erasure,
            bucket,
            key,
            bytes.len() as u64,
            object_meta,
            versioning,
            Some(bytes.to_vec()),
            1,
            0,
            vec![ChunkChecksum::new(blake2b_256(bytes))],
        );
        shell.erasure.data = 1;
        shell.erasure.parity = 0;
        shell.erasure.index = 1;
        let result = placement(bucket, key, topology, erasure.config.total_shards() as usize, None)?;
        let targets = resolve_targets(registry, &result);
        let meta_targets: Vec<(Arc<DiskHandle>, Vec<u8>)> = targets
            .iter()
            .map(|t| Ok((Arc::clone(&t.disk), shell.clone().to_json()?)))
            .collect::<Result<Vec<_>>>()?;
        parallel_write_meta(&disk_object_path, &meta_targets).await?;
        shell
    } else {
        let encoded = encode(erasure, bytes)?;
        let shell = build_meta_shell(
            erasure,
            bucket,
            key,
            bytes.len() as u64,
            object_meta,
            versioning,
            None,
            encoded.shards.len(),
            encoded.block_size,
            encoded.checksums.clone(),
        );
        write_shards_and_meta(
            registry,
            topology,
            bucket,
            key,
            &disk_object_path,
            &encoded,
            shell,
            None,
        )
        .await?
    };

    set_latest(registry, topology, erasure, bucket, key, version_id).await?;
    cache.invalidate(&cache_key(bucket, key, Some(version_id)));
    cache.invalidate(&cache_key(bucket, key, None));
    Ok(meta)
}

/// Atomically repoint the `.latest` pointer at `version_id`, last, after the
/// version's own files are already durably in place.
async fn set_latest(
    registry: &dyn DiskRegistry,
    topology: &ClusterTopology,
    erasure: &ErasureSettings,
    bucket: &str,
    key: &str,
    version_id: &str,
) -> Result<()> {
    let object_path = derive_object_path(bucket, key);
    let ptr_path = latest_ptr_path(&object_path);
    let pointer = build_meta_shell(
        erasure,
        bucket,
        key,
        0,
        ObjectMeta::default(),
        Versioning {
            version_id: Some(version_id.to_string()),
            is_latest: true,
            is_delete_marker: false,
        },
        None,
        1,
        0,
        vec![ChunkChecksum::new(blake2b_256(version_id.as_bytes()))],
    )
    .to_json()?;
    let result = placement(bucket, key, topology, erasure.config.total_shards() as usize, None)?;
    let targets = resolve_targets(registry, &result);
    let meta_targets: Vec<(Arc<DiskHandle>, Vec<u8>)> = targets
        .iter()
        .map(|t| (Arc::clone(&t.disk), pointer.clone()))
        .collect();
    parallel_write_meta(&ptr_path, &meta_targets).await
}

/// Resolve the current latest version id (§6 "`.latest` symlink").
pub async fn get_latest_version_id(
    registry: &dyn DiskRegistry,
    topology: &ClusterTopology,
    erasure: &ErasureSettings,
    bucket: &str,
    key: &str,
) -> Result<String> {
    let object_path = derive_object_path(bucket, key);
    let ptr_path = latest_ptr_path(&object_path);
    let result = placement(bucket, key, topology, erasure.config.total_shards() as usize, None)?;
    let disks = quorum_disks(registry, &result);
    let pointer = quorum::read_meta(&ptr_path, &disks).await?;
    pointer
        .versioning
        .version_id
        .ok_or_else(|| Error::invalid_meta("latest pointer missing version_id"))
}

/// Head/stat a specific version (§4.7 "Resolved open question:
/// `get_object_version`").
pub async fn head_object_version(
    registry: &dyn DiskRegistry,
    cache: &MetadataCache,
    topology: &ClusterTopology,
    erasure: &ErasureSettings,
    bucket: &str,
    key: &str,
    version_id: &str,
) -> Result<XlMeta> {
    let ck = cache_key(bucket, key, Some(version_id));
    if let Some(meta) = cache.get(&ck) {
        return Ok(meta);
    }
    let object_path = derive_object_path(bucket, key);
    let disk_object_path = version_dir(&object_path, version_id);
    let result = placement(bucket, key, topology, erasure.config.total_shards() as usize, None)?;
    let disks = quorum_disks(registry, &result);
    let meta = quorum::read_meta(&disk_object_path, &disks).await?;
    cache.put(&ck, &meta);
    Ok(meta)
}

/// Get a specific version's object bytes.
pub async fn get_object_version(
    registry: &dyn DiskRegistry,
    cache: &MetadataCache,
    topology: &ClusterTopology,
    erasure: &ErasureSettings,
    bucket: &str,
    key: &str,
    version_id: &str,
) -> Result<Vec<u8>> {
    let meta = head_object_version(registry, cache, topology, erasure, bucket, key, version_id).await?;
    if let Some(data) = &meta.inline_data {
        return Ok(data.clone());
    }
    let object_path = derive_object_path(bucket, key);
    let disk_object_path = version_dir(&object_path, version_id);
    read_erasure_coded(registry, topology, bucket, key, &disk_object_path, &meta).await
}

/// Soft delete (§4.7 "Versioned ops"): write a zero-byte delete-marker
/// version and repoint `.latest` to it.
pub async fn delete_object_soft(
    registry: &dyn DiskRegistry,
    cache: &MetadataCache,
    topology: &ClusterTopology,
    erasure: &ErasureSettings,
    bucket: &str,
    key: &str,
    version_id: &str,
) -> Result<XlMeta> {
    let object_path = derive_object_path(bucket, key);
    let disk_object_path = version_dir(&object_path, version_id);
    let num_chunks = erasure.config.total_shards() as usize;
    let shell = {
        let mut shell = build_meta_shell(
            erasure,
            bucket,
            key,
            0,
            ObjectMeta::default(),
            Versioning {
                version_id: Some(version_id.to_string()),
                is_latest: true,
                is_delete_marker: true,
            },
            None,
            num_chunks,
            0,
            (0..num_chunks)
                .map(|_| ChunkChecksum::new([0u8; 32]))
                .collect(),
        );
        shell.erasure.index = 1;
        shell
    };
    let result = placement(bucket, key, topology, num_chunks, None)?;
    let targets = resolve_targets(registry, &result);
    let meta_targets: Vec<(Arc<DiskHandle>, Vec<u8>)> = targets
        .iter()
        .map(|t| Ok((Arc::clone(&t.disk), shell.for_disk_index(t.chunk_index).to_json()?)))
        .collect::<Result<Vec<_>>>()?;
    parallel_write_meta(&disk_object_path, &meta_targets).await?;

    set_latest(registry, topology, erasure, bucket, key, version_id).await?;
    cache.invalidate(&cache_key(bucket, key, Some(version_id)));
    cache.invalidate(&cache_key(bucket, key, None));
    Ok(shell)
}

/// Hard delete: remove a specific version's directory entirely
/// (§4.7 "Hard delete removes a specific version directory").
pub async fn delete_object_version(
    registry: &dyn DiskRegistry,
    cache: &MetadataCache,
    topology: &ClusterTopology,
    erasure: &ErasureSettings,
    bucket: &str,
    key: &str,
    version_id: &str,
) -> Result<()> {
    let object_path = derive_object_path(bucket, key);
    let disk_object_path = version_dir(&object_path, version_id);
    let result = placement(bucket, key, topology, erasure.config.total_shards() as usize, None)?;
    let targets = resolve_targets(registry, &result);

    parallel_delete_chunks(&disk_object_path, &targets).await;
    for target in &targets {
        use crate::diskops::DiskOps;
        let _ = target.disk.delete_xl_meta(&disk_object_path).await;
    }
    cache.invalidate(&cache_key(bucket, key, Some(version_id)));
    Ok(())
}
