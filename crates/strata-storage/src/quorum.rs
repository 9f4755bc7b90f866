//! Quorum layer over a set (§4.8): majority read/write, validation, and
//! heal of `xl.meta` across the `N` disks of a set. `quorum = floor(N/2)+1`.
//! Disks marked offline are skipped but still count against `N`, so the
//! quorum threshold itself never shrinks (§4.8 failure model). The quorum
//! layer never retries disk I/O itself — that is the caller's (migration
//! worker's) job (§4.8, §7).

use crate::diskops::{DiskHandle, DiskOps};
use crate::xlmeta::XlMeta;
use std::sync::Arc;
use strata_common::{Error, Result};

#[must_use]
pub const fn quorum_for(n: usize) -> usize {
    n / 2 + 1
}

/// One disk in a set, with its administrative online/offline state.
pub struct QuorumDisk {
    pub disk: Arc<DiskHandle>,
    pub online: bool,
}

impl QuorumDisk {
    #[must_use]
    pub fn online(disk: Arc<DiskHandle>) -> Self {
        Self { disk, online: true }
    }

    #[must_use]
    pub fn offline(disk: Arc<DiskHandle>) -> Self {
        Self {
            disk,
            online: false,
        }
    }
}

/// Disks in a set whose `xl.meta` copies disagree on `(size, mod_time)`
/// with the reference, found by [`validate`].
pub struct Disagreement {
    pub disk_index: usize,
    pub reason: String,
}

fn agrees(reference: &XlMeta, candidate: &XlMeta) -> bool {
    reference.stat.size == candidate.stat.size && reference.stat.mod_time == candidate.stat.mod_time
}

/// `read_meta`: issue `read_meta` to every online disk; return the first
/// successful copy if at least `quorum` agree on `(size, mod_time)`.
pub async fn read_meta(object_path: &str, disks: &[QuorumDisk]) -> Result<XlMeta> {
    let n = disks.len();
    let quorum = quorum_for(n);

    let mut copies = Vec::with_capacity(n);
    let mut online = 0usize;
    let mut not_found = 0usize;
    for (idx, qd) in disks.iter().enumerate() {
        if !qd.online {
            continue;
        }
        online += 1;
        match qd.disk.read_xl_meta(object_path).await {
            Ok(bytes) => {
                if let Ok(meta) = XlMeta::from_json(&bytes) {
                    copies.push((idx, meta));
                }
            }
            Err(e) if e.is_not_found() => not_found += 1,
            Err(_) => {}
        }
    }

    if copies.is_empty() {
        if online > 0 && not_found == online {
            return Err(Error::not_found(format!("xl.meta at {object_path}")));
        }
        return Err(Error::QuorumFailed {
            succeeded: 0,
            required: quorum,
            total: n,
        });
    }

    let reference = &copies[0].1;
    let agreeing = copies.iter().filter(|(_, m)| agrees(reference, m)).count();
    if agreeing < quorum {
        return Err(Error::QuorumFailed {
            succeeded: agreeing,
            required: quorum,
            total: n,
        });
    }
    Ok(reference.clone())
}

/// `write_meta`: write `meta` (per-disk `erasure.index` already applied by
/// the caller) to every online disk; succeed if at least `quorum` accept.
pub async fn write_meta(
    object_path: &str,
    disks: &[QuorumDisk],
    per_disk_meta: &[Vec<u8>],
) -> Result<()> {
    let n = disks.len();
    let quorum = quorum_for(n);

    let mut succeeded = 0usize;
    for (qd, bytes) in disks.iter().zip(per_disk_meta.iter()) {
        if !qd.online {
            continue;
        }
        if qd.disk.write_xl_meta(object_path, bytes.clone()).await.is_ok() {
            succeeded += 1;
        }
    }

    if succeeded < quorum {
        return Err(Error::QuorumFailed {
            succeeded,
            required: quorum,
            total: n,
        });
    }
    Ok(())
}

/// `validate`: read `xl.meta` from every disk, compare each to the first
/// successful copy, and report which disks disagree.
pub async fn validate(object_path: &str, disks: &[QuorumDisk]) -> Result<Vec<Disagreement>> {
    let mut reference: Option<XlMeta> = None;
    let mut disagreements = Vec::new();

    for (idx, qd) in disks.iter().enumerate() {
        if !qd.online {
            continue;
        }
        match qd.disk.read_xl_meta(object_path).await {
            Ok(bytes) => match XlMeta::from_json(&bytes) {
                Ok(meta) => {
                    if let Some(reference) = &reference {
                        if !agrees(reference, &meta) {
                            disagreements.push(Disagreement {
                                disk_index: idx,
                                reason: "size/mod_time mismatch".to_string(),
                            });
                        }
                    } else {
                        reference = Some(meta);
                    }
                }
                Err(e) => disagreements.push(Disagreement {
                    disk_index: idx,
                    reason: e.to_string(),
                }),
            },
            Err(e) => disagreements.push(Disagreement {
                disk_index: idx,
                reason: e.to_string(),
            }),
        }
    }

    if reference.is_none() {
        return Err(Error::QuorumFailed {
            succeeded: 0,
            required: quorum_for(disks.len()),
            total: disks.len(),
        });
    }
    Ok(disagreements)
}

/// `heal`: read a reference copy under quorum, then overwrite every
/// disagreeing disk with it (with that disk's own `erasure.index` applied).
/// Returns the number of disks healed.
pub async fn heal(object_path: &str, disks: &[QuorumDisk]) -> Result<usize> {
    let reference = read_meta(object_path, disks).await?;
    let disagreements = validate(object_path, disks).await?;

    let mut healed = 0;
    for d in &disagreements {
        let qd = &disks[d.disk_index];
        if !qd.online {
            continue;
        }
        let index = u32::try_from(d.disk_index + 1).unwrap_or(1);
        let per_disk = reference.for_disk_index(index);
        if let Ok(bytes) = per_disk.to_json() {
            if qd.disk.write_xl_meta(object_path, bytes).await.is_ok() {
                healed += 1;
            }
        }
    }
    Ok(healed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::LocalDisk;
    use crate::xlmeta::{ChunkChecksum, ErasureMeta, ObjectMeta, Stat, Versioning, XL_META_FORMAT, XL_META_VERSION};
    use tempfile::tempdir;

    fn sample_meta(index: u32) -> XlMeta {
        XlMeta {
            version: XL_META_VERSION,
            format: XL_META_FORMAT.to_string(),
            bucket: "b".to_string(),
            key: "k".to_string(),
            stat: Stat {
                size: 100,
                mod_time: "2026-07-27T00:00:00Z".to_string(),
            },
            erasure: ErasureMeta {
                algorithm: "ReedSolomon".to_string(),
                data: 2,
                parity: 1,
                block_size: 65536,
                index,
                distribution: vec![1, 2, 3],
                checksums: vec![
                    ChunkChecksum::new([0u8; 32]),
                    ChunkChecksum::new([1u8; 32]),
                    ChunkChecksum::new([2u8; 32]),
                ],
            },
            meta: ObjectMeta {
                etag: "abc".to_string(),
                ..Default::default()
            },
            versioning: Versioning::default(),
            inline_data: None,
        }
    }

    fn make_disks(n: usize, dir: &tempfile::TempDir) -> Vec<QuorumDisk> {
        (0..n)
            .map(|i| {
                let root = dir.path().join(format!("disk{i}"));
                std::fs::create_dir_all(&root).unwrap();
                QuorumDisk::online(Arc::new(DiskHandle::Local(Arc::new(LocalDisk::new(root)))))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_write_then_read_quorum() {
        let dir = tempdir().unwrap();
        let disks = make_disks(4, &dir);
        let per_disk: Vec<Vec<u8>> = (1..=4)
            .map(|i| sample_meta(i).to_json().unwrap())
            .collect();
        write_meta("aa/obj", &disks, &per_disk).await.unwrap();
        let meta = read_meta("aa/obj", &disks).await.unwrap();
        assert_eq!(meta.stat.size, 100);
    }

    #[tokio::test]
    async fn test_write_quorum_with_one_offline_succeeds() {
        let dir = tempdir().unwrap();
        let mut disks = make_disks(4, &dir);
        disks[3].online = false;
        let per_disk: Vec<Vec<u8>> = (1..=4)
            .map(|i| sample_meta(i).to_json().unwrap())
            .collect();
        // Only 3 online disks get written; 3 >= quorum(4)=3.
        write_meta("aa/obj", &disks, &per_disk).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_quorum_with_two_offline_fails() {
        let dir = tempdir().unwrap();
        let mut disks = make_disks(4, &dir);
        disks[2].online = false;
        disks[3].online = false;
        let per_disk: Vec<Vec<u8>> = (1..=4)
            .map(|i| sample_meta(i).to_json().unwrap())
            .collect();
        let err = write_meta("aa/obj", &disks, &per_disk).await.unwrap_err();
        assert!(matches!(err, Error::QuorumFailed { .. }));
    }

    #[tokio::test]
    async fn test_heal_overwrites_disagreeing_disk() {
        let dir = tempdir().unwrap();
        let disks = make_disks(4, &dir);
        let per_disk: Vec<Vec<u8>> = (1..=4)
            .map(|i| sample_meta(i).to_json().unwrap())
            .collect();
        write_meta("aa/obj", &disks, &per_disk).await.unwrap();

        // Corrupt disk 1's copy with a different size.
        let mut bad = sample_meta(2);
        bad.stat.size = 999;
        disks[1]
            .disk
            .write_xl_meta("aa/obj", bad.to_json().unwrap())
            .await
            .unwrap();

        let disagreements = validate("aa/obj", &disks).await.unwrap();
        assert_eq!(disagreements.len(), 1);
        assert_eq!(disagreements[0].disk_index, 1);

        let healed = heal("aa/obj", &disks).await.unwrap();
        assert_eq!(healed, 1);

        let disagreements_after = validate("aa/obj", &disks).await.unwrap();
        assert!(disagreements_after.is_empty());
    }
}
