//! Local disk operations (§4.3): atomic `xl.meta` writes, chunk read/write,
//! checksum verification, all plain filesystem I/O under an already-mounted
//! directory tree — this spec treats raw block-device layout as out of
//! scope (no superblocks, no block addressing).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use strata_common::{blake2b_256, Error, Result};

/// Per-disk counters (§4.3, §2.1 "Metrics"): plain atomics so an exporter
/// can read them without taking a lock.
#[derive(Debug, Default)]
pub struct DiskStats {
    pub reads: AtomicU64,
    pub writes: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
    pub read_errors: AtomicU64,
    pub write_errors: AtomicU64,
    pub checksum_errors: AtomicU64,
}

impl DiskStats {
    #[must_use]
    pub fn snapshot(&self) -> DiskStatsSnapshot {
        DiskStatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            checksum_errors: self.checksum_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiskStatsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub read_errors: u64,
    pub write_errors: u64,
    pub checksum_errors: u64,
}

/// A local disk root: a directory on an already-mounted filesystem under
/// which object trees (`{bucket}/{prefix}/{hash}/{xl.meta,part.N}`, §6) live.
pub struct LocalDisk {
    root: PathBuf,
    stats: DiskStats,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stats: DiskStats::default(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn stats(&self) -> &DiskStats {
        &self.stats
    }

    fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn chunk_path(object_path: &Path, index: u32) -> PathBuf {
        object_path.join(format!("part.{index}"))
    }

    /// `write(path.tmp); fsync; rename(path.tmp, path)` (§4.3). Never leaves
    /// torn content visible to a concurrent reader of `path`.
    pub fn atomic_write(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        let path = self.absolute(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        let result = (|| -> Result<()> {
            let file = std::fs::File::create(&tmp_path)?;
            {
                use std::io::Write;
                let mut file = &file;
                file.write_all(bytes)?;
            }
            file.sync_all()?;
            std::fs::rename(&tmp_path, &path)?;
            Ok(())
        })();

        match &result {
            Ok(()) => {
                self.stats.writes.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_written
                    .fetch_add(bytes.len() as u64, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
                let _ = std::fs::remove_file(&tmp_path);
            }
        }
        result
    }

    pub fn write_xl_meta(&self, object_path: &str, bytes: &[u8]) -> Result<()> {
        let relative = format!("{object_path}/xl.meta");
        self.atomic_write(&relative, bytes)
    }

    pub fn read_xl_meta(&self, object_path: &str) -> Result<Vec<u8>> {
        let path = self.absolute(&format!("{object_path}/xl.meta"));
        match std::fs::read(&path) {
            Ok(bytes) => {
                self.stats.reads.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_read
                    .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(format!("xl.meta at {object_path}")))
            }
            Err(e) => {
                self.stats.read_errors.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    /// `write_chunk(disk, object_path, i, bytes)`: `{disk}/{object_path}/part.{i}` (§4.3).
    pub fn write_chunk(&self, object_path: &str, index: u32, bytes: &[u8]) -> Result<()> {
        let object_dir = self.absolute(object_path);
        std::fs::create_dir_all(&object_dir)?;
        let path = Self::chunk_path(&object_dir, index);
        let tmp_path = path.with_extension("tmp");
        let result = (|| -> Result<()> {
            std::fs::write(&tmp_path, bytes)?;
            std::fs::rename(&tmp_path, &path)?;
            Ok(())
        })();
        match &result {
            Ok(()) => {
                self.stats.writes.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_written
                    .fetch_add(bytes.len() as u64, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
                let _ = std::fs::remove_file(&tmp_path);
            }
        }
        result
    }

    pub fn read_chunk(&self, object_path: &str, index: u32) -> Result<Vec<u8>> {
        let path = Self::chunk_path(&self.absolute(object_path), index);
        match std::fs::read(&path) {
            Ok(bytes) => {
                self.stats.reads.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_read
                    .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(format!("chunk {index} at {object_path}")))
            }
            Err(e) => {
                self.stats.read_errors.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    pub fn delete_chunk(&self, object_path: &str, index: u32) -> Result<()> {
        let path = Self::chunk_path(&self.absolute(object_path), index);
        match std::fs::remove_file(&path) {
            Ok(()) | Err(_) if !path.exists() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn delete_xl_meta(&self, object_path: &str) -> Result<()> {
        let path = self.absolute(&format!("{object_path}/xl.meta"));
        match std::fs::remove_file(&path) {
            Ok(()) | Err(_) if !path.exists() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal of the now-empty object directory (§4.7 delete).
    pub fn remove_object_dir_best_effort(&self, object_path: &str) {
        let _ = std::fs::remove_dir(self.absolute(object_path));
    }

    /// Recompute BLAKE2b-256 of `bytes` and compare to `checksum` (§4.3).
    pub fn verify_chunk(&self, bytes: &[u8], checksum: &[u8; 32]) -> bool {
        let ok = &blake2b_256(bytes) == checksum;
        if !ok {
            self.stats.checksum_errors.fetch_add(1, Ordering::Relaxed);
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_then_read_xl_meta() {
        let dir = tempdir().unwrap();
        let disk = LocalDisk::new(dir.path());
        disk.write_xl_meta("aa/abc123", b"{\"a\":1}").unwrap();
        let bytes = disk.read_xl_meta("aa/abc123").unwrap();
        assert_eq!(bytes, b"{\"a\":1}");
        assert!(!dir.path().join("aa/abc123/xl.meta.tmp").exists());
    }

    #[test]
    fn test_read_missing_xl_meta_is_not_found() {
        let dir = tempdir().unwrap();
        let disk = LocalDisk::new(dir.path());
        let err = disk.read_xl_meta("aa/missing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_chunk_roundtrip() {
        let dir = tempdir().unwrap();
        let disk = LocalDisk::new(dir.path());
        disk.write_chunk("aa/abc123", 1, b"shard-bytes").unwrap();
        let bytes = disk.read_chunk("aa/abc123", 1).unwrap();
        assert_eq!(bytes, b"shard-bytes");
    }

    #[test]
    fn test_verify_chunk() {
        let dir = tempdir().unwrap();
        let disk = LocalDisk::new(dir.path());
        let data = b"verify me";
        let good = blake2b_256(data);
        assert!(disk.verify_chunk(data, &good));
        assert!(!disk.verify_chunk(b"tampered", &good));
    }

    #[test]
    fn test_delete_chunk_and_meta() {
        let dir = tempdir().unwrap();
        let disk = LocalDisk::new(dir.path());
        disk.write_chunk("aa/abc123", 1, b"x").unwrap();
        disk.write_xl_meta("aa/abc123", b"{}").unwrap();
        disk.delete_chunk("aa/abc123", 1).unwrap();
        disk.delete_xl_meta("aa/abc123").unwrap();
        disk.remove_object_dir_best_effort("aa/abc123");
        assert!(!dir.path().join("aa/abc123").exists());
    }

    #[test]
    fn test_stats_track_writes_and_reads() {
        let dir = tempdir().unwrap();
        let disk = LocalDisk::new(dir.path());
        disk.write_chunk("aa/abc123", 1, b"12345").unwrap();
        let _ = disk.read_chunk("aa/abc123", 1).unwrap();
        let snap = disk.stats().snapshot();
        assert_eq!(snap.writes, 1);
        assert_eq!(snap.reads, 1);
        assert_eq!(snap.bytes_written, 5);
        assert_eq!(snap.bytes_read, 5);
    }
}
