//! `DiskOps` capability trait (§9 "Dynamic dispatch among local vs remote
//! disk ops"): one object-safe, `Send + Sync` trait with a local-filesystem
//! implementation and a remote-HTTP implementation (§4.4). Placement yields
//! this capability per shard; fan-out and the object pipeline hold
//! `Arc<dyn DiskOps>` without caring which concrete backend they got.

use async_trait::async_trait;
use std::sync::Arc;
use strata_common::Result;

use crate::disk::LocalDisk;
use crate::transport::RemoteDisk;

#[async_trait]
pub trait DiskOps: Send + Sync {
    async fn write_chunk(&self, object_path: &str, index: u32, bytes: Vec<u8>) -> Result<()>;
    async fn read_chunk(&self, object_path: &str, index: u32) -> Result<Vec<u8>>;
    async fn delete_chunk(&self, object_path: &str, index: u32) -> Result<()>;
    async fn write_xl_meta(&self, object_path: &str, bytes: Vec<u8>) -> Result<()>;
    async fn read_xl_meta(&self, object_path: &str) -> Result<Vec<u8>>;
    async fn delete_xl_meta(&self, object_path: &str) -> Result<()>;
}

#[async_trait]
impl DiskOps for LocalDisk {
    async fn write_chunk(&self, object_path: &str, index: u32, bytes: Vec<u8>) -> Result<()> {
        let object_path = object_path.to_string();
        tokio::task::block_in_place(|| self.write_chunk(&object_path, index, &bytes))
    }

    async fn read_chunk(&self, object_path: &str, index: u32) -> Result<Vec<u8>> {
        let object_path = object_path.to_string();
        tokio::task::block_in_place(|| self.read_chunk(&object_path, index))
    }

    async fn delete_chunk(&self, object_path: &str, index: u32) -> Result<()> {
        let object_path = object_path.to_string();
        tokio::task::block_in_place(|| self.delete_chunk(&object_path, index))
    }

    async fn write_xl_meta(&self, object_path: &str, bytes: Vec<u8>) -> Result<()> {
        let object_path = object_path.to_string();
        tokio::task::block_in_place(|| self.write_xl_meta(&object_path, &bytes))
    }

    async fn read_xl_meta(&self, object_path: &str) -> Result<Vec<u8>> {
        let object_path = object_path.to_string();
        tokio::task::block_in_place(|| self.read_xl_meta(&object_path))
    }

    async fn delete_xl_meta(&self, object_path: &str) -> Result<()> {
        let object_path = object_path.to_string();
        tokio::task::block_in_place(|| self.delete_xl_meta(&object_path))
    }
}

/// A disk reached either in-process (§4.3) or over the wire (§4.4), decided
/// once at construction time by comparing the target endpoint's
/// scheme+host+port against the node's own configured local endpoint.
#[derive(Clone)]
pub enum DiskHandle {
    Local(Arc<LocalDisk>),
    Remote(Arc<RemoteDisk>),
}

#[async_trait]
impl DiskOps for DiskHandle {
    async fn write_chunk(&self, object_path: &str, index: u32, bytes: Vec<u8>) -> Result<()> {
        match self {
            Self::Local(d) => d.write_chunk(object_path, index, bytes).await,
            Self::Remote(d) => d.write_chunk(object_path, index, bytes).await,
        }
    }

    async fn read_chunk(&self, object_path: &str, index: u32) -> Result<Vec<u8>> {
        match self {
            Self::Local(d) => d.read_chunk(object_path, index).await,
            Self::Remote(d) => d.read_chunk(object_path, index).await,
        }
    }

    async fn delete_chunk(&self, object_path: &str, index: u32) -> Result<()> {
        match self {
            Self::Local(d) => d.delete_chunk(object_path, index).await,
            Self::Remote(d) => d.delete_chunk(object_path, index).await,
        }
    }

    async fn write_xl_meta(&self, object_path: &str, bytes: Vec<u8>) -> Result<()> {
        match self {
            Self::Local(d) => d.write_xl_meta(object_path, bytes).await,
            Self::Remote(d) => d.write_xl_meta(object_path, bytes).await,
        }
    }

    async fn read_xl_meta(&self, object_path: &str) -> Result<Vec<u8>> {
        match self {
            Self::Local(d) => d.read_xl_meta(object_path).await,
            Self::Remote(d) => d.read_xl_meta(object_path).await,
        }
    }

    async fn delete_xl_meta(&self, object_path: &str) -> Result<()> {
        match self {
            Self::Local(d) => d.delete_xl_meta(object_path).await,
            Self::Remote(d) => d.delete_xl_meta(object_path).await,
        }
    }
}

/// Decide "is local?" by comparing `endpoint`'s scheme+host+port against
/// this node's configured endpoint (§4.4).
#[must_use]
pub fn is_local_endpoint(endpoint: &str, local_endpoint: &str) -> bool {
    endpoint == local_endpoint
}

/// Resolves a `(disk_endpoint, disk_path)` pair (as handed back by
/// `placement`, §4.5 — a node may own several disks sharing one endpoint)
/// to the concrete [`DiskHandle`] that reaches it. The object pipeline and
/// migration worker pool depend on this trait rather than on how disk
/// handles are actually constructed; `Runtime` (§4.14) owns the one
/// concrete registry built at startup.
pub trait DiskRegistry: Send + Sync {
    fn resolve(&self, disk_endpoint: &str, disk_path: &str) -> Arc<DiskHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_local_endpoint() {
        assert!(is_local_endpoint("10.0.0.1:9000", "10.0.0.1:9000"));
        assert!(!is_local_endpoint("10.0.0.2:9000", "10.0.0.1:9000"));
    }
}
