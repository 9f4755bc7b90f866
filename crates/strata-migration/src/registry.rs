//! `update_registry` seam (§4.12 step 3): the migration worker's third step,
//! between writing an object under its new placement and best-effort
//! deleting the old copy. The spec names this step but the system it talks
//! to — an external placement/location registry a gateway would consult —
//! is explicitly out of scope (§1 "the S3 HTTP front-end", §9 "global
//! process state" resolves to the one in-crate `Runtime` handle, not a
//! second service). This trait is the same kind of capability seam as
//! `DiskRegistry` (`strata-storage`): one call the worker makes, one
//! interface an embedding binary supplies a real implementation of.

use strata_common::Result;

pub trait RegistryUpdater: Send + Sync {
    /// Record that `(bucket, key)` now lives in `(new_pool, new_set)`.
    /// Fatal on failure (§4.12: steps 1-3 are fatal on failure, step 4
    /// is best-effort).
    fn update_registry(&self, bucket: &str, key: &str, new_pool: usize, new_set: usize) -> Result<()>;
}

/// A registry updater with nothing to tell: every call trivially succeeds.
/// The default for tests and for deployments where placement lookups are
/// always computed fresh from the topology rather than cached externally.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRegistry;

impl RegistryUpdater for NoopRegistry {
    fn update_registry(&self, _bucket: &str, _key: &str, _new_pool: usize, _new_set: usize) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_registry_always_succeeds() {
        let registry = NoopRegistry;
        assert!(registry.update_registry("b", "k", 1, 2).is_ok());
    }
}
