//! Migration worker pool (§4.12): a fixed number of OS threads draining the
//! task queue, each bridging into the async object pipeline via a borrowed
//! `tokio::runtime::Handle` (this crate owns no runtime of its own; the
//! embedding binary's runtime is threaded through instead, the same way
//! `strata-storage`'s disk layer expects a caller-supplied runtime rather
//! than spinning up its own).
//!
//! Per task: read the object under the old topology, write it under the
//! new one, update the external registry, then best-effort delete the old
//! copy. Steps 1-3 are fatal and retried with exponential backoff; step 4
//! is logged-but-ignored on failure (§4.12).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use strata_common::config::{ErasureSettings, MigrationConfig};
use strata_common::Error;
use strata_placement::ClusterTopology;
use strata_storage::{DiskRegistry, MetadataCache};
use tokio::runtime::Handle;

use crate::queue::TaskQueue;
use crate::registry::RegistryUpdater;
use crate::task::MigrationTask;
use crate::throttle::Throttle;

/// Everything a worker thread needs to migrate one task, shared read-only
/// across the whole pool.
pub struct WorkerContext {
    pub registry: Arc<dyn DiskRegistry>,
    pub cache: Arc<MetadataCache>,
    pub old_topology: Arc<ClusterTopology>,
    pub new_topology: Arc<ClusterTopology>,
    pub erasure: Arc<ErasureSettings>,
    pub registry_updater: Arc<dyn RegistryUpdater>,
    pub handle: Handle,
}

#[derive(Debug, Default)]
pub struct WorkerPoolStats {
    pub tasks_completed: AtomicU64,
    pub tasks_failed: AtomicU64,
    pub bytes_migrated: AtomicU64,
    pub active_workers: AtomicU64,
    /// Guards `start_time` only; the counters above are independently
    /// atomic (§5 "a dedicated stats lock guards only the fields that need
    /// joint consistency, not the whole counter set").
    start_time: Mutex<Option<Instant>>,
}

impl WorkerPoolStats {
    fn mark_started(&self) {
        let mut guard = self.start_time.lock();
        if guard.is_none() {
            *guard = Some(Instant::now());
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.lock().map(|t| t.elapsed())
    }

    #[must_use]
    pub fn snapshot(&self) -> WorkerPoolStatsSnapshot {
        WorkerPoolStatsSnapshot {
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            bytes_migrated: self.bytes_migrated.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WorkerPoolStatsSnapshot {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub bytes_migrated: u64,
    pub active_workers: u64,
    pub elapsed: Option<Duration>,
}

/// A fixed-size pool of worker threads draining a shared [`TaskQueue`].
pub struct WorkerPool {
    worker_count: usize,
    max_retries: u32,
    retry_backoff_initial_ms: u64,
    retry_backoff_ceiling_ms: u64,
    queue: Arc<TaskQueue>,
    context: Arc<WorkerContext>,
    throttle: Arc<Throttle>,
    stats: Arc<WorkerPoolStats>,
    paused: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(
        config: &MigrationConfig,
        queue: Arc<TaskQueue>,
        context: Arc<WorkerContext>,
        throttle: Arc<Throttle>,
    ) -> Self {
        Self {
            worker_count: config.worker_count,
            max_retries: config.max_retries,
            retry_backoff_initial_ms: config.retry_backoff_initial_ms,
            retry_backoff_ceiling_ms: config.retry_backoff_ceiling_ms,
            queue,
            context,
            throttle,
            stats: Arc::new(WorkerPoolStats::default()),
            paused: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> Arc<WorkerPoolStats> {
        Arc::clone(&self.stats)
    }

    /// Spawn `worker_count` threads against the shared queue. Safe to call
    /// again after [`WorkerPool::pause`] to resume against the same,
    /// still-populated queue (§4.12 "resume spawns a fresh pool of workers
    /// against the same queue").
    pub fn start(&self) {
        self.paused.store(false, Ordering::Release);
        self.stats.mark_started();
        let mut threads = self.threads.lock();
        assert!(threads.is_empty(), "start() called while workers are already running");
        for _ in 0..self.worker_count {
            threads.push(self.spawn_worker());
        }
    }

    /// Alias for [`WorkerPool::start`]: spawning fresh threads against an
    /// already-populated, unpaused queue is exactly how resume works.
    pub fn resume(&self) {
        self.start();
    }

    fn spawn_worker(&self) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let context = Arc::clone(&self.context);
        let throttle = Arc::clone(&self.throttle);
        let stats = Arc::clone(&self.stats);
        let paused = Arc::clone(&self.paused);
        let max_retries = self.max_retries;
        let backoff_initial_ms = self.retry_backoff_initial_ms;
        let backoff_ceiling_ms = self.retry_backoff_ceiling_ms;

        std::thread::spawn(move || {
            stats.active_workers.fetch_add(1, Ordering::Relaxed);
            while let Some(mut task) = queue.pop(&paused) {
                match migrate_with_retries(&context, &throttle, &mut task, max_retries, backoff_initial_ms, backoff_ceiling_ms) {
                    Ok(bytes) => {
                        stats.tasks_completed.fetch_add(1, Ordering::Relaxed);
                        stats.bytes_migrated.fetch_add(bytes, Ordering::Relaxed);
                    }
                    Err(error) => {
                        stats.tasks_failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            bucket = %task.bucket,
                            object = %task.object,
                            retries = task.retry_count,
                            %error,
                            "migration task failed permanently"
                        );
                    }
                }
            }
            stats.active_workers.fetch_sub(1, Ordering::Relaxed);
        })
    }

    /// Stop all worker threads without touching the queue: pending tasks
    /// remain queued for a later [`WorkerPool::resume`] (§4.12, §4.13
    /// `Migrating -> Paused`).
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        self.join_all();
    }

    /// Stop all worker threads and drop every pending task (§4.13
    /// `-> Stopped`/force-shutdown path).
    pub fn force_shutdown(&self) {
        self.paused.store(true, Ordering::Release);
        self.queue.force_clear();
        self.join_all();
    }

    fn join_all(&self) {
        let mut threads = self.threads.lock();
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.threads.lock().is_empty()
    }
}

/// Retry loop around one task's fatal steps (read/write/registry-update).
/// Returns the object's byte size on success, for stats/throttle bookkeeping.
fn migrate_with_retries(
    context: &WorkerContext,
    throttle: &Throttle,
    task: &mut MigrationTask,
    max_retries: u32,
    backoff_initial_ms: u64,
    backoff_ceiling_ms: u64,
) -> Result<u64, Error> {
    loop {
        match migrate_once(context, throttle, task) {
            Ok(bytes) => return Ok(bytes),
            Err(error) => {
                task.record_attempt();
                if !error.is_retryable() || task.retry_count >= max_retries {
                    return Err(error);
                }
                let backoff_ms = backoff_initial_ms
                    .saturating_mul(1u64 << task.retry_count.min(20))
                    .min(backoff_ceiling_ms);
                tracing::debug!(
                    bucket = %task.bucket,
                    object = %task.object,
                    attempt = task.retry_count,
                    backoff_ms,
                    %error,
                    "retrying migration task"
                );
                std::thread::sleep(Duration::from_millis(backoff_ms));
            }
        }
    }
}

fn migrate_once(context: &WorkerContext, throttle: &Throttle, task: &MigrationTask) -> Result<u64, Error> {
    context.handle.block_on(async {
        let (bytes, object_meta) = read_from_old(context, task).await?;
        throttle.wait(bytes.len() as u64);
        write_to_new(context, task, &bytes, object_meta).await?;
        context
            .registry_updater
            .update_registry(&task.bucket, &task.object, task.new_pool, task.new_set)?;
        delete_from_old(context, task).await;
        Ok(bytes.len() as u64)
    })
}

async fn read_from_old(
    context: &WorkerContext,
    task: &MigrationTask,
) -> Result<(Vec<u8>, strata_storage::ObjectMeta), Error> {
    let registry = context.registry.as_ref();
    if let Some(version_id) = &task.version_id {
        let meta = strata_storage::pipeline::head_object_version(
            registry,
            &context.cache,
            &context.old_topology,
            &context.erasure,
            &task.bucket,
            &task.object,
            version_id,
        )
        .await?;
        let bytes = strata_storage::pipeline::get_object_version(
            registry,
            &context.cache,
            &context.old_topology,
            &context.erasure,
            &task.bucket,
            &task.object,
            version_id,
        )
        .await?;
        Ok((bytes, meta.meta))
    } else {
        let meta = strata_storage::pipeline::head_object(
            registry,
            &context.cache,
            &context.old_topology,
            &context.erasure,
            &task.bucket,
            &task.object,
        )
        .await?;
        let bytes = strata_storage::pipeline::get_object(
            registry,
            &context.cache,
            &context.old_topology,
            &context.erasure,
            &task.bucket,
            &task.object,
        )
        .await?;
        Ok((bytes, meta.meta))
    }
}

async fn write_to_new(
    context: &WorkerContext,
    task: &MigrationTask,
    bytes: &[u8],
    object_meta: strata_storage::ObjectMeta,
) -> Result<(), Error> {
    let registry = context.registry.as_ref();
    if let Some(version_id) = &task.version_id {
        strata_storage::pipeline::put_object_version(
            registry,
            &context.cache,
            &context.new_topology,
            &context.erasure,
            &task.bucket,
            &task.object,
            version_id,
            bytes,
            object_meta,
        )
        .await?;
    } else {
        strata_storage::pipeline::put_object(
            registry,
            &context.cache,
            &context.new_topology,
            &context.erasure,
            &task.bucket,
            &task.object,
            bytes,
            object_meta,
        )
        .await?;
    }
    Ok(())
}

/// Best-effort: a failure here leaves a stale extra copy under the old
/// placement, which is wasted space, not a correctness problem, so it is
/// logged rather than propagated (§4.12 "step 4 is best-effort").
async fn delete_from_old(context: &WorkerContext, task: &MigrationTask) {
    let registry = context.registry.as_ref();
    let result = if let Some(version_id) = &task.version_id {
        strata_storage::pipeline::delete_object_version(
            registry,
            &context.cache,
            &context.old_topology,
            &context.erasure,
            &task.bucket,
            &task.object,
            version_id,
        )
        .await
    } else {
        strata_storage::pipeline::delete_object(
            registry,
            &context.cache,
            &context.old_topology,
            &context.erasure,
            &task.bucket,
            &task.object,
        )
        .await
    };
    if let Err(error) = result {
        tracing::warn!(bucket = %task.bucket, object = %task.object, %error, "failed to delete old copy after migration");
    }
}
