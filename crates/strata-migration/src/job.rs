//! Migration orchestrator (§4.13): a small state machine driving a
//! migration from `Idle` through `Scanning`/`Migrating` to a terminal
//! `Completed`/`Failed`, with checkpoint/resume across restarts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strata_common::config::MigrationConfig;
use strata_common::{now_iso8601, Error, Result};
use strata_placement::ClusterTopology;

use crate::queue::TaskQueue;
use crate::scanner;
use crate::worker::{WorkerContext, WorkerPool};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MigrationState {
    Idle = 0,
    Scanning = 1,
    Migrating = 2,
    Paused = 3,
    Completed = 4,
    Failed = 5,
}

impl MigrationState {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Scanning),
            2 => Some(Self::Migrating),
            3 => Some(Self::Paused),
            4 => Some(Self::Completed),
            5 => Some(Self::Failed),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Scanning)
                | (Self::Scanning, Self::Migrating)
                | (Self::Scanning, Self::Completed)
                | (Self::Scanning, Self::Failed)
                | (Self::Migrating, Self::Paused)
                | (Self::Paused, Self::Migrating)
                | (Self::Migrating, Self::Completed)
                | (Self::Migrating, Self::Failed)
                | (Self::Paused, Self::Failed)
        )
    }
}

/// Progress counters updated as the job runs, read by `wait`'s caller for
/// progress/ETA reporting.
#[derive(Debug, Default)]
pub struct JobCounters {
    pub total_objects: AtomicU64,
    pub migrated_objects: AtomicU64,
    pub failed_objects: AtomicU64,
    pub bytes_total: AtomicU64,
    pub bytes_migrated: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JobProgress {
    pub total_objects: u64,
    pub migrated_objects: u64,
    pub failed_objects: u64,
    pub bytes_total: u64,
    pub bytes_migrated: u64,
    pub eta: Option<Duration>,
}

/// On-disk checkpoint shape (§6 "Checkpoint file"). Topologies and disk
/// paths are deliberately absent: the caller supplies them fresh on resume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointData {
    pub job_id: String,
    pub source_generation: u64,
    pub target_generation: u64,
    pub state: u8,
    pub checkpoint_time: String,
    pub start_time: String,
    pub total_objects: u64,
    pub migrated_objects: u64,
    pub failed_objects: u64,
    pub bytes_total: u64,
    pub bytes_migrated: u64,
}

/// One topology-change migration run. Identity is `migration-gen-{src}-to-{dst}`.
pub struct MigrationJob {
    job_id: String,
    old_topology: Arc<ClusterTopology>,
    new_topology: Arc<ClusterTopology>,
    disk_roots: Vec<std::path::PathBuf>,
    config: MigrationConfig,
    state: RwLock<MigrationState>,
    counters: JobCounters,
    start_time_wall: RwLock<Option<String>>,
    start_time_monotonic: RwLock<Option<Instant>>,
    checkpoint_path: Option<std::path::PathBuf>,
    last_checkpoint_objects: AtomicU64,
    last_checkpoint_time: RwLock<Option<Instant>>,
    pool: RwLock<Option<(Arc<TaskQueue>, Arc<WorkerPool>)>>,
}

impl MigrationJob {
    #[must_use]
    pub fn new(
        old_topology: Arc<ClusterTopology>,
        new_topology: Arc<ClusterTopology>,
        disk_roots: Vec<std::path::PathBuf>,
        config: MigrationConfig,
        checkpoint_path: Option<std::path::PathBuf>,
    ) -> Self {
        let job_id = format!(
            "migration-gen-{}-to-{}",
            old_topology.generation, new_topology.generation
        );
        Self {
            job_id,
            old_topology,
            new_topology,
            disk_roots,
            config,
            state: RwLock::new(MigrationState::Idle),
            counters: JobCounters::default(),
            start_time_wall: RwLock::new(None),
            start_time_monotonic: RwLock::new(None),
            checkpoint_path,
            last_checkpoint_objects: AtomicU64::new(0),
            last_checkpoint_time: RwLock::new(None),
            pool: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    #[must_use]
    pub fn state(&self) -> MigrationState {
        *self.state.read()
    }

    fn transition(&self, next: MigrationState) -> Result<()> {
        let mut state = self.state.write();
        if !state.can_transition_to(next) {
            return Err(Error::InvalidState {
                from: format!("{state:?}"),
                to: format!("{next:?}"),
            });
        }
        *state = next;
        Ok(())
    }

    #[must_use]
    pub fn progress(&self) -> JobProgress {
        let bytes_total = self.counters.bytes_total.load(Ordering::Relaxed);
        let bytes_migrated = self.counters.bytes_migrated.load(Ordering::Relaxed);
        let eta = self.start_time_monotonic.read().and_then(|started| {
            let elapsed = started.elapsed().as_secs_f64();
            if elapsed <= 0.0 || bytes_migrated == 0 {
                return None;
            }
            let throughput = bytes_migrated as f64 / elapsed;
            if throughput <= 0.0 {
                return None;
            }
            let remaining = bytes_total.saturating_sub(bytes_migrated) as f64;
            Some(Duration::from_secs_f64(remaining / throughput))
        });
        JobProgress {
            total_objects: self.counters.total_objects.load(Ordering::Relaxed),
            migrated_objects: self.counters.migrated_objects.load(Ordering::Relaxed),
            failed_objects: self.counters.failed_objects.load(Ordering::Relaxed),
            bytes_total,
            bytes_migrated,
            eta,
        }
    }

    /// `Idle -> Scanning`, run the scanner; zero tasks short-circuits
    /// straight to `Completed`, otherwise `Scanning -> Migrating` and the
    /// worker pool is spun up with every task submitted (§4.13 `start`).
    pub fn start(&self, context: Arc<WorkerContext>) -> Result<()> {
        self.transition(MigrationState::Scanning)?;
        *self.start_time_wall.write() = Some(now_iso8601());
        *self.start_time_monotonic.write() = Some(Instant::now());

        let (tasks, _stats) = scanner::scan(&self.disk_roots, &self.old_topology, &self.new_topology);
        self.counters.total_objects.store(tasks.len() as u64, Ordering::Relaxed);
        self.counters
            .bytes_total
            .store(tasks.iter().map(|t| t.size).sum(), Ordering::Relaxed);

        if tasks.is_empty() {
            self.transition(MigrationState::Completed)?;
            self.save_checkpoint()?;
            return Ok(());
        }

        self.transition(MigrationState::Migrating)?;

        let queue = Arc::new(TaskQueue::new(self.config.queue_capacity));
        let throttle = Arc::new(crate::throttle::Throttle::new(
            self.config.throttle_rate_bytes_per_sec.unwrap_or(0),
            self.config.throttle_burst_bytes,
        ));
        let worker_pool = Arc::new(WorkerPool::new(&self.config, Arc::clone(&queue), context, throttle));
        worker_pool.start();

        for task in tasks {
            if !queue.push(task) {
                break;
            }
        }
        queue.close();

        *self.pool.write() = Some((queue, worker_pool));
        Ok(())
    }

    /// `Migrating -> Paused`: stop the worker pool, leave the queue's
    /// remaining tasks in place (§4.13 `pause`).
    pub fn pause(&self) -> Result<()> {
        self.transition(MigrationState::Paused)?;
        if let Some((_, pool)) = self.pool.read().as_ref() {
            pool.pause();
        }
        Ok(())
    }

    /// `Paused -> Migrating`: spin up a fresh worker pool against the same,
    /// still-populated queue (§4.13 `resume`).
    pub fn resume(&self) -> Result<()> {
        self.transition(MigrationState::Migrating)?;
        if let Some((_, pool)) = self.pool.read().as_ref() {
            pool.resume();
        }
        Ok(())
    }

    /// Terminal-safe: force `Failed` unless already terminal, dropping any
    /// pending tasks (§4.13 `stop`).
    pub fn stop(&self) {
        if self.state().is_terminal() {
            return;
        }
        if let Some((_, pool)) = self.pool.read().as_ref() {
            pool.force_shutdown();
        }
        let mut state = self.state.write();
        if !state.is_terminal() {
            *state = MigrationState::Failed;
        }
    }

    /// Poll every 100ms while `Migrating`: pull stats from the pool, update
    /// progress, checkpoint as needed, and transition to `Completed` once
    /// the queue has drained and no worker is active (§4.13 `wait`).
    pub fn wait(&self) -> Result<()> {
        loop {
            let state = self.state();
            if state.is_terminal() {
                return Ok(());
            }
            if state != MigrationState::Migrating {
                std::thread::sleep(WAIT_POLL_INTERVAL);
                continue;
            }

            let Some((queue, pool)) = self.pool.read().clone() else {
                std::thread::sleep(WAIT_POLL_INTERVAL);
                continue;
            };
            let stats = pool.stats().snapshot();
            self.counters.migrated_objects.store(stats.tasks_completed, Ordering::Relaxed);
            self.counters.failed_objects.store(stats.tasks_failed, Ordering::Relaxed);
            self.counters.bytes_migrated.store(stats.bytes_migrated, Ordering::Relaxed);

            self.save_checkpoint_if_needed()?;

            if queue.is_empty() && stats.active_workers == 0 {
                self.transition(MigrationState::Completed)?;
                self.save_checkpoint()?;
                return Ok(());
            }

            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    fn to_checkpoint(&self) -> CheckpointData {
        CheckpointData {
            job_id: self.job_id.clone(),
            source_generation: self.old_topology.generation,
            target_generation: self.new_topology.generation,
            state: self.state().as_u8(),
            checkpoint_time: now_iso8601(),
            start_time: self.start_time_wall.read().clone().unwrap_or_default(),
            total_objects: self.counters.total_objects.load(Ordering::Relaxed),
            migrated_objects: self.counters.migrated_objects.load(Ordering::Relaxed),
            failed_objects: self.counters.failed_objects.load(Ordering::Relaxed),
            bytes_total: self.counters.bytes_total.load(Ordering::Relaxed),
            bytes_migrated: self.counters.bytes_migrated.load(Ordering::Relaxed),
        }
    }

    /// Serialize and atomically write the checkpoint, if a path was given.
    pub fn save_checkpoint(&self) -> Result<()> {
        let Some(path) = &self.checkpoint_path else {
            return Ok(());
        };
        let checkpoint = self.to_checkpoint();
        let json = serde_json::to_vec_pretty(&checkpoint)
            .map_err(|e| Error::InvalidMeta(format!("failed to serialize checkpoint: {e}")))?;
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, path)?;
        self.last_checkpoint_objects
            .store(self.counters.migrated_objects.load(Ordering::Relaxed), Ordering::Relaxed);
        *self.last_checkpoint_time.write() = Some(Instant::now());
        Ok(())
    }

    /// Checkpoint every `checkpoint_every_objects` migrated objects OR every
    /// `checkpoint_every_secs`, whichever comes first (§4.13).
    fn save_checkpoint_if_needed(&self) -> Result<()> {
        let migrated = self.counters.migrated_objects.load(Ordering::Relaxed);
        let last_objects = self.last_checkpoint_objects.load(Ordering::Relaxed);
        let objects_due = migrated.saturating_sub(last_objects) >= self.config.checkpoint_every_objects;
        let time_due = self
            .last_checkpoint_time
            .read()
            .map_or(true, |t| t.elapsed() >= Duration::from_secs(self.config.checkpoint_every_secs));
        if objects_due || time_due {
            self.save_checkpoint()?;
        }
        Ok(())
    }

    /// Reconstruct a job from a checkpoint file plus freshly supplied
    /// topology/disk references. A loaded `Migrating` state is coerced to
    /// `Paused`; the caller must call `resume` explicitly to continue
    /// (§4.13, §6).
    pub fn resume_from_checkpoint(
        path: &std::path::Path,
        old_topology: Arc<ClusterTopology>,
        new_topology: Arc<ClusterTopology>,
        disk_roots: Vec<std::path::PathBuf>,
        config: MigrationConfig,
    ) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let checkpoint: CheckpointData = serde_json::from_slice(&bytes)
            .map_err(|e| Error::InvalidMeta(format!("failed to parse checkpoint: {e}")))?;

        let loaded_state = MigrationState::from_u8(checkpoint.state)
            .ok_or_else(|| Error::InvalidMeta(format!("unknown checkpoint state {}", checkpoint.state)))?;
        let resumed_state = if loaded_state == MigrationState::Migrating {
            MigrationState::Paused
        } else {
            loaded_state
        };

        let job = Self {
            job_id: checkpoint.job_id,
            old_topology,
            new_topology,
            disk_roots,
            config,
            state: RwLock::new(resumed_state),
            counters: JobCounters {
                total_objects: AtomicU64::new(checkpoint.total_objects),
                migrated_objects: AtomicU64::new(checkpoint.migrated_objects),
                failed_objects: AtomicU64::new(checkpoint.failed_objects),
                bytes_total: AtomicU64::new(checkpoint.bytes_total),
                bytes_migrated: AtomicU64::new(checkpoint.bytes_migrated),
            },
            start_time_wall: RwLock::new(Some(checkpoint.start_time)),
            start_time_monotonic: RwLock::new(None),
            checkpoint_path: Some(path.to_path_buf()),
            last_checkpoint_objects: AtomicU64::new(checkpoint.migrated_objects),
            last_checkpoint_time: RwLock::new(None),
            pool: RwLock::new(None),
        };
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_placement::{DiskRef, Pool, Set};
    use tempfile::tempdir;

    fn topology(generation_seed: u64) -> ClusterTopology {
        let disks = vec![
            DiskRef::new("127.0.0.1:9000/d1", "u1", 1),
            DiskRef::new("127.0.0.1:9000/d2", "u2", 1),
            DiskRef::new("127.0.0.1:9000/d3", "u3", 1),
        ];
        let topo = ClusterTopology::new("dep", vec![Pool::new(vec![Set::new(disks)])]);
        // `with_pools` bumps generation by one each call; fold `generation_seed`
        // extra bumps in so distinct test topologies get distinct generations.
        (0..generation_seed).fold(topo, |t, _| {
            let pools = t.iter_sets().map(|(_, _, s)| s.clone()).collect::<Vec<_>>();
            t.with_pools(vec![Pool::new(pools)])
        })
    }

    #[test]
    fn test_state_transition_table() {
        assert!(MigrationState::Idle.can_transition_to(MigrationState::Scanning));
        assert!(!MigrationState::Idle.can_transition_to(MigrationState::Migrating));
        assert!(MigrationState::Migrating.can_transition_to(MigrationState::Paused));
        assert!(MigrationState::Paused.can_transition_to(MigrationState::Migrating));
        assert!(MigrationState::Paused.can_transition_to(MigrationState::Failed));
        assert!(!MigrationState::Completed.can_transition_to(MigrationState::Migrating));
        assert!(!MigrationState::Failed.can_transition_to(MigrationState::Idle));
    }

    #[test]
    fn test_is_terminal() {
        assert!(MigrationState::Completed.is_terminal());
        assert!(MigrationState::Failed.is_terminal());
        assert!(!MigrationState::Migrating.is_terminal());
    }

    #[test]
    fn test_job_id_format() {
        let old = Arc::new(topology(0));
        let new = Arc::new(topology(1));
        let job = MigrationJob::new(Arc::clone(&old), Arc::clone(&new), vec![], MigrationConfig::default(), None);
        assert_eq!(job.job_id(), format!("migration-gen-{}-to-{}", old.generation, new.generation));
    }

    #[test]
    fn test_start_with_no_disk_roots_completes_immediately() {
        let old = Arc::new(topology(0));
        let new = Arc::new(topology(1));
        let job = MigrationJob::new(old, new, vec![], MigrationConfig::default(), None);

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let cache = Arc::new(strata_storage::MetadataCache::new(16, 60));
        struct EmptyRegistry;
        impl strata_storage::DiskRegistry for EmptyRegistry {
            fn resolve(&self, _e: &str, _p: &str) -> Arc<strata_storage::DiskHandle> {
                unreachable!("no disk roots, so no disk should ever be resolved")
            }
        }
        let context = Arc::new(WorkerContext {
            registry: Arc::new(EmptyRegistry),
            cache,
            old_topology: Arc::new(topology(0)),
            new_topology: Arc::new(topology(1)),
            erasure: Arc::new(strata_common::config::ErasureSettings::default()),
            registry_updater: Arc::new(crate::registry::NoopRegistry),
            handle: runtime.handle().clone(),
        });

        job.start(context).unwrap();
        assert_eq!(job.state(), MigrationState::Completed);
        assert_eq!(job.progress().total_objects, 0);
    }

    #[test]
    fn test_checkpoint_round_trip_coerces_migrating_to_paused() {
        let dir = tempdir().unwrap();
        let checkpoint_path = dir.path().join("checkpoint.json");
        let old = Arc::new(topology(0));
        let new = Arc::new(topology(1));
        let job = MigrationJob::new(
            Arc::clone(&old),
            Arc::clone(&new),
            vec![],
            MigrationConfig::default(),
            Some(checkpoint_path.clone()),
        );

        job.counters.total_objects.store(1000, Ordering::Relaxed);
        job.counters.migrated_objects.store(500, Ordering::Relaxed);
        *job.state.write() = MigrationState::Migrating;
        job.save_checkpoint().unwrap();

        let resumed = MigrationJob::resume_from_checkpoint(
            &checkpoint_path,
            Arc::clone(&old),
            Arc::clone(&new),
            vec![],
            MigrationConfig::default(),
        )
        .unwrap();

        assert_eq!(resumed.progress().total_objects, 1000);
        assert_eq!(resumed.progress().migrated_objects, 500);
        assert_eq!(resumed.state(), MigrationState::Paused);
    }
}
