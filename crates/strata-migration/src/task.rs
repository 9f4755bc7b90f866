//! `MigrationTask` (§3 "Migration task", §4.10-§4.12): one object that the
//! scanner found living in a set the new topology no longer assigns it to.
//! Created by the scanner, owned by the queue, consumed by exactly one
//! worker. Every field but `retry_count`/`last_attempt` is immutable after
//! creation.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MigrationTask {
    pub bucket: String,
    pub object: String,
    pub version_id: Option<String>,
    pub old_pool: usize,
    pub old_set: usize,
    pub new_pool: usize,
    pub new_set: usize,
    pub size: u64,
    pub mod_time: String,
    pub retry_count: u32,
    pub last_attempt: Option<String>,
}

impl MigrationTask {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bucket: impl Into<String>,
        object: impl Into<String>,
        version_id: Option<String>,
        old_pool: usize,
        old_set: usize,
        new_pool: usize,
        new_set: usize,
        size: u64,
        mod_time: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
            version_id,
            old_pool,
            old_set,
            new_pool,
            new_set,
            size,
            mod_time: mod_time.into(),
            retry_count: 0,
            last_attempt: None,
        }
    }

    pub fn record_attempt(&mut self) {
        self.retry_count += 1;
        self.last_attempt = Some(strata_common::now_iso8601());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_has_zero_retries() {
        let task = MigrationTask::new("b", "k", None, 0, 0, 0, 1, 1024, "2026-07-27T00:00:00Z");
        assert_eq!(task.retry_count, 0);
        assert!(task.last_attempt.is_none());
    }

    #[test]
    fn test_record_attempt_increments_and_stamps() {
        let mut task = MigrationTask::new("b", "k", None, 0, 0, 0, 1, 1024, "2026-07-27T00:00:00Z");
        task.record_attempt();
        assert_eq!(task.retry_count, 1);
        assert!(task.last_attempt.is_some());
    }
}
