//! Bounded FIFO migration-task queue (§4.12): a `VecDeque` guarded by a
//! `std::sync::Mutex` with `not_empty`/`not_full` condvars. Written against
//! `std::sync::{Mutex, Condvar}` rather than `parking_lot` deliberately, to
//! keep this blocking-condvar code obviously separate from the async
//! fan-out code elsewhere in the workspace (§5).
//!
//! Producers (the orchestrator, submitting a scan's worth of tasks)
//! block on `not_full`; consumers (workers) block on `not_empty`.
//! [`TaskQueue::close`] marks that no more tasks will ever be pushed — a
//! consumer popping from a closed, now-empty queue gets `None` and exits,
//! but a closed, non-empty queue still drains normally (§4.12 "shutdown
//! broadcasts both condvars; consumers still drain the queue until empty
//! then exit").

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::task::MigrationTask;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct Inner {
    items: VecDeque<MigrationTask>,
    closed: bool,
}

pub struct TaskQueue {
    capacity: usize,
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl TaskQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Push a task, blocking while the queue is at capacity. Returns
    /// `false` (task dropped) if the queue was closed before space freed
    /// up — a producer should never see this in the orchestrator's normal
    /// "submit everything, then close" flow, but `force_stop` can race it.
    pub fn push(&self, task: MigrationTask) -> bool {
        let mut guard = self.inner.lock().expect("queue mutex poisoned");
        loop {
            if guard.closed {
                return false;
            }
            if guard.items.len() < self.capacity {
                guard.items.push_back(task);
                drop(guard);
                self.not_empty.notify_one();
                return true;
            }
            guard = self.not_full.wait(guard).expect("queue mutex poisoned");
        }
    }

    /// Mark the queue closed for further pushes: existing items still
    /// drain via `pop`, but `pop` on an empty, closed queue returns `None`
    /// instead of blocking forever.
    pub fn close(&self) {
        let mut guard = self.inner.lock().expect("queue mutex poisoned");
        guard.closed = true;
        drop(guard);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Drop all queued-but-not-yet-popped items and close the queue
    /// immediately, for `stop`'s "pending tasks are dropped" (§5
    /// "Cancellation and timeouts").
    pub fn force_clear(&self) {
        let mut guard = self.inner.lock().expect("queue mutex poisoned");
        guard.items.clear();
        guard.closed = true;
        drop(guard);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Pop the next task, FIFO. Returns `None` when the queue is closed
    /// and empty, or as soon as `paused` is observed `true` — in the
    /// paused case no task is lost, since nothing was popped.
    ///
    /// The wait loop polls in bounded increments rather than waiting
    /// indefinitely on `not_empty` alone, because a `pause()` call flips
    /// `paused` and notifies `not_empty` from another thread; polling is
    /// the simplest way to guarantee this thread notices even if a spurious
    /// missed-wakeup ordering occurred.
    pub fn pop(&self, paused: &AtomicBool) -> Option<MigrationTask> {
        let mut guard = self.inner.lock().expect("queue mutex poisoned");
        loop {
            if paused.load(Ordering::Acquire) {
                return None;
            }
            if let Some(task) = guard.items.pop_front() {
                drop(guard);
                self.not_full.notify_one();
                return Some(task);
            }
            if guard.closed {
                return None;
            }
            let (g, _timeout) = self
                .not_empty
                .wait_timeout(guard, POLL_INTERVAL)
                .expect("queue mutex poisoned");
            guard = g;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(size: u64) -> MigrationTask {
        MigrationTask::new("b", format!("k-{size}"), None, 0, 0, 0, 1, size, "2026-07-27T00:00:00Z")
    }

    #[test]
    fn test_fifo_order() {
        let queue = TaskQueue::new(10);
        queue.push(task(1));
        queue.push(task(2));
        let paused = AtomicBool::new(false);
        let first = queue.pop(&paused).unwrap();
        let second = queue.pop(&paused).unwrap();
        assert_eq!(first.size, 1);
        assert_eq!(second.size, 2);
    }

    #[test]
    fn test_closed_empty_queue_pop_returns_none() {
        let queue = TaskQueue::new(10);
        queue.close();
        let paused = AtomicBool::new(false);
        assert!(queue.pop(&paused).is_none());
    }

    #[test]
    fn test_closed_nonempty_queue_still_drains() {
        let queue = TaskQueue::new(10);
        queue.push(task(1));
        queue.close();
        let paused = AtomicBool::new(false);
        assert!(queue.pop(&paused).is_some());
        assert!(queue.pop(&paused).is_none());
    }

    #[test]
    fn test_paused_pop_returns_none_without_losing_task() {
        let queue = TaskQueue::new(10);
        queue.push(task(1));
        let paused = AtomicBool::new(true);
        assert!(queue.pop(&paused).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_push_blocks_at_capacity_until_popped() {
        use std::sync::Arc;
        let queue = Arc::new(TaskQueue::new(1));
        queue.push(task(1));

        let queue2 = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            queue2.push(task(2));
        });

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.len(), 1, "second push should still be blocked");

        let paused = AtomicBool::new(false);
        let first = queue.pop(&paused).unwrap();
        assert_eq!(first.size, 1);
        handle.join().unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_force_clear_drops_pending_and_closes() {
        let queue = TaskQueue::new(10);
        queue.push(task(1));
        queue.push(task(2));
        queue.force_clear();
        let paused = AtomicBool::new(false);
        assert!(queue.pop(&paused).is_none());
    }
}
