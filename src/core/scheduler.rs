//! Deferred archival scheduler.
//!
//! Turns armed/disarmed signals into one-shot timers keyed by task id.
//! A timer does not touch the store: when it expires it sends an
//! [`ArchiveFire`] back to the owner, which validates it here and then
//! calls `archive_if_still_completed` on the store.
//!
//! At most one timer is pending per task. Re-arming aborts the previous
//! timer and bumps the generation, so a fire that was already queued by
//! the old timer is recognised as stale and dropped.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::{StoreSignal, TaskId};

/// Default grace period between completion and archival
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Message a timer sends to the owner when its grace period elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveFire {
    pub task_id: TaskId,
    pub generation: u64,
}

struct PendingArchive {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Per-task deferred archival timers
pub struct ArchiveScheduler {
    grace_period: Duration,
    fire_tx: mpsc::UnboundedSender<ArchiveFire>,
    pending: HashMap<TaskId, PendingArchive>,
    next_generation: u64,
}

impl ArchiveScheduler {
    /// Create a scheduler whose timers report to `fire_tx`
    pub fn new(grace_period: Duration, fire_tx: mpsc::UnboundedSender<ArchiveFire>) -> Self {
        Self {
            grace_period,
            fire_tx,
            pending: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Route a store signal to arm or disarm
    pub fn apply(&mut self, signal: StoreSignal) {
        match signal {
            StoreSignal::Armed(id) => self.arm(id),
            StoreSignal::Disarmed(id) => {
                self.disarm(id);
            }
        }
    }

    /// Start (or restart) the grace period for `id`. Must run inside a tokio runtime.
    pub fn arm(&mut self, id: TaskId) {
        if let Some(previous) = self.pending.remove(&id) {
            previous.handle.abort();
            debug!(task_id = %id, "Replaced pending archive timer");
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let delay = self.grace_period;
        let tx = self.fire_tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Owner gone means the list is shutting down
            let _ = tx.send(ArchiveFire {
                task_id: id,
                generation,
            });
        });

        self.pending.insert(id, PendingArchive { generation, handle });
        debug!(task_id = %id, generation, delay_ms = delay.as_millis() as u64, "Armed archive timer");
    }

    /// Cancel the pending timer for `id`. Returns false if none was pending.
    pub fn disarm(&mut self, id: TaskId) -> bool {
        match self.pending.remove(&id) {
            Some(pending) => {
                pending.handle.abort();
                debug!(task_id = %id, generation = pending.generation, "Disarmed archive timer");
                true
            }
            None => false,
        }
    }

    /// Consume a fire. Returns true if it belongs to the current timer for its task.
    pub fn take_fired(&mut self, fire: ArchiveFire) -> bool {
        match self.pending.get(&fire.task_id) {
            Some(pending) if pending.generation == fire.generation => {
                self.pending.remove(&fire.task_id);
                true
            }
            _ => {
                debug!(
                    task_id = %fire.task_id,
                    generation = fire.generation,
                    "Discarding stale archive fire"
                );
                false
            }
        }
    }

    /// Whether a timer is pending for `id`
    pub fn is_pending(&self, id: TaskId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of pending timers
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Abort every pending timer
    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.handle.abort();
        }
    }
}

impl Drop for ArchiveScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(secs: u64) -> (ArchiveScheduler, mpsc::UnboundedReceiver<ArchiveFire>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ArchiveScheduler::new(Duration::from_secs(secs), tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_armed_timer_fires_after_grace_period() {
        let (mut sched, mut rx) = scheduler(30);
        let id = TaskId::new();
        sched.arm(id);

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());

        let fire = rx.recv().await.unwrap();
        assert_eq!(fire.task_id, id);
        assert!(sched.take_fired(fire));
        assert!(!sched.is_pending(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_cancels_timer() {
        let (mut sched, mut rx) = scheduler(30);
        let id = TaskId::new();
        sched.arm(id);
        assert!(sched.disarm(id));
        assert!(!sched.disarm(id));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(sched.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_timer() {
        let (mut sched, mut rx) = scheduler(30);
        let id = TaskId::new();
        sched.arm(id);

        tokio::time::sleep(Duration::from_secs(20)).await;
        sched.arm(id);
        assert_eq!(sched.pending_count(), 1);

        // The first timer would have fired at t=30
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(rx.try_recv().is_err());

        let fire = rx.recv().await.unwrap();
        assert!(sched.take_fired(fire));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fire_is_rejected() {
        let (mut sched, mut rx) = scheduler(30);
        let id = TaskId::new();
        sched.arm(id);

        // Fire is queued but not yet consumed by the owner
        let stale = rx.recv().await.unwrap();
        sched.disarm(id);
        sched.arm(id);

        assert!(!sched.take_fired(stale));
        assert!(sched.is_pending(id));
    }

    #[test]
    fn test_default_grace_period() {
        assert_eq!(DEFAULT_GRACE_PERIOD, Duration::from_secs(30));
    }
}
