//! # Deferred Job Queue
//!
//! One-shot delayed jobs stored in named slots. Enqueuing under a key that
//! already holds a pending job replaces it, so each key has at most one
//! pending job.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Work executed when a deferred job comes due
#[async_trait]
pub trait DeferredJob: Send + Sync {
    /// `fire_at` is the instant the job was scheduled for
    async fn run(&self, fire_at: DateTime<Utc>);
}

struct PendingJob {
    id: Uuid,
    fire_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

#[derive(Clone, Default)]
pub struct DeferredQueue {
    slots: Arc<DashMap<String, PendingJob>>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit `job` to run after `delay`, replacing whatever is pending under `key`.
    ///
    /// `fire_at` is the nominal due time handed to the job and reported by
    /// [`pending`](Self::pending); the caller computes it from its own clock.
    /// Fails when called outside a tokio runtime.
    pub fn enqueue(
        &self,
        key: &str,
        fire_at: DateTime<Utc>,
        delay: Duration,
        job: Arc<dyn DeferredJob>,
    ) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("No async runtime available to schedule deferred work")?;

        let id = Uuid::new_v4();

        // The task waits for `armed` so it cannot look for its slot before it is inserted
        let (armed_tx, armed_rx) = oneshot::channel::<()>();
        let slots = self.slots.clone();
        let slot_key = key.to_string();

        let handle = runtime.spawn(async move {
            if armed_rx.await.is_err() {
                return;
            }
            tokio::time::sleep(delay).await;

            // Leave the slot before running so the job can enqueue its successor
            if slots.remove_if(&slot_key, |_, pending| pending.id == id).is_none() {
                return;
            }
            debug!("Deferred job {slot_key} ({id}) firing");
            job.run(fire_at).await;
        });

        let previous = self.slots.insert(
            key.to_string(),
            PendingJob {
                id,
                fire_at,
                handle,
            },
        );
        if let Some(previous) = previous {
            previous.handle.abort();
            debug!(
                "Replaced deferred job {key} ({}) due {}",
                previous.id, previous.fire_at
            );
        }
        let _ = armed_tx.send(());

        debug!("Deferred job {key} ({id}) due {fire_at} in {delay:?}");
        Ok(())
    }

    /// Drop the job pending under `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some((_, pending)) => {
                pending.handle.abort();
                debug!("Cancelled deferred job {key} ({})", pending.id);
                true
            }
            None => false,
        }
    }

    /// Fire time of the job pending under `key`
    pub fn pending(&self, key: &str) -> Option<DateTime<Utc>> {
        self.slots.get(key).map(|pending| pending.fire_at)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    fn due(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, hour, 0, 0).unwrap()
    }

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
        fired_for: Mutex<Vec<DateTime<Utc>>>,
    }

    #[async_trait]
    impl DeferredJob for CountingJob {
        async fn run(&self, fire_at: DateTime<Utc>) {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.fired_for.lock().await.push(fire_at);
        }
    }

    /// Re-enqueues itself once under the same key
    struct SelfRearmingJob {
        queue: DeferredQueue,
        runs: AtomicUsize,
        me: std::sync::OnceLock<Arc<SelfRearmingJob>>,
    }

    #[async_trait]
    impl DeferredJob for SelfRearmingJob {
        async fn run(&self, fire_at: DateTime<Utc>) {
            if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(me) = self.me.get() {
                    let next = fire_at + chrono::Duration::days(1);
                    self.queue
                        .enqueue("daily", next, Duration::from_secs(60), me.clone())
                        .unwrap();
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_runs_after_delay_and_leaves_slot() {
        let queue = DeferredQueue::new();
        let job = Arc::new(CountingJob::default());

        queue
            .enqueue("daily", due(9), Duration::from_secs(30), job.clone())
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending("daily"), Some(due(9)));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert_eq!(*job.fired_for.lock().await, vec![due(9)]);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmit_replaces_pending_job() {
        let queue = DeferredQueue::new();
        let first = Arc::new(CountingJob::default());
        let second = Arc::new(CountingJob::default());

        queue
            .enqueue("daily", due(9), Duration::from_secs(10), first.clone())
            .unwrap();
        queue
            .enqueue("daily", due(10), Duration::from_secs(20), second.clone())
            .unwrap();

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending("daily"), Some(due(10)));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(first.runs.load(Ordering::SeqCst), 0);
        assert_eq!(second.runs.load(Ordering::SeqCst), 1);
        assert_eq!(*second.fired_for.lock().await, vec![due(10)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing_and_is_idempotent() {
        let queue = DeferredQueue::new();
        let job = Arc::new(CountingJob::default());

        queue
            .enqueue("daily", due(9), Duration::from_secs(5), job.clone())
            .unwrap();
        assert!(queue.cancel("daily"));
        assert!(!queue.cancel("daily"));
        assert!(queue.pending("daily").is_none());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let queue = DeferredQueue::new();
        let job = Arc::new(CountingJob::default());

        queue
            .enqueue("a", due(9), Duration::from_secs(5), job.clone())
            .unwrap();
        queue
            .enqueue("b", due(9), Duration::from_secs(5), job.clone())
            .unwrap();
        assert_eq!(queue.len(), 2);

        queue.cancel("a");
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_can_enqueue_its_successor() {
        let queue = DeferredQueue::new();
        let job = Arc::new(SelfRearmingJob {
            queue: queue.clone(),
            runs: AtomicUsize::new(0),
            me: std::sync::OnceLock::new(),
        });
        let _ = job.me.set(job.clone());

        queue
            .enqueue("daily", due(9), Duration::from_secs(1), job.clone())
            .unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert_eq!(
            queue.pending("daily"),
            Some(due(9) + chrono::Duration::days(1))
        );

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_without_runtime_fails() {
        let queue = DeferredQueue::new();
        let job = Arc::new(CountingJob::default());
        assert!(queue
            .enqueue("daily", due(9), Duration::from_secs(1), job)
            .is_err());
        assert!(queue.is_empty());
    }
}
