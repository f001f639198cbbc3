//! Per-queue priority scheduling and the bounded worker pool.
//!
//! Each named queue owns a priority heap of waiting jobs and a fixed number
//! of worker tasks. The concurrency bound is the backpressure mechanism:
//! excess jobs wait in the heap rather than being rejected. Within one queue,
//! completion order is FIFO modulo priority reordering and retry delays.

use super::job::{Job, JobStore};
use super::processors::ProcessorRegistry;
use super::QueueConfig;
use crate::bus::BroadcastBus;
use crate::error::QueueError;
use serde::Serialize;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Externally visible counters for one queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
}

/// Heap entry: highest priority first, then earliest enqueue.
struct QueuedRef {
    priority: u8,
    seq: u64,
    job_id: Uuid,
}

impl Eq for QueuedRef {}

impl PartialEq for QueuedRef {
    fn eq(&self, other: &Self) -> bool {
        self.job_id == other.job_id
    }
}

impl Ord for QueuedRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// One named queue: waiting heap, worker wake-up, stats, shutdown signal.
pub struct EventQueue {
    config: QueueConfig,
    store: Arc<JobStore>,
    heap: Mutex<BinaryHeap<QueuedRef>>,
    notify: Notify,
    seq: AtomicU64,
    stats: RwLock<QueueStats>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl EventQueue {
    pub fn new(config: QueueConfig, store: Arc<JobStore>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            store,
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
            stats: RwLock::new(QueueStats::default()),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Inserts a job into the store and schedules it for processing.
    pub async fn enqueue_job(&self, job: Job) -> Result<Uuid, QueueError> {
        if *self.shutdown_rx.borrow() {
            return Err(QueueError::NotAccepting(self.config.name.clone()));
        }
        let job_id = job.id;
        let entry = QueuedRef {
            priority: job.priority,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            job_id,
        };
        self.store.insert(job);
        self.heap.lock().await.push(entry);
        self.stats.write().await.waiting += 1;
        self.notify.notify_one();
        Ok(job_id)
    }

    /// Puts a retried job back on the heap after its backoff delay.
    async fn requeue(&self, job_id: Uuid, priority: u8) {
        let entry = QueuedRef {
            priority,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            job_id,
        };
        self.heap.lock().await.push(entry);
        self.notify.notify_one();
    }

    pub async fn stats(&self) -> QueueStats {
        self.stats.read().await.clone()
    }

    /// Stops accepting jobs and wakes every idle worker so it can exit.
    /// Jobs already on the heap are left for draining by whoever restarts.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        self.notify.notify_waiters();
    }

    /// Spawns the queue's worker tasks, one per concurrency slot.
    pub fn spawn_workers(
        self: &Arc<Self>,
        processors: Arc<ProcessorRegistry>,
        bus: Arc<BroadcastBus>,
    ) -> Vec<JoinHandle<()>> {
        (0..self.config.concurrency)
            .map(|slot| {
                let queue = Arc::clone(self);
                let processors = Arc::clone(&processors);
                let bus = Arc::clone(&bus);
                tokio::spawn(async move {
                    debug!("👷 Worker {}#{} started", queue.name(), slot);
                    queue.clone().worker_loop(processors, bus).await;
                    debug!("👷 Worker {}#{} stopped", queue.name(), slot);
                })
            })
            .collect()
    }

    async fn worker_loop(self: Arc<Self>, processors: Arc<ProcessorRegistry>, bus: Arc<BroadcastBus>) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            let job_id = {
                let popped = loop {
                    if let Some(entry) = self.heap.lock().await.pop() {
                        break Some(entry.job_id);
                    }
                    if *shutdown.borrow() {
                        break None;
                    }
                    tokio::select! {
                        _ = self.notify.notified() => {}
                        _ = shutdown.changed() => {}
                    }
                };
                match popped {
                    Some(id) => id,
                    None => return,
                }
            };
            self.run_job(job_id, &processors, &bus).await;
        }
    }

    /// Executes one job: processor, publish on success, retry or terminal
    /// failure otherwise.
    async fn run_job(
        self: &Arc<Self>,
        job_id: Uuid,
        processors: &ProcessorRegistry,
        bus: &Arc<BroadcastBus>,
    ) {
        let job = match self.store.mark_active(job_id) {
            Ok(job) => job,
            Err(e) => {
                error!("❌ Queue {} lost track of a job: {}", self.name(), e);
                return;
            }
        };
        {
            let mut stats = self.stats.write().await;
            stats.waiting = stats.waiting.saturating_sub(1);
            stats.active += 1;
        }

        let processor = processors.for_domain(job.event_type.domain());
        match processor.process(&job).await {
            Ok(result) => {
                let channel = format!("processed.{}", job.event_type);
                if let Err(e) = bus.publish(&channel, result.clone()).await {
                    warn!("⚠️ Publish of {} failed after processing: {}", channel, e);
                }
                bus.route_derived(job.event_type.as_str(), &result).await;
                let _ = self.store.mark_completed(job_id);
                let mut stats = self.stats.write().await;
                stats.active = stats.active.saturating_sub(1);
                stats.completed += 1;
            }
            Err(e) => {
                let attempts = job.attempts_made;
                if attempts < self.config.retry.max_attempts {
                    let delay = self.config.retry.delay_for(attempts - 1);
                    let _ = self.store.mark_waiting(job_id, &e.to_string());
                    {
                        let mut stats = self.stats.write().await;
                        stats.active = stats.active.saturating_sub(1);
                        stats.waiting += 1;
                        stats.retried += 1;
                    }
                    warn!(
                        "⏳ Job {} on {} failed (attempt {}/{}), retrying in {:?}: {}",
                        job_id,
                        self.name(),
                        attempts,
                        self.config.retry.max_attempts,
                        delay,
                        e
                    );
                    let queue = Arc::clone(self);
                    let priority = job.priority;
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        queue.requeue(job_id, priority).await;
                    });
                } else {
                    let _ = self.store.mark_failed(job_id, &e.to_string());
                    let mut stats = self.stats.write().await;
                    stats.active = stats.active.saturating_sub(1);
                    stats.failed += 1;
                    error!(
                        "❌ Job {} on {} failed terminally after {} attempts: {}",
                        job_id,
                        self.name(),
                        attempts,
                        e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::queue::job::{JobMetadata, JobState};
    use crate::queue::processors::JobProcessor;
    use crate::queue::RetryPolicy;
    use crate::types::EventType;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    /// Records processing order; fails the first `fail_first` calls per job.
    struct RecordingProcessor {
        seen: AsyncMutex<Vec<String>>,
        fail_attempts: u32,
    }

    impl RecordingProcessor {
        fn new(fail_attempts: u32) -> Self {
            Self {
                seen: AsyncMutex::new(Vec::new()),
                fail_attempts,
            }
        }
    }

    #[async_trait]
    impl JobProcessor for RecordingProcessor {
        fn domain(&self) -> &'static str {
            "test"
        }

        async fn process(&self, job: &Job) -> Result<serde_json::Value, ProcessError> {
            self.seen.lock().await.push(job.event_type.to_string());
            if job.attempts_made <= self.fail_attempts {
                return Err(ProcessError::new("induced failure"));
            }
            Ok(json!({"ok": true}))
        }
    }

    fn test_queue(concurrency: usize, retry: RetryPolicy) -> (Arc<EventQueue>, Arc<JobStore>) {
        let store = Arc::new(JobStore::new());
        let queue = Arc::new(EventQueue::new(
            QueueConfig {
                name: "test-events".to_string(),
                concurrency,
                retry,
            },
            Arc::clone(&store),
        ));
        (queue, store)
    }

    fn job_with_priority(event_type: &str, priority: u8) -> Job {
        Job::new(
            EventType::parse(event_type).unwrap(),
            json!({}),
            JobMetadata::new("test"),
            priority,
            "test-events",
        )
    }

    fn registry_with(processor: Arc<RecordingProcessor>) -> Arc<ProcessorRegistry> {
        let mut registry = ProcessorRegistry::new();
        registry.register(processor);
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_higher_priority_runs_first_under_saturation() {
        let (queue, _store) = test_queue(1, RetryPolicy::new(1, Duration::from_millis(1)));
        let processor = Arc::new(RecordingProcessor::new(0));

        // Enqueue before any worker exists so the single worker must choose.
        queue
            .enqueue_job(job_with_priority("test.analytics", 1))
            .await
            .unwrap();
        queue
            .enqueue_job(job_with_priority("test.combat", 10))
            .await
            .unwrap();
        queue
            .enqueue_job(job_with_priority("test.chat", 5))
            .await
            .unwrap();

        let bus = Arc::new(BroadcastBus::new("test"));
        let handles = queue.spawn_workers(registry_with(Arc::clone(&processor)), bus);

        tokio::time::sleep(Duration::from_millis(100)).await;
        queue.stop();
        for handle in handles {
            let _ = handle.await;
        }

        let seen = processor.seen.lock().await.clone();
        assert_eq!(seen, vec!["test.combat", "test.chat", "test.analytics"]);
    }

    #[tokio::test]
    async fn test_retry_until_exhaustion_marks_failed() {
        let retry = RetryPolicy::new(3, Duration::from_millis(5));
        let (queue, store) = test_queue(2, retry);
        let processor = Arc::new(RecordingProcessor::new(u32::MAX));

        let job = job_with_priority("test.tick", 3);
        let job_id = job.id;
        queue.enqueue_job(job).await.unwrap();

        let bus = Arc::new(BroadcastBus::new("test"));
        let handles = queue.spawn_workers(registry_with(Arc::clone(&processor)), bus);

        // base 5ms -> retries at +5ms and +10ms; generous margin.
        tokio::time::sleep(Duration::from_millis(300)).await;
        queue.stop();
        for handle in handles {
            let _ = handle.await;
        }

        let stored = store.get(job_id).unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert_eq!(stored.attempts_made, 3);
        assert_eq!(processor.seen.lock().await.len(), 3);

        let stats = queue.stats().await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.completed, 0);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let retry = RetryPolicy::new(3, Duration::from_millis(5));
        let (queue, store) = test_queue(2, retry);
        let processor = Arc::new(RecordingProcessor::new(1));

        let job = job_with_priority("test.tick", 3);
        let job_id = job.id;
        queue.enqueue_job(job).await.unwrap();

        let bus = Arc::new(BroadcastBus::new("test"));
        let handles = queue.spawn_workers(registry_with(Arc::clone(&processor)), bus);

        tokio::time::sleep(Duration::from_millis(200)).await;
        queue.stop();
        for handle in handles {
            let _ = handle.await;
        }

        assert_eq!(store.get(job_id).unwrap().state, JobState::Completed);
        let stats = queue.stats().await;
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.retried, 1);
    }

    #[tokio::test]
    async fn test_stopped_queue_rejects_jobs() {
        let (queue, _store) = test_queue(1, RetryPolicy::default());
        queue.stop();
        let result = queue.enqueue_job(job_with_priority("chat.message", 5)).await;
        assert!(matches!(result, Err(QueueError::NotAccepting(_))));
    }
}
