//! Priority queue routing and the per-queue worker pools.
//!
//! Routing is a fixed small table: the event's domain picks the queue,
//! unknown domains fall back to `system-events` rather than failing. The
//! priority score is looked up by full event type first, then domain, then a
//! default. Each queue carries an immutable concurrency bound and retry
//! policy fixed at creation.

mod job;
mod processors;
mod retry;
mod worker;

pub use job::{Job, JobMetadata, JobState, JobStore, LastProcessed};
pub use processors::{
    AnalyticsProcessor, ChatProcessor, CombatProcessor, DefaultProcessor, JobProcessor,
    PlayerProcessor, ProcessorRegistry, SystemProcessor, WorldProcessor,
};
pub use retry::RetryPolicy;
pub use worker::{EventQueue, QueueStats};

use crate::bus::BroadcastBus;
use crate::error::QueueError;
use crate::types::EventType;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// Queue handling events whose domain has no dedicated queue.
pub const FALLBACK_QUEUE: &str = "system-events";

const DEFAULT_PRIORITY: u8 = 5;

/// Immutable configuration for one named queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub name: String,
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl QueueConfig {
    pub fn new(name: &str, concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            name: name.to_string(),
            concurrency,
            retry,
        }
    }
}

/// The stock queue set. Combat and chat get wide pools because their traffic
/// is bursty; system stays narrow so infrastructure events cannot starve
/// gameplay processing. Attempt caps sit where correctness matters most.
pub fn default_queue_configs() -> Vec<QueueConfig> {
    let base = Duration::from_secs(2);
    vec![
        QueueConfig::new("player-events", 10, RetryPolicy::new(3, base)),
        QueueConfig::new("world-events", 5, RetryPolicy::new(3, base)),
        QueueConfig::new("combat-events", 15, RetryPolicy::new(5, base)),
        QueueConfig::new("chat-events", 20, RetryPolicy::new(2, base)),
        QueueConfig::new("system-events", 3, RetryPolicy::new(3, base)),
        QueueConfig::new("analytics-events", 5, RetryPolicy::new(2, base)),
    ]
}

/// Maps a domain to its queue name; unknown domains share the system queue.
pub fn queue_for_domain(domain: &str) -> &'static str {
    match domain {
        "player" => "player-events",
        "world" => "world-events",
        "combat" => "combat-events",
        "chat" => "chat-events",
        "system" => "system-events",
        "analytics" => "analytics-events",
        _ => FALLBACK_QUEUE,
    }
}

/// Priority lookup: full event type beats domain beats the default.
///
/// Combat is highest because its correctness is latency-sensitive; analytics
/// is lowest because nobody is waiting on it.
#[derive(Debug, Clone)]
pub struct PriorityTable {
    by_type: HashMap<String, u8>,
    by_domain: HashMap<String, u8>,
    default_priority: u8,
}

impl PriorityTable {
    pub fn priority_for(&self, event_type: &EventType) -> u8 {
        self.by_type
            .get(event_type.as_str())
            .or_else(|| self.by_domain.get(event_type.domain()))
            .copied()
            .unwrap_or(self.default_priority)
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        let by_type = HashMap::from([("player.moved".to_string(), 9)]);
        let by_domain = HashMap::from([
            ("combat".to_string(), 10),
            ("chat".to_string(), 5),
            ("world".to_string(), 4),
            ("system".to_string(), 3),
            ("analytics".to_string(), 1),
        ]);
        Self {
            by_type,
            by_domain,
            default_priority: DEFAULT_PRIORITY,
        }
    }
}

/// Routes canonical events into named queues and owns their worker pools.
pub struct QueueRouter {
    queues: HashMap<String, Arc<EventQueue>>,
    priorities: PriorityTable,
    store: Arc<JobStore>,
}

impl QueueRouter {
    /// Creates a router with the stock queues and priority table.
    pub fn new(store: Arc<JobStore>) -> Self {
        Self::with_configs(store, default_queue_configs(), PriorityTable::default())
    }

    pub fn with_configs(
        store: Arc<JobStore>,
        configs: Vec<QueueConfig>,
        priorities: PriorityTable,
    ) -> Self {
        let queues = configs
            .into_iter()
            .map(|config| {
                let name = config.name.clone();
                (name, Arc::new(EventQueue::new(config, Arc::clone(&store))))
            })
            .collect();
        Self {
            queues,
            priorities,
            store,
        }
    }

    /// Routes an event to its queue, computes the priority and enqueues a
    /// durable job. Returns the job id.
    pub async fn enqueue(
        &self,
        event_type: EventType,
        canonical_data: Value,
        metadata: JobMetadata,
    ) -> Result<Uuid, QueueError> {
        let queue_name = queue_for_domain(event_type.domain());
        let queue = self
            .queues
            .get(queue_name)
            .ok_or_else(|| QueueError::UnknownQueue(queue_name.to_string()))?;
        let priority = self.priorities.priority_for(&event_type);
        debug!(
            "📥 Routing {} to {} at priority {}",
            event_type, queue_name, priority
        );
        let job = Job::new(event_type, canonical_data, metadata, priority, queue_name);
        queue.enqueue_job(job).await
    }

    pub fn queue(&self, name: &str) -> Result<&Arc<EventQueue>, QueueError> {
        self.queues
            .get(name)
            .ok_or_else(|| QueueError::UnknownQueue(name.to_string()))
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Spawns the worker pool for every queue.
    pub fn spawn_workers(
        &self,
        processors: Arc<ProcessorRegistry>,
        bus: Arc<BroadcastBus>,
    ) -> Vec<JoinHandle<()>> {
        self.queues
            .values()
            .flat_map(|queue| queue.spawn_workers(Arc::clone(&processors), Arc::clone(&bus)))
            .collect()
    }

    /// Signals every queue to stop accepting and wake idle workers.
    pub fn stop(&self) {
        for queue in self.queues.values() {
            queue.stop();
        }
    }

    /// Waiting/active/completed/failed counters per queue.
    pub async fn stats(&self) -> HashMap<String, QueueStats> {
        let mut stats = HashMap::with_capacity(self.queues.len());
        for (name, queue) in &self.queues {
            stats.insert(name.clone(), queue.stats().await);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_domain_to_queue_table() {
        assert_eq!(queue_for_domain("player"), "player-events");
        assert_eq!(queue_for_domain("combat"), "combat-events");
        assert_eq!(queue_for_domain("analytics"), "analytics-events");
        assert_eq!(queue_for_domain("guild"), FALLBACK_QUEUE);
    }

    #[test]
    fn test_priority_lookup_order() {
        let table = PriorityTable::default();
        let priority = |s: &str| table.priority_for(&EventType::parse(s).unwrap());

        // Full type wins over the player domain having no entry.
        assert_eq!(priority("player.moved"), 9);
        // Domain table.
        assert_eq!(priority("combat.resolved"), 10);
        assert_eq!(priority("chat.message"), 5);
        assert_eq!(priority("world.event_started"), 4);
        assert_eq!(priority("system.heartbeat"), 3);
        assert_eq!(priority("analytics.tick"), 1);
        // Unknown domain and unlisted player actions use the default.
        assert_eq!(priority("guild.created"), 5);
        assert_eq!(priority("player.logged_in"), 5);
    }

    #[test]
    fn test_combat_outranks_analytics() {
        let table = PriorityTable::default();
        let combat = table.priority_for(&EventType::parse("combat.hit").unwrap());
        let analytics = table.priority_for(&EventType::parse("analytics.tick").unwrap());
        assert!(combat > analytics);
    }

    #[tokio::test]
    async fn test_unknown_domain_lands_in_system_queue() {
        let store = Arc::new(JobStore::new());
        let router = QueueRouter::new(Arc::clone(&store));
        let job_id = router
            .enqueue(
                EventType::parse("guild.created").unwrap(),
                json!({"name": "x"}),
                JobMetadata::new("test"),
            )
            .await
            .unwrap();

        let job = store.get(job_id).unwrap();
        assert_eq!(job.queue, FALLBACK_QUEUE);
        assert_eq!(job.priority, DEFAULT_PRIORITY);
        assert_eq!(job.state, JobState::Waiting);
    }

    #[tokio::test]
    async fn test_stats_cover_all_queues() {
        let router = QueueRouter::new(Arc::new(JobStore::new()));
        let stats = router.stats().await;
        assert_eq!(stats.len(), 6);
        assert!(stats.contains_key("combat-events"));
        assert_eq!(stats["combat-events"].waiting, 0);
    }
}
