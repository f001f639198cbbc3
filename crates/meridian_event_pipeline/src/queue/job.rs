//! Job records and the durable backing store.
//!
//! A job is owned by the store from enqueue until it reaches a terminal
//! state. Terminal `failed` jobs are retained for operator inspection and
//! are never reprocessed automatically.

use crate::error::QueueError;
use crate::types::EventType;
use crate::utils::current_timestamp_ms;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::RwLock;
use uuid::Uuid;

/// Lifecycle state of a job.
///
/// Legal transitions: waiting → active → completed, or active → waiting
/// (delayed retry) until the attempt cap, then active → failed (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

/// Metadata stamped onto a job at enqueue time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    pub ingested_at: i64,
    pub source: String,
}

impl JobMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            ingested_at: current_timestamp_ms(),
            source: source.into(),
        }
    }
}

/// A unit of work in a named queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub event_type: EventType,
    pub canonical_data: Value,
    pub metadata: JobMetadata,
    pub priority: u8,
    pub attempts_made: u32,
    pub state: JobState,
    pub queue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Job {
    pub fn new(
        event_type: EventType,
        canonical_data: Value,
        metadata: JobMetadata,
        priority: u8,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            canonical_data,
            metadata,
            priority,
            attempts_made: 0,
            state: JobState::Waiting,
            queue: queue.into(),
            last_error: None,
        }
    }
}

/// The most recently completed job, surfaced through pipeline status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastProcessed {
    pub job_id: Uuid,
    pub event_type: String,
    pub completed_at: i64,
}

/// In-process durable store for job records, keyed by job id.
///
/// Sharded map for hot concurrent access from workers; the store holds every
/// job from enqueue through its terminal state.
pub struct JobStore {
    jobs: DashMap<Uuid, Job>,
    last_completed: RwLock<Option<LastProcessed>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            last_completed: RwLock::new(None),
        }
    }

    pub fn insert(&self, job: Job) {
        self.jobs.insert(job.id, job);
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.get(&id).map(|entry| entry.clone())
    }

    /// Moves a waiting job to active and counts the attempt.
    pub fn mark_active(&self, id: Uuid) -> Result<Job, QueueError> {
        let mut entry = self.jobs.get_mut(&id).ok_or(QueueError::UnknownJob(id))?;
        entry.state = JobState::Active;
        entry.attempts_made += 1;
        Ok(entry.clone())
    }

    /// Moves an active job back to waiting ahead of a delayed retry.
    pub fn mark_waiting(&self, id: Uuid, error: &str) -> Result<(), QueueError> {
        let mut entry = self.jobs.get_mut(&id).ok_or(QueueError::UnknownJob(id))?;
        entry.state = JobState::Waiting;
        entry.last_error = Some(error.to_string());
        Ok(())
    }

    pub fn mark_completed(&self, id: Uuid) -> Result<(), QueueError> {
        let event_type = {
            let mut entry = self.jobs.get_mut(&id).ok_or(QueueError::UnknownJob(id))?;
            entry.state = JobState::Completed;
            entry.event_type.to_string()
        };
        if let Ok(mut last) = self.last_completed.write() {
            *last = Some(LastProcessed {
                job_id: id,
                event_type,
                completed_at: current_timestamp_ms(),
            });
        }
        Ok(())
    }

    pub fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), QueueError> {
        let mut entry = self.jobs.get_mut(&id).ok_or(QueueError::UnknownJob(id))?;
        entry.state = JobState::Failed;
        entry.last_error = Some(error.to_string());
        Ok(())
    }

    /// Terminal failed jobs for one queue, for operator tooling.
    pub fn failed_jobs(&self, queue: &str) -> Vec<Job> {
        self.jobs
            .iter()
            .filter(|entry| entry.queue == queue && entry.state == JobState::Failed)
            .map(|entry| entry.clone())
            .collect()
    }

    /// Every job currently recorded for one queue, regardless of state.
    pub fn jobs_in_queue(&self, queue: &str) -> Vec<Job> {
        self.jobs
            .iter()
            .filter(|entry| entry.queue == queue)
            .map(|entry| entry.clone())
            .collect()
    }

    pub fn last_processed(&self) -> Option<LastProcessed> {
        self.last_completed.read().ok().and_then(|last| last.clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
