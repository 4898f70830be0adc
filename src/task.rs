//! Task queue interface
//!
//! One-shot execution requests live in an external, database-backed
//! queue; this module defines only the contract the worker needs to
//! bind a run to a task record, plus an in-memory implementation used
//! by tests and by deployments without a queue.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::spec::TASK_ID_PARAM;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Waiting,
    Queued,
    Started,
    Finished,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Queued => "queued",
            TaskStatus::Started => "started",
            TaskStatus::Finished => "finished",
            TaskStatus::Failed => "failed",
        }
    }
}

/// A cron job execution request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronTask {
    pub id: u64,
    pub job_name: String,
    pub params: String,
    pub status: TaskStatus,
    pub pid: Option<u32>,
    pub start_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CronTask {
    /// Suitable to launch: not yet picked up, or picked up but not started.
    pub fn is_pending(&self) -> bool {
        matches!(self.status, TaskStatus::Waiting | TaskStatus::Queued)
    }

    pub fn is_started(&self) -> bool {
        self.status == TaskStatus::Started
    }

    /// Job spec for this task, with the task id appended so the worker
    /// can report status back.
    pub fn job_spec(&self) -> String {
        let params = self.params.trim();
        let sep = if params.is_empty() { "" } else { "," };
        format!(
            "{}:{}{}{}={}",
            self.job_name, params, sep, TASK_ID_PARAM, self.id
        )
    }
}

/// Contract between the worker and the external task queue.
///
/// Implementations must make each `mark_*` transition durable before
/// returning; the worker drives them in a fixed order (queued, started,
/// then finished or failed).
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, id: u64) -> Option<CronTask>;
    async fn mark_queued(&self, id: u64);
    async fn mark_started(&self, id: u64, pid: u32, at: DateTime<Utc>);
    async fn mark_finished(&self, id: u64, at: DateTime<Utc>);
    async fn mark_failed(&self, id: u64);
}

/// In-memory task store.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<u64, CronTask>>,
    next_id: Mutex<u64>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: CronTask) {
        self.tasks.lock().unwrap().insert(task.id, task);
    }

    /// Request a job to run now. Suppresses duplicates: an existing
    /// request for the same job and params within +/- 4 minutes is
    /// returned instead of creating a new one.
    pub fn run_now(&self, job_name: &str, params: &str, now: DateTime<Utc>) -> (CronTask, bool) {
        let tolerance = Duration::minutes(4);
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(existing) = tasks.values().find(|t| {
            t.job_name == job_name
                && t.params == params
                && t.start_at > now - tolerance
                && t.start_at < now + tolerance
        }) {
            return (existing.clone(), false);
        }
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let task = CronTask {
            id: *next_id,
            job_name: job_name.to_string(),
            params: params.to_string(),
            status: TaskStatus::Waiting,
            pid: None,
            start_at: now,
            started_at: None,
            finished_at: None,
        };
        tasks.insert(task.id, task.clone());
        (task, true)
    }

    fn update(&self, id: u64, f: impl FnOnce(&mut CronTask)) {
        if let Some(task) = self.tasks.lock().unwrap().get_mut(&id) {
            f(task);
        }
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn get(&self, id: u64) -> Option<CronTask> {
        self.tasks.lock().unwrap().get(&id).cloned()
    }

    async fn mark_queued(&self, id: u64) {
        self.update(id, |t| t.status = TaskStatus::Queued);
    }

    async fn mark_started(&self, id: u64, pid: u32, at: DateTime<Utc>) {
        self.update(id, |t| {
            t.status = TaskStatus::Started;
            t.pid = Some(pid);
            t.started_at = Some(at);
        });
    }

    async fn mark_finished(&self, id: u64, at: DateTime<Utc>) {
        self.update(id, |t| {
            t.status = TaskStatus::Finished;
            t.finished_at = Some(at);
        });
    }

    async fn mark_failed(&self, id: u64) {
        self.update(id, |t| t.status = TaskStatus::Failed);
    }
}

/// Store used when no task queue is wired in: every lookup misses.
pub struct NoTaskStore;

#[async_trait]
impl TaskStore for NoTaskStore {
    async fn get(&self, _id: u64) -> Option<CronTask> {
        None
    }
    async fn mark_queued(&self, _id: u64) {}
    async fn mark_started(&self, _id: u64, _pid: u32, _at: DateTime<Utc>) {}
    async fn mark_finished(&self, _id: u64, _at: DateTime<Utc>) {}
    async fn mark_failed(&self, _id: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_transitions_round_trip() {
        let store = MemoryTaskStore::new();
        let (task, created) = store.run_now("Sleep", "seconds=1", Utc::now());
        assert!(created);
        assert!(task.is_pending());

        store.mark_queued(task.id).await;
        assert!(store.get(task.id).await.unwrap().is_pending());

        store.mark_started(task.id, 4321, Utc::now()).await;
        let started = store.get(task.id).await.unwrap();
        assert!(started.is_started());
        assert_eq!(started.pid, Some(4321));

        store.mark_finished(task.id, Utc::now()).await;
        assert_eq!(store.get(task.id).await.unwrap().status, TaskStatus::Finished);
    }

    #[test]
    fn run_now_suppresses_duplicates_within_tolerance() {
        let store = MemoryTaskStore::new();
        let now = Utc::now();
        let (first, created) = store.run_now("Sleep", "seconds=1", now);
        assert!(created);
        let (again, created) = store.run_now("Sleep", "seconds=1", now + Duration::minutes(2));
        assert!(!created);
        assert_eq!(again.id, first.id);
        let (other, created) = store.run_now("Sleep", "seconds=2", now);
        assert!(created);
        assert_ne!(other.id, first.id);
    }

    #[test]
    fn job_spec_appends_task_id() {
        let store = MemoryTaskStore::new();
        let (task, _) = store.run_now("Report", "format=csv", Utc::now());
        assert_eq!(task.job_spec(), format!("Report:format=csv,task_id={}", task.id));
        let (bare, _) = store.run_now("Cleanup", "", Utc::now());
        assert_eq!(bare.job_spec(), format!("Cleanup:task_id={}", bare.id));
    }
}
