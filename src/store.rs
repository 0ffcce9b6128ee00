//! Task store
//!
//! Holds one [`TaskRecord`] per task id. Every transition is atomic per task:
//! `queued -> running` happens at most once, and terminal records are never
//! overwritten.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::{JudgeStatus, Submission, TaskRecord, TaskStatus, Verdict};
use crate::error::JudgeError;

/// Terminal status a verdict settles a task into
pub fn terminal_status(verdict: &Verdict) -> TaskStatus {
    if verdict.status == JudgeStatus::SystemError {
        TaskStatus::Failed
    } else {
        TaskStatus::Completed
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Record a newly admitted task as `queued`
    async fn insert_queued(&self, submission: &Submission) -> Result<(), JudgeError>;

    /// Move a task from `queued` to `running`; `false` if someone else got it first
    async fn claim(&self, task_id: Uuid) -> Result<bool, JudgeError>;

    /// Store the verdict and move the task to its terminal state
    async fn finish(&self, verdict: &Verdict) -> Result<(), JudgeError>;

    async fn get(&self, task_id: Uuid) -> Result<Option<TaskRecord>, JudgeError>;

    /// Give up on a claimed task whose verdict could not be stored, so that
    /// recovery may pick it up
    async fn abandon(&self, _task_id: Uuid) {}
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Uuid, TaskRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_queued(&self, submission: &Submission) -> Result<(), JudgeError> {
        let task_id = submission.task_id;
        let mut records = self.records.write().await;
        if records.contains_key(&task_id) {
            return Err(JudgeError::InvalidSubmission(format!(
                "task {} already exists",
                task_id
            )));
        }
        records.insert(task_id, TaskRecord::queued(task_id));
        Ok(())
    }

    async fn claim(&self, task_id: Uuid) -> Result<bool, JudgeError> {
        let mut records = self.records.write().await;
        match records.get_mut(&task_id) {
            Some(record) if record.status == TaskStatus::Queued => {
                record.status = TaskStatus::Running;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(JudgeError::Store(format!("unknown task {}", task_id))),
        }
    }

    async fn finish(&self, verdict: &Verdict) -> Result<(), JudgeError> {
        let mut records = self.records.write().await;
        let record = records
            .entry(verdict.task_id)
            .or_insert_with(|| TaskRecord::queued(verdict.task_id));
        if record.status.is_terminal() {
            return Ok(());
        }
        record.status = terminal_status(verdict);
        record.verdict = Some(verdict.clone());
        Ok(())
    }

    async fn get(&self, task_id: Uuid) -> Result<Option<TaskRecord>, JudgeError> {
        Ok(self.records.read().await.get(&task_id).cloned())
    }
}
