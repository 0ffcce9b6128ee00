pub mod judger;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::SubmissionRequest;

/// Judge request as it arrives on the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeJob {
    /// Set when the producer already handed out a task id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    #[serde(flatten)]
    pub request: SubmissionRequest,
}

/// Worker job enum - represents different types of jobs the worker can process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "job_type")]
pub enum WorkerJob {
    /// Judge a user submission
    #[serde(rename = "judge")]
    Judge(JudgeJob),
}
