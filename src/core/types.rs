//! Submission, result and task records exchanged with the API layer and the task store

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::verdict::JudgeStatus;
use crate::config::JudgeConfig;
use crate::error::JudgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a submission's code is driven by its test cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgeMode {
    /// stdin/stdout, one process per test case
    Acm,
    /// Function call through a generated harness, one process per test case
    Leetcode,
    /// Self-checking program, run once
    Fullcode,
}

impl fmt::Display for JudgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JudgeMode::Acm => "acm",
            JudgeMode::Leetcode => "leetcode",
            JudgeMode::Fullcode => "fullcode",
        };
        f.write_str(s)
    }
}

/// Whether a non-fatal failing test case stops the remaining ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    ShortCircuit,
    RunAll,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short_circuit" | "short-circuit" | "first_failure" => Ok(FailurePolicy::ShortCircuit),
            "run_all" | "run-all" | "all" => Ok(FailurePolicy::RunAll),
            other => Err(format!("unknown failure policy: {}", other)),
        }
    }
}

/// Test case data: literal text, or a structured value in LeetCode mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Value(serde_json::Value),
}

impl Payload {
    /// Text form used for stdin and for reporting
    pub fn to_text(&self) -> String {
        match self {
            Payload::Text(s) => s.clone(),
            Payload::Value(v) => v.to_string(),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Text(String::new())
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub input: Payload,
    #[serde(default)]
    pub expected: Payload,
}

impl TestCase {
    pub fn new(input: impl Into<Payload>, expected: impl Into<Payload>) -> Self {
        Self {
            input: input.into(),
            expected: expected.into(),
        }
    }
}

/// Submission as received from the API layer, before admission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub code: String,
    pub language: Language,
    pub mode: JudgeMode,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    /// Seconds per test case
    #[serde(default)]
    pub time_limit: Option<f64>,
    /// Megabytes
    #[serde(default)]
    pub memory_limit: Option<u64>,
    /// Function or `Solution` method to call in LeetCode mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    /// Numeric tolerance for output comparison; exact match when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float_tolerance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<FailurePolicy>,
}

/// Accepted submission. Never mutated after it is enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub task_id: Uuid,
    pub code: String,
    pub language: Language,
    pub mode: JudgeMode,
    pub test_cases: Vec<TestCase>,
    pub time_limit: f64,
    pub memory_limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float_tolerance: Option<f64>,
    #[serde(default)]
    pub policy: FailurePolicy,
}

impl SubmissionRequest {
    /// Validate the request, fill in defaults and clamp limits to the configured maxima
    pub fn into_submission(self, task_id: Uuid, config: &JudgeConfig) -> Result<Submission, JudgeError> {
        let time_limit = self.time_limit.unwrap_or(config.default_time_limit);
        if !time_limit.is_finite() || time_limit <= 0.0 {
            return Err(JudgeError::InvalidSubmission(
                "time_limit must be a positive number of seconds".into(),
            ));
        }
        let time_limit = time_limit.min(config.max_time_limit);

        let memory_limit = self.memory_limit.unwrap_or(config.default_memory_limit);
        if memory_limit == 0 {
            return Err(JudgeError::InvalidSubmission(
                "memory_limit must be a positive number of megabytes".into(),
            ));
        }
        let memory_limit = memory_limit.min(config.max_memory_limit);

        if self.test_cases.is_empty() && self.mode != JudgeMode::Fullcode {
            return Err(JudgeError::InvalidSubmission(format!(
                "{} mode requires at least one test case",
                self.mode
            )));
        }

        if let Some(tol) = self.float_tolerance {
            if !tol.is_finite() || tol < 0.0 {
                return Err(JudgeError::InvalidSubmission(
                    "float_tolerance must be a non-negative number".into(),
                ));
            }
        }

        Ok(Submission {
            task_id,
            code: self.code,
            language: self.language,
            mode: self.mode,
            test_cases: self.test_cases,
            time_limit,
            memory_limit,
            entry_point: self.entry_point,
            float_tolerance: self.float_tolerance.or(config.float_tolerance),
            policy: self.policy.unwrap_or(config.failure_policy),
        })
    }
}

impl From<Submission> for SubmissionRequest {
    /// Resolved limits and policy carry over, so re-admission yields the same submission
    fn from(submission: Submission) -> Self {
        Self {
            code: submission.code,
            language: submission.language,
            mode: submission.mode,
            test_cases: submission.test_cases,
            time_limit: Some(submission.time_limit),
            memory_limit: Some(submission.memory_limit),
            entry_point: submission.entry_point,
            float_tolerance: submission.float_tolerance,
            policy: Some(submission.policy),
        }
    }
}

/// Outcome of one test case (or of the single FullCode run)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub index: usize,
    pub status: JudgeStatus,
    pub passed: bool,
    pub actual_output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    /// Seconds
    pub execution_time: f64,
    /// Megabytes
    pub memory_usage: f64,
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_excerpt: Option<String>,
    pub timed_out: bool,
    pub killed_for_memory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ExecutionResult {
    /// Blank result for a case that produced no run
    pub fn empty(index: usize, status: JudgeStatus) -> Self {
        Self {
            index,
            status,
            passed: status == JudgeStatus::Accepted,
            actual_output: String::new(),
            expected_output: None,
            execution_time: 0.0,
            memory_usage: 0.0,
            exit_code: None,
            stderr_excerpt: None,
            timed_out: false,
            killed_for_memory: false,
            error_message: None,
        }
    }

    pub fn skipped(index: usize) -> Self {
        Self::empty(index, JudgeStatus::Skipped)
    }

    pub fn system_error(index: usize, message: impl Into<String>) -> Self {
        let mut result = Self::empty(index, JudgeStatus::SystemError);
        result.error_message = Some(message.into());
        result
    }
}

/// Final judgment for a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub task_id: Uuid,
    pub status: JudgeStatus,
    /// Seconds, slowest test case
    pub execution_time: f64,
    /// Megabytes, peak across test cases
    pub memory_usage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub test_case_results: Vec<ExecutionResult>,
    pub passed_cases: usize,
    pub total_cases: usize,
}

impl Verdict {
    /// Verdict for a submission that never reached execution
    pub fn without_runs(task_id: Uuid, status: JudgeStatus, message: impl Into<String>) -> Self {
        Self {
            task_id,
            status,
            execution_time: 0.0,
            memory_usage: 0.0,
            error_message: Some(message.into()),
            test_case_results: Vec::new(),
            passed_cases: 0,
            total_cases: 0,
        }
    }
}

/// Lifecycle of a task: queued -> running -> completed | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    /// Terminal state for verdicts caused by a judge-internal fault
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What the task store keeps per task id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: Uuid,
    pub status: TaskStatus,
    /// Unix seconds
    pub submitted_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

impl TaskRecord {
    pub fn queued(task_id: Uuid) -> Self {
        let submitted_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            task_id,
            status: TaskStatus::Queued,
            submitted_at,
            verdict: None,
        }
    }
}
