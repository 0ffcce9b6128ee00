//! Error types
//!
//! `JudgeError` is always a fault of the judge host, never of the submitted code.
//! `AdaptError` is a fault of the submission found before anything runs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JudgeError {
    /// Scratch directory could not be created or written
    #[error("scratch directory unavailable: {0}")]
    Scratch(#[source] std::io::Error),

    /// The sandboxed process could not be started
    #[error("failed to spawn sandboxed process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Waiting on or killing the process failed
    #[error("resource limiter failure: {0}")]
    Limiter(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Rejected at admission, before a task id is handed out
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("task store error: {0}")]
    Store(String),

    #[error("coordinator is shut down")]
    ShuttingDown,
}

/// Submission could not be turned into a runnable program; reported as compile_error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdaptError {
    #[error("no entry point found: define `class Solution` with one public method or a single top-level function")]
    MissingEntryPoint,

    #[error("ambiguous entry point, candidates: {}", .0.join(", "))]
    AmbiguousEntryPoint(Vec<String>),

    #[error("entry point `{0}` is not defined")]
    UnknownEntryPoint(String),

    #[error("test case {index}: arguments must be a JSON array ({reason})")]
    InvalidArguments { index: usize, reason: String },
}

impl From<redis::RedisError> for JudgeError {
    fn from(e: redis::RedisError) -> Self {
        JudgeError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for JudgeError {
    fn from(e: serde_json::Error) -> Self {
        JudgeError::Store(format!("serialization error: {}", e))
    }
}

impl JudgeError {
    /// Short message safe to show to the submitter
    pub fn public_message(&self) -> String {
        match self {
            JudgeError::Scratch(_) => "Judge error: scratch directory unavailable".to_string(),
            JudgeError::Spawn(_) => "Judge error: failed to start program".to_string(),
            JudgeError::Limiter(_) => "Judge error: resource limiter failure".to_string(),
            JudgeError::Store(_) => "Judge error: task store unavailable".to_string(),
            other => other.to_string(),
        }
    }
}
