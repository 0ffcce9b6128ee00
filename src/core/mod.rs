//! Core types shared by every stage of the judge

pub mod types;
pub mod utils;
pub mod verdict;

pub use types::{
    ExecutionResult, FailurePolicy, JudgeMode, Language, Payload, Submission, SubmissionRequest,
    TaskRecord, TaskStatus, TestCase, Verdict,
};
pub use verdict::JudgeStatus;
