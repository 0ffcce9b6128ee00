//! Mini Judge - resource-limited execution and judging of untrusted submissions
//!
//! A submission is adapted to its judge mode, run once per test case in a
//! sandboxed subprocess, compared against the expected output and folded into
//! a single verdict. The [`coordinator::Coordinator`] bounds how many
//! submissions run at once and tracks each task through a [`store::TaskStore`].

pub mod adapter;
pub mod aggregator;
pub mod checker;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod jobs;
pub mod languages;
pub mod redis_manager;
pub mod runner;
pub mod sandbox;
pub mod store;

pub use config::JudgeConfig;
pub use coordinator::{Coordinator, HealthSnapshot};
pub use crate::core::{JudgeStatus, Submission, SubmissionRequest, TaskRecord, TaskStatus, Verdict};
pub use error::{AdaptError, JudgeError};
pub use jobs::judger::Judge;
