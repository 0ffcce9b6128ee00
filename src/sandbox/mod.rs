//! Sandbox module - Process-level resource limiting
//!
//! This module handles:
//! - Private scratch directories per execution
//! - Process groups with rlimits applied before exec
//! - Wall-clock watchdog and resident memory sampling
//! - Guaranteed kill and reap of the whole process group
//!
//! The sandbox module does NOT:
//! - Interpret verdicts (that's the judge's job)
//! - Know about languages or judge modes
//! - Compare outputs

pub mod config;
pub mod limiter;
pub mod procfs;
pub mod scratch;

pub use config::{LimiterConfig, Limits};
pub use limiter::{LimitOutcome, LimitedRun, ProcessState, ResourceLimiter};
pub use scratch::ScratchDir;
