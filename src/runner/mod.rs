//! Runner module - Execution abstraction layer
//!
//! A runner takes a program text and stdin, executes it under limits and
//! returns what happened. It does NOT:
//! - Compare outputs or determine verdicts
//! - Know about judge modes or test cases

pub mod sandboxed;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use std::path::Path;

use crate::core::Language;
use crate::error::JudgeError;

/// Command specification for execution
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program path or name
    pub program: String,
    /// Arguments to the program
    pub args: Vec<String>,
    /// Complete environment of the child
    pub env: Vec<(String, String)>,
    /// Working directory
    pub work_dir: Option<std::path::PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            work_dir: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(|a| a.into()).collect();
        self
    }

    pub fn with_env(
        mut self,
        env: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.env = env.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn with_work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.work_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Create from a command vector (first element is program, rest are args)
    pub fn from_vec(cmd: &[String]) -> Self {
        let mut iter = cmd.iter();
        let program = iter.next().cloned().unwrap_or_default();
        Self::new(program).with_args(iter.cloned())
    }
}

/// Resource limits for one execution, before language adjustment
#[derive(Debug, Clone, PartialEq)]
pub struct RunLimits {
    /// Seconds
    pub time_secs: f64,
    pub memory_mb: u64,
}

impl RunLimits {
    pub fn new(time_secs: f64, memory_mb: u64) -> Self {
        Self {
            time_secs,
            memory_mb,
        }
    }
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            time_secs: 1.0,
            memory_mb: 256,
        }
    }
}

/// Execution status (raw, no verdict interpretation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Program exited normally with given exit code
    Exited(i32),
    /// Killed by a signal it was not sent by the judge
    Signaled(i32),
    TimeLimitExceeded,
    MemoryLimitExceeded,
}

impl RunStatus {
    /// Check if execution was successful (exited with code 0)
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Exited(0))
    }
}

/// Outcome of running a program
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    /// Wall time in seconds
    pub time_secs: f64,
    /// Peak resident memory in KB
    pub memory_kb: u64,
    pub stdout: String,
    /// Scratch paths already removed
    pub stderr: String,
    pub output_truncated: bool,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn memory_mb(&self) -> f64 {
        self.memory_kb as f64 / 1024.0
    }
}

/// Runner trait for executing programs
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run `program` as `language` with `stdin` under `limits`
    ///
    /// `Err` means the judge failed, not the program.
    async fn run(
        &self,
        language: Language,
        program: &str,
        stdin: &str,
        limits: &RunLimits,
    ) -> Result<RunOutcome, JudgeError>;
}

pub use sandboxed::SandboxedRunner;
