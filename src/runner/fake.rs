//! Scripted runner for tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{RunLimits, RunOutcome, RunStatus, Runner};
use crate::core::Language;
use crate::error::JudgeError;

type Script = dyn Fn(&str, &str) -> Result<RunOutcome, JudgeError> + Send + Sync;

/// Answers each run from a closure over (program, stdin) and counts concurrency
pub struct FakeRunner {
    script: Box<Script>,
    delay: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl FakeRunner {
    pub fn new(
        script: impl Fn(&str, &str) -> Result<RunOutcome, JudgeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

pub fn outcome(status: RunStatus, stdout: &str, stderr: &str) -> RunOutcome {
    RunOutcome {
        status,
        exit_code: match status {
            RunStatus::Exited(code) => Some(code),
            _ => None,
        },
        time_secs: 0.01,
        memory_kb: 4096,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        output_truncated: false,
    }
}

#[async_trait]
impl Runner for FakeRunner {
    async fn run(
        &self,
        _language: Language,
        program: &str,
        stdin: &str,
        _limits: &RunLimits,
    ) -> Result<RunOutcome, JudgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = (self.script)(program, stdin);
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
