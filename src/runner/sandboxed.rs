//! Sandboxed runner implementation
//!
//! Executes untrusted code in a private scratch directory under the resource limiter.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{CommandSpec, RunLimits, RunOutcome, RunStatus, Runner};
use crate::config::JudgeConfig;
use crate::core::utils::sanitize_message;
use crate::core::Language;
use crate::error::JudgeError;
use crate::languages::LanguageRegistry;
use crate::sandbox::{LimitOutcome, LimitedRun, Limits, ResourceLimiter, ScratchDir};

const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Runner that executes code under rlimits, a watchdog and memory sampling
pub struct SandboxedRunner {
    languages: Arc<LanguageRegistry>,
    limiter: ResourceLimiter,
    /// Parent of the per-run scratch directories
    scratch_root: PathBuf,
    max_processes: u64,
    fsize_bytes: u64,
}

impl SandboxedRunner {
    pub fn new(languages: Arc<LanguageRegistry>, config: &JudgeConfig) -> Self {
        Self {
            languages,
            limiter: ResourceLimiter::new(config.into()),
            scratch_root: config.scratch_root.clone(),
            max_processes: config.max_processes,
            fsize_bytes: config.max_output_bytes as u64,
        }
    }

    /// Run a program in a fresh scratch directory
    pub async fn execute(
        &self,
        language: Language,
        program: &str,
        stdin: &str,
        limits: &RunLimits,
    ) -> Result<RunOutcome, JudgeError> {
        let lang_config = self
            .languages
            .get(language)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(language.to_string()))?;

        let scratch = ScratchDir::create(&self.scratch_root)?;
        scratch.write_file(&lang_config.source_file, program).await?;

        let scratch_path = scratch.path().to_string_lossy().into_owned();
        let mut env = lang_config.env.clone();
        env.push((
            "PATH".to_string(),
            std::env::var("PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string()),
        ));
        env.push(("HOME".to_string(), scratch_path.clone()));
        env.push(("TMPDIR".to_string(), scratch_path));

        let cmd = CommandSpec::from_vec(&lang_config.run_command)
            .with_env(env)
            .with_work_dir(scratch.path());

        let time_secs = lang_config.calculate_time_limit(limits.time_secs);
        let memory_mb = lang_config.calculate_memory_limit(limits.memory_mb);
        let time_limit = Duration::try_from_secs_f64(time_secs).map_err(|e| {
            JudgeError::Limiter(format!("time limit {}s out of range: {}", time_secs, e))
        })?;
        let sandbox_limits = Limits::new(time_limit, memory_mb)
            .with_processes(self.max_processes)
            .with_fsize_bytes(self.fsize_bytes);

        let run = self
            .limiter
            .run(&cmd, stdin.as_bytes(), &sandbox_limits)
            .await?;

        let status = classify(&run);
        debug!(
            "Run finished: status={:?}, time={:.3}s, peak_memory={}KB",
            status,
            run.wall_time.as_secs_f64(),
            run.peak_memory_kb
        );

        let stderr = sanitize_message(&run.stderr, scratch.path());
        Ok(RunOutcome {
            status,
            exit_code: run.exit_code,
            time_secs: run.wall_time.as_secs_f64(),
            memory_kb: run.peak_memory_kb,
            stdout: run.stdout,
            stderr,
            output_truncated: run.output_truncated,
        })
    }
}

#[async_trait]
impl Runner for SandboxedRunner {
    async fn run(
        &self,
        language: Language,
        program: &str,
        stdin: &str,
        limits: &RunLimits,
    ) -> Result<RunOutcome, JudgeError> {
        self.execute(language, program, stdin, limits).await
    }
}

/// Map a raw limited run to a status without looking at the output
fn classify(run: &LimitedRun) -> RunStatus {
    match run.outcome {
        LimitOutcome::TimedOut => RunStatus::TimeLimitExceeded,
        LimitOutcome::MemoryExceeded => RunStatus::MemoryLimitExceeded,
        LimitOutcome::Completed => match (run.exit_code, run.signal) {
            (Some(0), _) => RunStatus::Exited(0),
            _ if is_memory_error(&run.stderr) => RunStatus::MemoryLimitExceeded,
            (Some(code), _) => RunStatus::Exited(code),
            (None, Some(signal)) => RunStatus::Signaled(signal),
            (None, None) => RunStatus::Exited(-1),
        },
    }
}

/// Allocation failure under RLIMIT_AS, as reported by the interpreter.
/// Only the final line counts, which is where an uncaught exception ends up.
fn is_memory_error(stderr: &str) -> bool {
    let Some(last) = stderr.lines().rev().find(|line| !line.trim().is_empty()) else {
        return false;
    };
    last.starts_with("MemoryError") || last.contains("Cannot allocate memory")
}
