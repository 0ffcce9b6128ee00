//! Judge configuration
//!
//! Loaded from environment variables (a `.env` file is honoured by the binary).
//! Every field has a default so an empty environment yields a working judge.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::core::FailurePolicy;

#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Redis connection URL for the task store and submission queue
    pub redis_url: String,
    /// Maximum number of submissions executing at once
    pub concurrency: usize,
    /// Parent directory for per-run scratch directories
    pub scratch_root: PathBuf,
    /// Per-test time limit when the submission gives none (seconds)
    pub default_time_limit: f64,
    /// Memory limit when the submission gives none (MB)
    pub default_memory_limit: u64,
    pub max_time_limit: f64,
    pub max_memory_limit: u64,
    /// Captured stdout/stderr is cut off after this many bytes
    pub max_output_bytes: usize,
    /// RLIMIT_NPROC for sandboxed processes
    pub max_processes: u64,
    /// How often resident memory is sampled
    pub memory_sample_interval: Duration,
    /// Allowed overshoot past the time limit while the process tree is killed and reaped
    pub kill_grace: Duration,
    pub failure_policy: FailurePolicy,
    /// Default numeric tolerance for output comparison; `None` means exact match
    pub float_tolerance: Option<f64>,
    /// How long finished task records stay in the store
    pub result_ttl_secs: u64,
    /// How often the store is scanned for tasks whose worker went away
    pub recover_interval: Duration,
    /// Optional languages.toml override
    pub languages_path: Option<PathBuf>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            concurrency: default_concurrency(),
            scratch_root: std::env::temp_dir().join("mini_judge"),
            default_time_limit: 1.0,
            default_memory_limit: 256,
            max_time_limit: 10.0,
            max_memory_limit: 1024,
            max_output_bytes: 1024 * 1024,
            max_processes: 64,
            memory_sample_interval: Duration::from_millis(20),
            kill_grace: Duration::from_millis(500),
            failure_policy: FailurePolicy::ShortCircuit,
            float_tolerance: None,
            result_ttl_secs: 3600,
            recover_interval: Duration::from_secs(60),
            languages_path: None,
        }
    }
}

impl JudgeConfig {
    /// Build the configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            concurrency: env_parse("JUDGE_CONCURRENCY")?.unwrap_or(defaults.concurrency),
            scratch_root: std::env::var("JUDGE_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_root),
            default_time_limit: env_parse("JUDGE_DEFAULT_TIME_LIMIT")?
                .unwrap_or(defaults.default_time_limit),
            default_memory_limit: env_parse("JUDGE_DEFAULT_MEMORY_LIMIT")?
                .unwrap_or(defaults.default_memory_limit),
            max_time_limit: env_parse("JUDGE_MAX_TIME_LIMIT")?.unwrap_or(defaults.max_time_limit),
            max_memory_limit: env_parse("JUDGE_MAX_MEMORY_LIMIT")?
                .unwrap_or(defaults.max_memory_limit),
            max_output_bytes: env_parse("JUDGE_MAX_OUTPUT_BYTES")?
                .unwrap_or(defaults.max_output_bytes),
            max_processes: env_parse("JUDGE_MAX_PROCESSES")?.unwrap_or(defaults.max_processes),
            memory_sample_interval: env_parse("JUDGE_MEMORY_SAMPLE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.memory_sample_interval),
            kill_grace: env_parse("JUDGE_KILL_GRACE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.kill_grace),
            failure_policy: env_parse("JUDGE_FAILURE_POLICY")?.unwrap_or(defaults.failure_policy),
            float_tolerance: env_parse("JUDGE_FLOAT_TOLERANCE")?.or(defaults.float_tolerance),
            result_ttl_secs: env_parse("JUDGE_RESULT_TTL_SECS")?
                .unwrap_or(defaults.result_ttl_secs),
            recover_interval: env_parse("JUDGE_RECOVER_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.recover_interval),
            languages_path: std::env::var("LANGUAGES_CONFIG").ok().map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("JUDGE_CONCURRENCY must be at least 1");
        }
        if !self.max_time_limit.is_finite() || self.max_time_limit <= 0.0 {
            anyhow::bail!(
                "JUDGE_MAX_TIME_LIMIT must be a positive finite number, got {}",
                self.max_time_limit
            );
        }
        if !self.default_time_limit.is_finite()
            || self.default_time_limit <= 0.0
            || self.default_time_limit > self.max_time_limit
        {
            anyhow::bail!(
                "default time limit {}s must be within (0, {}]",
                self.default_time_limit,
                self.max_time_limit
            );
        }
        if self.default_memory_limit == 0 || self.default_memory_limit > self.max_memory_limit {
            anyhow::bail!(
                "default memory limit {}MB must be within (0, {}]",
                self.default_memory_limit,
                self.max_memory_limit
            );
        }
        if self.memory_sample_interval.is_zero() {
            anyhow::bail!("JUDGE_MEMORY_SAMPLE_MS must be positive");
        }
        if let Some(tol) = self.float_tolerance {
            if !tol.is_finite() || tol < 0.0 {
                anyhow::bail!("JUDGE_FLOAT_TOLERANCE must be a non-negative number, got {}", tol);
            }
        }
        if self.recover_interval.is_zero() {
            anyhow::bail!("JUDGE_RECOVER_INTERVAL_SECS must be positive");
        }
        Ok(())
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {}", key, raw)),
        _ => Ok(None),
    }
}
