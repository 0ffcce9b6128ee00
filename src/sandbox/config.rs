//! Limiter configuration and per-run limits

use std::time::Duration;

use crate::config::JudgeConfig;

/// Settings shared by every run of a limiter
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// stdout and stderr are each cut off after this many bytes
    pub max_output_bytes: usize,
    /// Interval between resident memory samples
    pub sample_interval: Duration,
    /// How long to wait for the group to die and the pipes to close after a kill
    pub kill_grace: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: 1024 * 1024,
            sample_interval: Duration::from_millis(20),
            kill_grace: Duration::from_millis(500),
        }
    }
}

impl From<&JudgeConfig> for LimiterConfig {
    fn from(config: &JudgeConfig) -> Self {
        Self {
            max_output_bytes: config.max_output_bytes,
            sample_interval: config.memory_sample_interval,
            kill_grace: config.kill_grace,
        }
    }
}

/// Limits applied to one process group
#[derive(Debug, Clone)]
pub struct Limits {
    /// Wall-clock limit enforced by the watchdog
    pub time_limit: Duration,
    /// Address space and resident memory ceiling
    pub memory_bytes: u64,
    /// RLIMIT_NPROC; 0 leaves it unset
    pub processes: u64,
    pub open_files: u64,
    pub fsize_bytes: u64,
}

impl Limits {
    pub fn new(time_limit: Duration, memory_mb: u64) -> Self {
        Self {
            time_limit,
            memory_bytes: memory_mb * 1024 * 1024,
            processes: 64,
            open_files: 256,
            fsize_bytes: 1024 * 1024,
        }
    }

    pub fn with_processes(mut self, processes: u64) -> Self {
        self.processes = processes;
        self
    }

    pub fn with_fsize_bytes(mut self, fsize_bytes: u64) -> Self {
        self.fsize_bytes = fsize_bytes;
        self
    }

    /// RLIMIT_CPU in whole seconds: ceil(time limit) + 1
    pub fn cpu_seconds(&self) -> u64 {
        self.time_limit.as_secs_f64().ceil() as u64 + 1
    }

    pub fn memory_kb(&self) -> u64 {
        self.memory_bytes / 1024
    }
}
