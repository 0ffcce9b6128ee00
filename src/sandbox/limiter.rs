//! Resource limiter
//!
//! Runs one command as the leader of a fresh process group and enforces:
//! - a wall-clock deadline (watchdog kills the whole group),
//! - a resident memory ceiling sampled from procfs over the group,
//! - rlimits set in the child before exec (CPU, address space, processes,
//!   open files, file size, no core dumps).
//!
//! Every exit path, including dropping the future, kills the group. The judge
//! registers as a child subreaper so that killed grandchildren are reparented
//! here and reaped instead of lingering as zombies under init.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::sync::Once;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::resource::{getrlimit, setrlimit, Resource};
use nix::sys::prctl;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{setpgid, Pid};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::config::{LimiterConfig, Limits};
use super::procfs;
use crate::error::JudgeError;
use crate::runner::CommandSpec;

/// How a limited run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitOutcome {
    /// The process exited on its own (any exit code or signal)
    Completed,
    /// Killed by the watchdog, or by RLIMIT_CPU
    TimedOut,
    /// Killed after the group's resident memory passed the limit
    MemoryExceeded,
}

/// Raw result of a limited run
#[derive(Debug, Clone)]
pub struct LimitedRun {
    pub outcome: LimitOutcome,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// stdout or stderr hit the output cap
    pub output_truncated: bool,
    pub wall_time: Duration,
    /// Highest sampled resident memory of the group, in KB
    pub peak_memory_kb: u64,
}

/// Lifecycle of the child process group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Spawned,
    Running,
    Terminating,
    Reaped,
}

/// Kills the process group unless it has been reaped
struct ProcessGuard {
    pgid: Pid,
    state: ProcessState,
}

impl ProcessGuard {
    fn new(pid: u32) -> Self {
        Self {
            pgid: Pid::from_raw(pid as i32),
            state: ProcessState::Spawned,
        }
    }

    fn running(&mut self) {
        if self.state == ProcessState::Spawned {
            self.state = ProcessState::Running;
        }
    }

    fn terminate(&mut self) {
        if self.state == ProcessState::Reaped {
            return;
        }
        kill_group(self.pgid);
        self.state = ProcessState::Terminating;
    }

    fn reaped(&mut self) {
        self.state = ProcessState::Reaped;
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if self.state != ProcessState::Reaped {
            debug!(
                "Process group {} dropped in state {:?}, killing",
                self.pgid, self.state
            );
            kill_group(self.pgid);
        }
    }
}

fn kill_group(pgid: Pid) {
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
    }
}

/// rlimits applied in the child between fork and exec
#[derive(Debug, Clone, Copy)]
struct RlimitSet {
    cpu_secs: u64,
    memory_bytes: u64,
    processes: u64,
    open_files: u64,
    fsize_bytes: u64,
}

impl From<&Limits> for RlimitSet {
    fn from(limits: &Limits) -> Self {
        Self {
            cpu_secs: limits.cpu_seconds(),
            memory_bytes: limits.memory_bytes,
            processes: limits.processes,
            open_files: limits.open_files,
            fsize_bytes: limits.fsize_bytes,
        }
    }
}

impl RlimitSet {
    /// Runs in the forked child: only async-signal-safe calls
    fn apply(&self) -> io::Result<()> {
        setpgid(Pid::from_raw(0), Pid::from_raw(0))?;
        lower(Resource::RLIMIT_CPU, self.cpu_secs, self.cpu_secs + 1)?;
        lower(Resource::RLIMIT_AS, self.memory_bytes, self.memory_bytes)?;
        if self.processes > 0 {
            lower(Resource::RLIMIT_NPROC, self.processes, self.processes)?;
        }
        lower(Resource::RLIMIT_NOFILE, self.open_files, self.open_files)?;
        lower(Resource::RLIMIT_FSIZE, self.fsize_bytes, self.fsize_bytes)?;
        lower(Resource::RLIMIT_CORE, 0, 0)?;
        Ok(())
    }
}

/// setrlimit that never tries to raise the current hard limit
fn lower(resource: Resource, soft: u64, hard: u64) -> io::Result<()> {
    let (_, current_hard) = getrlimit(resource)?;
    let hard = hard.min(current_hard);
    setrlimit(resource, soft.min(hard), hard)?;
    Ok(())
}

/// Poll interval while waiting for a killed group to disappear
const REAP_POLL: Duration = Duration::from_millis(5);

fn become_subreaper() {
    static SUBREAPER: Once = Once::new();
    SUBREAPER.call_once(|| {
        if let Err(e) = prctl::set_child_subreaper(true) {
            warn!("Failed to become child subreaper, orphans go to init: {}", e);
        }
    });
}

/// Reap every exited child of ours that belongs to group `pgid`
fn reap_exited(pgid: i32) {
    loop {
        match waitpid(Pid::from_raw(-pgid), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(_) => return,
            Ok(_) => continue,
        }
    }
}

pub struct ResourceLimiter {
    config: LimiterConfig,
}

impl ResourceLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        become_subreaper();
        Self { config }
    }

    /// Run `command` with `stdin` under `limits`
    ///
    /// `Err` only for judge-side faults (spawn or wait failures); anything the
    /// program itself does is reported in the returned [`LimitedRun`].
    pub async fn run(
        &self,
        command: &CommandSpec,
        stdin: &[u8],
        limits: &Limits,
    ) -> Result<LimitedRun, JudgeError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .env_clear()
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.work_dir {
            cmd.current_dir(dir);
        }

        let rlimits = RlimitSet::from(limits);
        // SAFETY: the closure only issues setpgid/getrlimit/setrlimit syscalls
        unsafe {
            cmd.pre_exec(move || rlimits.apply());
        }

        let mut child = cmd.spawn().map_err(JudgeError::Spawn)?;
        let start = Instant::now();
        let pid = child
            .id()
            .ok_or_else(|| JudgeError::Limiter("child has no pid after spawn".into()))?;
        let mut guard = ProcessGuard::new(pid);
        let pgid = pid as i32;

        debug!("Spawned {} as process group {}", command.program, pgid);

        let stdin_task = child.stdin.take().map(|mut pipe| {
            let data = stdin.to_vec();
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(&data).await {
                    if e.kind() != io::ErrorKind::BrokenPipe {
                        debug!("Failed to write stdin: {}", e);
                    }
                }
            })
        });
        let cap = self.config.max_output_bytes;
        let stdout_task = child.stdout.take().map(|pipe| tokio::spawn(read_capped(pipe, cap)));
        let stderr_task = child.stderr.take().map(|pipe| tokio::spawn(read_capped(pipe, cap)));

        guard.running();

        let deadline = tokio::time::sleep(limits.time_limit);
        tokio::pin!(deadline);
        let mut sampler = tokio::time::interval(self.config.sample_interval);
        sampler.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let memory_limit_kb = limits.memory_kb();
        let mut peak_memory_kb = 0u64;

        let (mut outcome, exited) = loop {
            tokio::select! {
                status = child.wait() => {
                    let status = status.map_err(|e| {
                        JudgeError::Limiter(format!("waiting for process group {}: {}", pgid, e))
                    })?;
                    break (LimitOutcome::Completed, Some(status));
                }
                _ = &mut deadline => {
                    debug!("Process group {} hit the {:?} deadline", pgid, limits.time_limit);
                    guard.terminate();
                    break (LimitOutcome::TimedOut, None);
                }
                _ = sampler.tick() => {
                    let rss_kb = sample_group(pgid).await;
                    peak_memory_kb = peak_memory_kb.max(rss_kb);
                    if rss_kb > memory_limit_kb {
                        debug!(
                            "Process group {} uses {}KB, over the {}KB limit",
                            pgid, rss_kb, memory_limit_kb
                        );
                        guard.terminate();
                        break (LimitOutcome::MemoryExceeded, None);
                    }
                }
            }
        };
        let wall_time = start.elapsed();

        // Clears anything the leader left behind in its group
        guard.terminate();
        let status = match exited {
            Some(status) => status,
            None => self.reap(&mut child).await?,
        };

        if let Some(task) = stdin_task {
            task.abort();
        }
        let (stdout, stdout_truncated) = self.collect(stdout_task).await;
        let (stderr, stderr_truncated) = self.collect(stderr_task).await;
        self.reap_group(pgid).await;
        guard.reaped();

        let signal = status.signal();
        if outcome == LimitOutcome::Completed {
            if signal == Some(Signal::SIGXCPU as i32) || wall_time > limits.time_limit {
                outcome = LimitOutcome::TimedOut;
            } else if peak_memory_kb > memory_limit_kb {
                outcome = LimitOutcome::MemoryExceeded;
            }
        }

        Ok(LimitedRun {
            outcome,
            exit_code: status.code(),
            signal,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            output_truncated: stdout_truncated || stderr_truncated,
            wall_time,
            peak_memory_kb,
        })
    }

    async fn reap(&self, child: &mut Child) -> Result<ExitStatus, JudgeError> {
        match tokio::time::timeout(self.config.kill_grace, child.wait()).await {
            Ok(status) => status.map_err(|e| JudgeError::Limiter(format!("reaping child: {}", e))),
            Err(_) => {
                warn!("Child did not exit within {:?} of SIGKILL", self.config.kill_grace);
                let _ = child.start_kill();
                child
                    .wait()
                    .await
                    .map_err(|e| JudgeError::Limiter(format!("reaping child: {}", e)))
            }
        }
    }

    /// Wait until no member of the group is left, reaping orphans reparented to us
    async fn reap_group(&self, pgid: i32) {
        let deadline = Instant::now() + self.config.kill_grace;
        loop {
            reap_exited(pgid);
            let remaining = tokio::task::spawn_blocking(move || procfs::group_pids(pgid))
                .await
                .unwrap_or_default();
            if remaining.is_empty() {
                return;
            }
            if Instant::now() >= deadline {
                warn!(
                    "Process group {} still has members {:?} after {:?}",
                    pgid, remaining, self.config.kill_grace
                );
                return;
            }
            kill_group(Pid::from_raw(pgid));
            tokio::time::sleep(REAP_POLL).await;
        }
    }

    async fn collect(&self, task: Option<JoinHandle<(Vec<u8>, bool)>>) -> (Vec<u8>, bool) {
        let mut task = match task {
            Some(task) => task,
            None => return (Vec::new(), false),
        };
        match tokio::time::timeout(self.config.kill_grace, &mut task).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Output reader failed: {}", e);
                (Vec::new(), false)
            }
            Err(_) => {
                // a process outside the group still holds the pipe
                task.abort();
                (Vec::new(), true)
            }
        }
    }
}

async fn sample_group(pgid: i32) -> u64 {
    tokio::task::spawn_blocking(move || procfs::group_rss_kb(pgid))
        .await
        .unwrap_or(0)
}

/// Read to EOF, keeping at most `cap` bytes; keeps draining so the writer never blocks
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> (Vec<u8>, bool) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = cap.saturating_sub(buf.len());
                if n > room {
                    truncated = true;
                }
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    (buf, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> ResourceLimiter {
        ResourceLimiter::new(LimiterConfig {
            max_output_bytes: 1024,
            ..LimiterConfig::default()
        })
    }

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("/bin/sh")
            .with_args(["-c", script])
            .with_env([("PATH", "/usr/local/bin:/usr/bin:/bin")])
    }

    fn limits(time_ms: u64) -> Limits {
        Limits::new(Duration::from_millis(time_ms), 256).with_processes(0)
    }

    #[tokio::test]
    async fn test_echo_stdin() {
        let run = limiter()
            .run(&sh("cat"), b"hello judge\n", &limits(2000))
            .await
            .unwrap();
        assert_eq!(run.outcome, LimitOutcome::Completed);
        assert_eq!(run.exit_code, Some(0));
        assert_eq!(run.stdout, "hello judge\n");
        assert!(!run.output_truncated);
    }

    #[tokio::test]
    async fn test_exit_code_and_stderr() {
        let run = limiter()
            .run(&sh("echo oops >&2; exit 3"), b"", &limits(2000))
            .await
            .unwrap();
        assert_eq!(run.outcome, LimitOutcome::Completed);
        assert_eq!(run.exit_code, Some(3));
        assert_eq!(run.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_deadline_kills_group() {
        let run = limiter()
            .run(&sh("sleep 5 & sleep 5; wait"), b"", &limits(300))
            .await
            .unwrap();
        assert_eq!(run.outcome, LimitOutcome::TimedOut);
        assert!(run.wall_time < Duration::from_millis(1300), "{:?}", run.wall_time);
        assert_eq!(run.signal, Some(Signal::SIGKILL as i32));
    }

    fn proc_exists(pid: i32) -> bool {
        std::path::Path::new(&format!("/proc/{}", pid)).exists()
    }

    #[tokio::test]
    async fn test_no_process_survives_deadline() {
        let run = limiter()
            .run(&sh("sleep 30 & echo $!; echo $$; wait"), b"", &limits(300))
            .await
            .unwrap();
        assert_eq!(run.outcome, LimitOutcome::TimedOut);

        let pids: Vec<i32> = run
            .stdout
            .split_whitespace()
            .map(|p| p.parse().unwrap())
            .collect();
        assert_eq!(pids.len(), 2, "{:?}", run.stdout);
        for pid in pids {
            assert!(!proc_exists(pid), "pid {} still present", pid);
        }
    }

    #[tokio::test]
    async fn test_background_child_killed_after_leader_exits() {
        let run = limiter()
            .run(&sh("sleep 30 & echo $!"), b"", &limits(2000))
            .await
            .unwrap();
        assert_eq!(run.outcome, LimitOutcome::Completed);
        let pid: i32 = run.stdout.trim().parse().unwrap();
        assert!(!proc_exists(pid));
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let run = limiter()
            .run(&sh("yes judge | head -c 100000"), b"", &limits(2000))
            .await
            .unwrap();
        assert_eq!(run.stdout.len(), 1024);
        assert!(run.output_truncated);
    }

    #[tokio::test]
    async fn test_env_is_cleared() {
        std::env::set_var("MINI_JUDGE_LEAK_CHECK", "leaked");
        let run = limiter()
            .run(&sh("echo \"[$MINI_JUDGE_LEAK_CHECK]\""), b"", &limits(2000))
            .await
            .unwrap();
        assert_eq!(run.stdout.trim(), "[]");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_judge_error() {
        let cmd = CommandSpec::new("/nonexistent/interpreter");
        let err = limiter().run(&cmd, b"", &limits(1000)).await.unwrap_err();
        assert!(matches!(err, JudgeError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_unread_stdin_does_not_hang() {
        let big = vec![b'x'; 4 * 1024 * 1024];
        let run = tokio_test::assert_ok!(limiter().run(&sh("exit 0"), &big, &limits(2000)).await);
        assert_eq!(run.outcome, LimitOutcome::Completed);
    }

    #[test]
    fn test_guard_state_transitions() {
        // pid that cannot exist as a group, killpg returns ESRCH
        let mut guard = ProcessGuard::new(i32::MAX as u32);
        assert_eq!(guard.state, ProcessState::Spawned);
        guard.running();
        assert_eq!(guard.state, ProcessState::Running);
        guard.terminate();
        assert_eq!(guard.state, ProcessState::Terminating);
        guard.reaped();
        guard.terminate();
        assert_eq!(guard.state, ProcessState::Reaped);
    }
}
