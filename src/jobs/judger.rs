//! Judger module for processing submissions
//!
//! Adapts a submission to its mode, runs each invocation in the sandbox,
//! classifies the outcome and folds everything into a verdict.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, error, info};

use crate::adapter::{self, leetcode, Invocation, PreparedProgram};
use crate::aggregator::{aggregate, should_stop};
use crate::checker;
use crate::core::utils::{cached_regex, truncate_output, MAX_REPORTED_CHARS};
use crate::core::{ExecutionResult, JudgeMode, JudgeStatus, Submission, Verdict};
use crate::runner::{RunLimits, RunOutcome, RunStatus, Runner};

/// Judges submissions through a [`Runner`]
#[derive(Clone)]
pub struct Judge {
    runner: Arc<dyn Runner>,
}

impl Judge {
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self { runner }
    }

    /// Produce the verdict for `submission`; judge faults become `system_error`
    pub async fn judge(&self, submission: &Submission) -> Verdict {
        info!(
            "Judging task {}: language={}, mode={}, testcases={}",
            submission.task_id,
            submission.language,
            submission.mode,
            submission.test_cases.len()
        );

        let prepared = match adapter::prepare(submission) {
            Ok(prepared) => prepared,
            Err(e) => {
                info!("Task {} rejected before execution: {}", submission.task_id, e);
                return Verdict::without_runs(
                    submission.task_id,
                    JudgeStatus::CompileError,
                    e.to_string(),
                );
            }
        };

        if let Some(entry) = &prepared.harness {
            debug!("Task {} entry point: {}", submission.task_id, entry.name());
        }

        let limits = RunLimits::new(submission.time_limit, submission.memory_limit);
        let mut results = Vec::with_capacity(prepared.invocations.len());
        let mut error_message = None;
        let mut stopped = false;

        for invocation in &prepared.invocations {
            if stopped {
                results.push(ExecutionResult::skipped(invocation.index));
                continue;
            }

            let result = match self
                .runner
                .run(
                    submission.language,
                    &prepared.program_text,
                    &invocation.stdin,
                    &limits,
                )
                .await
            {
                Ok(outcome) => evaluate(submission, &prepared, invocation, &outcome),
                Err(e) => {
                    error!(
                        "Judge fault on task {} testcase {}: {}",
                        submission.task_id, invocation.index, e
                    );
                    let message = e.public_message();
                    error_message = Some(message.clone());
                    ExecutionResult::system_error(invocation.index, message)
                }
            };

            debug!(
                "Task {} testcase {}: {} ({:.3}s, {:.1}MB)",
                submission.task_id,
                invocation.index,
                result.status,
                result.execution_time,
                result.memory_usage
            );

            if should_stop(result.status, submission.policy) {
                stopped = true;
            }
            results.push(result);
        }

        let verdict = aggregate(submission.task_id, results, error_message);
        info!(
            "Task {} judged: verdict={}, passed={}/{}, max_time={:.3}s, max_memory={:.1}MB",
            verdict.task_id,
            verdict.status,
            verdict.passed_cases,
            verdict.total_cases,
            verdict.execution_time,
            verdict.memory_usage
        );
        verdict
    }
}

/// Turn one run into a test case result
fn evaluate(
    submission: &Submission,
    prepared: &PreparedProgram,
    invocation: &Invocation,
    outcome: &RunOutcome,
) -> ExecutionResult {
    let mut result = ExecutionResult::empty(invocation.index, JudgeStatus::Accepted);
    result.execution_time = outcome.time_secs;
    result.memory_usage = outcome.memory_mb();
    result.exit_code = outcome.exit_code;
    result.expected_output = invocation
        .expected
        .as_ref()
        .map(|e| truncate_output(&e.to_text(), MAX_REPORTED_CHARS));
    if !outcome.stderr.trim().is_empty() {
        result.stderr_excerpt = Some(truncate_output(outcome.stderr.trim(), MAX_REPORTED_CHARS));
    }

    // LeetCode compares the returned value; the user's own prints are only reported
    let returned = prepared
        .harness
        .as_ref()
        .and_then(|_| leetcode::extract_result(&outcome.stdout));
    let shown = match (&prepared.harness, returned) {
        (Some(_), Some(value)) => value.to_string(),
        (Some(_), None) => leetcode::user_output(&outcome.stdout),
        (None, _) => outcome.stdout.trim_end().to_string(),
    };
    result.actual_output = truncate_output(&shown, MAX_REPORTED_CHARS);

    let (status, message) = match outcome.status {
        RunStatus::TimeLimitExceeded => {
            result.timed_out = true;
            (
                JudgeStatus::TimeLimitExceeded,
                Some(format!("Time limit exceeded ({}s)", submission.time_limit)),
            )
        }
        RunStatus::MemoryLimitExceeded => {
            result.killed_for_memory = true;
            (
                JudgeStatus::MemoryLimitExceeded,
                Some(format!("Memory limit exceeded ({}MB)", submission.memory_limit)),
            )
        }
        RunStatus::Exited(0) => match (&invocation.expected, &prepared.harness) {
            (None, _) => (JudgeStatus::Accepted, None),
            (Some(_), Some(_)) if returned.is_none() => (
                JudgeStatus::RuntimeError,
                Some("Program exited before returning a value".to_string()),
            ),
            (Some(expected), _) => {
                let actual = returned.unwrap_or(&outcome.stdout);
                let check = checker::compare(
                    actual,
                    expected,
                    submission.mode,
                    submission.float_tolerance,
                );
                if check.passed {
                    (JudgeStatus::Accepted, None)
                } else {
                    (JudgeStatus::WrongAnswer, check.diagnostic)
                }
            }
        },
        RunStatus::Exited(code) => {
            let excerpt = truncate_output(outcome.stderr.trim(), MAX_REPORTED_CHARS);
            if is_load_time_syntax_error(&outcome.stderr) {
                (JudgeStatus::CompileError, Some(excerpt))
            } else if submission.mode == JudgeMode::Fullcode
                && code == 1
                && last_line(&outcome.stderr).starts_with("AssertionError")
            {
                (JudgeStatus::WrongAnswer, Some(excerpt))
            } else {
                (
                    JudgeStatus::RuntimeError,
                    Some(format!("Process exited with code {}\n{}", code, excerpt)),
                )
            }
        }
        RunStatus::Signaled(signal) => (
            JudgeStatus::RuntimeError,
            Some(format!("Process killed by signal {}", signal)),
        ),
    };

    result.status = status;
    result.passed = status == JudgeStatus::Accepted;
    result.error_message = message;
    result
}

/// Last non-empty line, where an uncaught exception is reported
fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
}

fn syntax_error_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(&RE, r"^(SyntaxError|IndentationError|TabError): ")
}

fn error_location_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(&RE, r#"^\s*File ".*", line \d+$"#)
}

/// The interpreter refused to load the program: the whole of stderr is one
/// location header followed by the syntax error, with no traceback.
fn is_load_time_syntax_error(stderr: &str) -> bool {
    if stderr.contains("Traceback (most recent call last)") {
        return false;
    }
    let first = stderr.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    let (Some(location), Some(error)) = (error_location_re(), syntax_error_re()) else {
        return false;
    };
    location.is_match(first) && error.is_match(last_line(stderr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FailurePolicy, Language, Payload, TestCase};
    use crate::error::JudgeError;
    use crate::runner::fake::{outcome, FakeRunner};
    use serde_json::json;
    use uuid::Uuid;

    fn submission(mode: JudgeMode, code: &str, cases: Vec<TestCase>) -> Submission {
        Submission {
            task_id: Uuid::new_v4(),
            code: code.to_string(),
            language: Language::Python,
            mode,
            test_cases: cases,
            time_limit: 1.0,
            memory_limit: 256,
            entry_point: None,
            float_tolerance: None,
            policy: FailurePolicy::ShortCircuit,
        }
    }

    /// Adds the two integers on stdin
    fn adder() -> FakeRunner {
        FakeRunner::new(|_, stdin| {
            let sum: i64 = stdin
                .split_whitespace()
                .filter_map(|t| t.parse::<i64>().ok())
                .sum();
            Ok(outcome(RunStatus::Exited(0), &format!("{}\n", sum), ""))
        })
    }

    fn judge(runner: FakeRunner) -> (Judge, Arc<FakeRunner>) {
        let runner = Arc::new(runner);
        (Judge::new(runner.clone()), runner)
    }

    #[tokio::test]
    async fn test_acm_accepted() {
        let (judge, _) = judge(adder());
        let sub = submission(
            JudgeMode::Acm,
            "a, b = map(int, input().split()); print(a + b)",
            vec![TestCase::new("1 2", "3"), TestCase::new("10 -4\n", "6\n")],
        );
        let verdict = judge.judge(&sub).await;
        assert_eq!(verdict.status, JudgeStatus::Accepted);
        assert_eq!(verdict.passed_cases, 2);
        assert!(verdict.test_case_results.iter().all(|r| r.passed));
    }

    #[tokio::test]
    async fn test_wrong_answer_short_circuits() {
        let (judge, runner) = judge(adder());
        let sub = submission(
            JudgeMode::Acm,
            "",
            vec![
                TestCase::new("1 1", "2"),
                TestCase::new("1 1", "3"),
                TestCase::new("2 2", "4"),
            ],
        );
        let verdict = judge.judge(&sub).await;
        assert_eq!(verdict.status, JudgeStatus::WrongAnswer);
        assert_eq!(runner.calls(), 2);
        let statuses: Vec<_> = verdict.test_case_results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![JudgeStatus::Accepted, JudgeStatus::WrongAnswer, JudgeStatus::Skipped]
        );
        assert_eq!(
            verdict.error_message.as_deref(),
            Some("line 1: expected `3`, got `2`")
        );
    }

    #[tokio::test]
    async fn test_run_all_reports_worst_status() {
        let (judge, runner) = judge(FakeRunner::new(|_, stdin| match stdin {
            "wa" => Ok(outcome(RunStatus::Exited(0), "nope", "")),
            "tle" => Ok(outcome(RunStatus::TimeLimitExceeded, "", "")),
            _ => Ok(outcome(RunStatus::Exited(0), "ok", "")),
        }));
        let mut sub = submission(
            JudgeMode::Acm,
            "",
            vec![
                TestCase::new("ok", "ok"),
                TestCase::new("wa", "ok"),
                TestCase::new("tle", "ok"),
                TestCase::new("ok", "ok"),
            ],
        );
        sub.policy = FailurePolicy::RunAll;
        let verdict = judge.judge(&sub).await;
        assert_eq!(runner.calls(), 4);
        assert_eq!(verdict.status, JudgeStatus::TimeLimitExceeded);
        assert_eq!(verdict.passed_cases, 2);
        assert!(verdict.test_case_results[2].timed_out);
    }

    #[tokio::test]
    async fn test_missing_entry_point_is_compile_error_without_runs() {
        let (judge, runner) = judge(adder());
        let sub = submission(
            JudgeMode::Leetcode,
            "print('no function here')",
            vec![TestCase::new("[1]", "1")],
        );
        let verdict = judge.judge(&sub).await;
        assert_eq!(verdict.status, JudgeStatus::CompileError);
        assert_eq!(runner.calls(), 0);
        assert!(verdict.test_case_results.is_empty());
        assert!(verdict.error_message.unwrap().contains("entry point"));
    }

    #[tokio::test]
    async fn test_leetcode_compares_returned_value() {
        let (judge, _) = judge(FakeRunner::new(|program, _| {
            assert!(program.contains("Solution().twoSum(*__args)"));
            Ok(outcome(
                RunStatus::Exited(0),
                &format!("checking\n{}[0, 1]\n", leetcode::RESULT_SENTINEL),
                "",
            ))
        }));
        let sub = submission(
            JudgeMode::Leetcode,
            "class Solution:\n    def twoSum(self, nums, target):\n        pass\n",
            vec![TestCase::new(
                Payload::Value(json!([[2, 7, 11, 15], 9])),
                Payload::Value(json!([0, 1])),
            )],
        );
        let verdict = judge.judge(&sub).await;
        assert_eq!(verdict.status, JudgeStatus::Accepted);
        assert_eq!(verdict.test_case_results[0].actual_output, "[0, 1]");
    }

    #[tokio::test]
    async fn test_leetcode_without_result_line_is_runtime_error() {
        let (judge, _) = judge(FakeRunner::new(|_, _| {
            Ok(outcome(RunStatus::Exited(0), "bye\n", ""))
        }));
        let sub = submission(
            JudgeMode::Leetcode,
            "def f(x):\n    raise SystemExit(0)\n",
            vec![TestCase::new("[1]", "1")],
        );
        let verdict = judge.judge(&sub).await;
        assert_eq!(verdict.status, JudgeStatus::RuntimeError);
    }

    #[tokio::test]
    async fn test_fullcode_single_execution() {
        let (judge, runner) = judge(FakeRunner::new(|_, _| {
            Ok(outcome(RunStatus::Exited(0), "", ""))
        }));
        let sub = submission(
            JudgeMode::Fullcode,
            "assert 1 + 1 == 2",
            vec![TestCase::new("", ""), TestCase::new("", "")],
        );
        let verdict = judge.judge(&sub).await;
        assert_eq!(verdict.status, JudgeStatus::Accepted);
        assert_eq!(runner.calls(), 1);
        assert_eq!(verdict.total_cases, 1);
    }

    #[tokio::test]
    async fn test_fullcode_assertion_is_wrong_answer() {
        let stderr = "Traceback (most recent call last):\n  File \"main.py\", line 1, in <module>\n    assert add(1, 1) == 3\nAssertionError\n";
        let (judge, _) = judge(FakeRunner::new(move |_, _| {
            Ok(outcome(RunStatus::Exited(1), "", stderr))
        }));
        let sub = submission(JudgeMode::Fullcode, "assert add(1, 1) == 3", vec![]);
        let verdict = judge.judge(&sub).await;
        assert_eq!(verdict.status, JudgeStatus::WrongAnswer);
    }

    #[tokio::test]
    async fn test_acm_assertion_is_runtime_error() {
        let (judge, _) = judge(FakeRunner::new(|_, _| {
            Ok(outcome(RunStatus::Exited(1), "", "Traceback (most recent call last):\nAssertionError\n"))
        }));
        let sub = submission(JudgeMode::Acm, "assert False", vec![TestCase::new("", "")]);
        let verdict = judge.judge(&sub).await;
        assert_eq!(verdict.status, JudgeStatus::RuntimeError);
        assert!(verdict.error_message.unwrap().starts_with("Process exited with code 1"));
    }

    #[tokio::test]
    async fn test_syntax_error_is_compile_error() {
        let stderr = "  File \"main.py\", line 1\n    print(\n         ^\nSyntaxError: '(' was never closed\n";
        let (judge, runner) = judge(FakeRunner::new(move |_, _| {
            Ok(outcome(RunStatus::Exited(1), "", stderr))
        }));
        let mut sub = submission(
            JudgeMode::Acm,
            "print(",
            vec![TestCase::new("", ""), TestCase::new("", "")],
        );
        sub.policy = FailurePolicy::RunAll;
        let verdict = judge.judge(&sub).await;
        assert_eq!(verdict.status, JudgeStatus::CompileError);
        // compile errors stop regardless of policy
        assert_eq!(runner.calls(), 1);
        assert_eq!(verdict.test_case_results[1].status, JudgeStatus::Skipped);
    }

    #[tokio::test]
    async fn test_printed_syntax_error_is_runtime_error() {
        // the program wrote the text itself and exited 1
        let forged = [
            "SyntaxError: totally\n",
            "  File \"main.py\", line 1\nSyntaxError: bad\nbye\n",
            "warning\nIndentationError: expected an indented block\n",
        ];
        for stderr in forged {
            let (judge, _) = judge(FakeRunner::new(move |_, _| {
                Ok(outcome(RunStatus::Exited(1), "", stderr))
            }));
            let sub = submission(JudgeMode::Acm, "", vec![TestCase::new("", "")]);
            assert_eq!(
                judge.judge(&sub).await.status,
                JudgeStatus::RuntimeError,
                "{:?}",
                stderr
            );
        }
    }

    #[tokio::test]
    async fn test_fullcode_assertion_text_not_last_is_runtime_error() {
        let stderr = "AssertionError\nTraceback (most recent call last):\nValueError: x\n";
        let (judge, _) = judge(FakeRunner::new(move |_, _| {
            Ok(outcome(RunStatus::Exited(1), "", stderr))
        }));
        let sub = submission(JudgeMode::Fullcode, "", vec![]);
        assert_eq!(judge.judge(&sub).await.status, JudgeStatus::RuntimeError);
    }

    #[test]
    fn test_load_time_syntax_error_shapes() {
        assert!(is_load_time_syntax_error(
            "  File \"main.py\", line 3\n    x = = 1\n        ^\nSyntaxError: invalid syntax\n"
        ));
        assert!(is_load_time_syntax_error(
            "  File \"main.py\", line 2\n    return 1\nIndentationError: unexpected indent\n"
        ));
        assert!(!is_load_time_syntax_error("SyntaxError: invalid syntax\n"));
        assert!(!is_load_time_syntax_error(""));
    }

    #[tokio::test]
    async fn test_runtime_syntax_error_stays_runtime_error() {
        let stderr = "Traceback (most recent call last):\n  File \"main.py\", line 1, in <module>\n  File \"<string>\", line 1\nSyntaxError: invalid syntax\n";
        let (judge, _) = judge(FakeRunner::new(move |_, _| {
            Ok(outcome(RunStatus::Exited(1), "", stderr))
        }));
        let sub = submission(JudgeMode::Acm, "eval('(')", vec![TestCase::new("", "")]);
        assert_eq!(judge.judge(&sub).await.status, JudgeStatus::RuntimeError);
    }

    #[tokio::test]
    async fn test_runner_fault_is_system_error() {
        let (judge, _) = judge(FakeRunner::new(|_, _| {
            Err(JudgeError::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "/opt/secret/python3 missing",
            )))
        }));
        let sub = submission(JudgeMode::Acm, "", vec![TestCase::new("", ""), TestCase::new("", "")]);
        let verdict = judge.judge(&sub).await;
        assert_eq!(verdict.status, JudgeStatus::SystemError);
        let message = verdict.error_message.unwrap();
        assert!(!message.contains("/opt/secret"));
        assert_eq!(verdict.test_case_results[1].status, JudgeStatus::Skipped);
    }

    #[tokio::test]
    async fn test_memory_and_signal_statuses() {
        let (judge, _) = judge(FakeRunner::new(|_, stdin| match stdin {
            "mle" => Ok(outcome(RunStatus::MemoryLimitExceeded, "", "")),
            _ => Ok(outcome(RunStatus::Signaled(11), "", "")),
        }));
        let mut sub = submission(
            JudgeMode::Acm,
            "",
            vec![TestCase::new("segv", ""), TestCase::new("mle", "")],
        );
        sub.policy = FailurePolicy::RunAll;
        let verdict = judge.judge(&sub).await;
        assert_eq!(verdict.status, JudgeStatus::MemoryLimitExceeded);
        assert!(verdict.test_case_results[1].killed_for_memory);
        assert_eq!(verdict.test_case_results[0].status, JudgeStatus::RuntimeError);
    }

    mod with_python {
        use super::*;
        use crate::config::JudgeConfig;
        use crate::languages::LanguageRegistry;
        use crate::runner::SandboxedRunner;

        fn python_available() -> bool {
            std::process::Command::new("python3")
                .arg("--version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        }

        fn sandboxed(scratch_root: &std::path::Path) -> Judge {
            let config = JudgeConfig {
                scratch_root: scratch_root.to_path_buf(),
                max_processes: 0,
                ..JudgeConfig::default()
            };
            let languages = Arc::new(LanguageRegistry::builtin().unwrap());
            Judge::new(Arc::new(SandboxedRunner::new(languages, &config)))
        }

        #[tokio::test]
        async fn test_a_plus_b() {
            if !python_available() {
                eprintln!("python3 not found, skipping");
                return;
            }
            let root = tempfile::tempdir().unwrap();
            let mut sub = submission(
                JudgeMode::Acm,
                "a, b = map(int, input().split())\nprint(a + b)\n",
                vec![TestCase::new("1 2\n", "3\n"), TestCase::new("-5 5", "0")],
            );
            sub.time_limit = 5.0;
            let verdict = sandboxed(root.path()).judge(&sub).await;
            assert_eq!(verdict.status, JudgeStatus::Accepted, "{:?}", verdict);
        }

        #[tokio::test]
        async fn test_leetcode_two_sum() {
            if !python_available() {
                eprintln!("python3 not found, skipping");
                return;
            }
            let root = tempfile::tempdir().unwrap();
            let code = "class Solution:\n    def twoSum(self, nums: List[int], target: int) -> List[int]:\n        seen = defaultdict(int)\n        for i, n in enumerate(nums):\n            if target - n in seen:\n                return [seen[target - n], i]\n            seen[n] = i\n";
            let mut sub = submission(
                JudgeMode::Leetcode,
                code,
                vec![
                    TestCase::new(
                        Payload::Value(json!([[2, 7, 11, 15], 9])),
                        Payload::Value(json!([0, 1])),
                    ),
                    TestCase::new("[[3, 2, 4], 6]", "[1, 2]"),
                ],
            );
            sub.time_limit = 5.0;
            let verdict = sandboxed(root.path()).judge(&sub).await;
            assert_eq!(verdict.status, JudgeStatus::Accepted, "{:?}", verdict);
        }

        #[tokio::test]
        async fn test_sleep_is_time_limit_exceeded() {
            if !python_available() {
                eprintln!("python3 not found, skipping");
                return;
            }
            let root = tempfile::tempdir().unwrap();
            let sub = submission(
                JudgeMode::Acm,
                "import time\ntime.sleep(10)\n",
                vec![TestCase::new("", "")],
            );
            let started = std::time::Instant::now();
            let verdict = sandboxed(root.path()).judge(&sub).await;
            assert_eq!(verdict.status, JudgeStatus::TimeLimitExceeded);
            assert!(started.elapsed() < std::time::Duration::from_secs(2));
        }

        #[tokio::test]
        async fn test_big_allocation_is_memory_limit_exceeded() {
            if !python_available() {
                eprintln!("python3 not found, skipping");
                return;
            }
            let root = tempfile::tempdir().unwrap();
            let mut sub = submission(
                JudgeMode::Acm,
                "x = bytearray(1024 * 1024 * 1024)\nprint(len(x))\n",
                vec![TestCase::new("", "")],
            );
            sub.memory_limit = 128;
            sub.time_limit = 5.0;
            let verdict = sandboxed(root.path()).judge(&sub).await;
            assert_eq!(verdict.status, JudgeStatus::MemoryLimitExceeded, "{:?}", verdict);
            assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
        }

        #[tokio::test]
        async fn test_memory_limit_leaves_no_process_behind() {
            if !python_available() {
                eprintln!("python3 not found, skipping");
                return;
            }
            let root = tempfile::tempdir().unwrap();
            let code = "import os, subprocess, sys\n\
                        child = subprocess.Popen(['sleep', '30'])\n\
                        print(os.getpid(), child.pid)\n\
                        sys.stdout.flush()\n\
                        x = bytearray(1024 * 1024 * 1024)\n";
            let mut sub = submission(JudgeMode::Acm, code, vec![TestCase::new("", "")]);
            sub.memory_limit = 128;
            sub.time_limit = 5.0;
            let verdict = sandboxed(root.path()).judge(&sub).await;
            assert_eq!(verdict.status, JudgeStatus::MemoryLimitExceeded, "{:?}", verdict);

            let pids: Vec<i32> = verdict.test_case_results[0]
                .actual_output
                .split_whitespace()
                .map(|p| p.parse().unwrap())
                .collect();
            assert_eq!(pids.len(), 2, "{:?}", verdict);
            for pid in pids {
                let proc_dir = format!("/proc/{}", pid);
                assert!(!std::path::Path::new(&proc_dir).exists(), "{} still present", proc_dir);
            }
        }

        #[tokio::test]
        async fn test_fullcode_assertions() {
            if !python_available() {
                eprintln!("python3 not found, skipping");
                return;
            }
            let root = tempfile::tempdir().unwrap();
            let judge = sandboxed(root.path());

            let mut sub = submission(
                JudgeMode::Fullcode,
                "def add(a, b):\n    return a + b\n\nassert add(1, 2) == 3\n",
                vec![],
            );
            sub.time_limit = 5.0;
            assert_eq!(judge.judge(&sub).await.status, JudgeStatus::Accepted);

            sub.code = "def add(a, b):\n    return a - b\n\nassert add(1, 2) == 3\n".into();
            assert_eq!(judge.judge(&sub).await.status, JudgeStatus::WrongAnswer);
        }

        #[tokio::test]
        async fn test_syntax_error() {
            if !python_available() {
                eprintln!("python3 not found, skipping");
                return;
            }
            let root = tempfile::tempdir().unwrap();
            let mut sub = submission(JudgeMode::Acm, "print(\n", vec![TestCase::new("", "")]);
            sub.time_limit = 5.0;
            let verdict = sandboxed(root.path()).judge(&sub).await;
            assert_eq!(verdict.status, JudgeStatus::CompileError, "{:?}", verdict);
        }
    }
}
