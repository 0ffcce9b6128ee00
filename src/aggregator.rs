//! Verdict aggregation
//!
//! Folds per-test results into one verdict. The worst status by
//! [`JudgeStatus::priority`] wins; among equals the earliest test case decides.

use uuid::Uuid;

use crate::core::{ExecutionResult, FailurePolicy, JudgeStatus, Verdict};

/// Whether a result with `status` ends the run of the remaining test cases
pub fn should_stop(status: JudgeStatus, policy: FailurePolicy) -> bool {
    if status.is_fatal() {
        return true;
    }
    status.is_failure() && policy == FailurePolicy::ShortCircuit
}

pub fn aggregate(
    task_id: Uuid,
    results: Vec<ExecutionResult>,
    error_message: Option<String>,
) -> Verdict {
    let deciding = results
        .iter()
        .filter(|r| r.status != JudgeStatus::Skipped)
        .fold(None::<&ExecutionResult>, |best, r| match best {
            Some(b) if b.status.priority() >= r.status.priority() => Some(b),
            _ => Some(r),
        });

    let status = deciding
        .map(|r| r.status)
        .unwrap_or(JudgeStatus::Accepted);
    let error_message = error_message.or_else(|| {
        deciding
            .filter(|r| r.status != JudgeStatus::Accepted)
            .and_then(|r| r.error_message.clone())
    });

    let execution_time = results
        .iter()
        .map(|r| r.execution_time)
        .fold(0.0, f64::max);
    let memory_usage = results.iter().map(|r| r.memory_usage).fold(0.0, f64::max);
    let passed_cases = results.iter().filter(|r| r.passed).count();
    let total_cases = results.len();

    Verdict {
        task_id,
        status,
        execution_time,
        memory_usage,
        error_message,
        test_case_results: results,
        passed_cases,
        total_cases,
    }
}
