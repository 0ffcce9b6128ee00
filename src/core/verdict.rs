use serde::{Deserialize, Serialize};
use std::fmt;

/// Judge status, used both for whole submissions and single test cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeStatus {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    CompileError,
    SystemError,
    /// Test case not executed because an earlier one already decided the verdict
    Skipped,
}

impl JudgeStatus {
    /// Rank used when several test cases fail differently; higher wins.
    pub fn priority(self) -> u8 {
        match self {
            JudgeStatus::SystemError => 7,
            JudgeStatus::CompileError => 6,
            JudgeStatus::TimeLimitExceeded => 5,
            JudgeStatus::MemoryLimitExceeded => 4,
            JudgeStatus::RuntimeError => 3,
            JudgeStatus::WrongAnswer => 2,
            JudgeStatus::Accepted => 1,
            JudgeStatus::Skipped => 0,
        }
    }

    /// Statuses that stop the remaining test cases regardless of policy
    pub fn is_fatal(self) -> bool {
        matches!(self, JudgeStatus::SystemError | JudgeStatus::CompileError)
    }

    pub fn is_failure(self) -> bool {
        !matches!(self, JudgeStatus::Accepted | JudgeStatus::Skipped)
    }
}

impl fmt::Display for JudgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JudgeStatus::Accepted => "accepted",
            JudgeStatus::WrongAnswer => "wrong_answer",
            JudgeStatus::TimeLimitExceeded => "time_limit_exceeded",
            JudgeStatus::MemoryLimitExceeded => "memory_limit_exceeded",
            JudgeStatus::RuntimeError => "runtime_error",
            JudgeStatus::CompileError => "compile_error",
            JudgeStatus::SystemError => "system_error",
            JudgeStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let ordered = [
            JudgeStatus::SystemError,
            JudgeStatus::CompileError,
            JudgeStatus::TimeLimitExceeded,
            JudgeStatus::MemoryLimitExceeded,
            JudgeStatus::RuntimeError,
            JudgeStatus::WrongAnswer,
            JudgeStatus::Accepted,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].priority() > pair[1].priority(), "{:?}", pair);
        }
    }

    #[test]
    fn test_display_matches_serde() {
        for status in [
            JudgeStatus::Accepted,
            JudgeStatus::TimeLimitExceeded,
            JudgeStatus::Skipped,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }

    #[test]
    fn test_fatal_statuses() {
        assert!(JudgeStatus::SystemError.is_fatal());
        assert!(JudgeStatus::CompileError.is_fatal());
        assert!(!JudgeStatus::TimeLimitExceeded.is_fatal());
        assert!(!JudgeStatus::Skipped.is_failure());
    }
}
