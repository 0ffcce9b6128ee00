//! Output comparator
//!
//! Decides whether a program's output matches the expected answer.
//! Pure functions; malformed output fails the comparison, never panics.

use serde_json::Value;

use crate::core::utils::truncate_output;
use crate::core::{JudgeMode, Payload};

/// Float tolerance of the LeetCode harness when none is configured
pub const DEFAULT_LEETCODE_TOLERANCE: f64 = 1e-5;

/// Longest expected/actual snippet placed in a diagnostic
const DIAGNOSTIC_SNIPPET_CHARS: usize = 100;

/// Result of comparing one output
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub passed: bool,
    /// Why the comparison failed
    pub diagnostic: Option<String>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            diagnostic: None,
        }
    }

    pub fn fail(diagnostic: impl Into<String>) -> Self {
        Self {
            passed: false,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Compare `actual` with `expected` under the rules of `mode`
///
/// For LeetCode `actual` is the JSON text of the harness result line.
/// FullCode is decided by exit status, so it always passes here.
pub fn compare(
    actual: &str,
    expected: &Payload,
    mode: JudgeMode,
    tolerance: Option<f64>,
) -> CheckOutcome {
    match mode {
        JudgeMode::Acm => compare_text(actual, &expected_text(expected), tolerance),
        JudgeMode::Leetcode => compare_json(actual, expected, tolerance),
        JudgeMode::Fullcode => CheckOutcome::pass(),
    }
}

fn expected_text(expected: &Payload) -> String {
    match expected {
        Payload::Text(s) => s.clone(),
        Payload::Value(Value::String(s)) => s.clone(),
        Payload::Value(v) => v.to_string(),
    }
}

/// CRLF to LF, trailing whitespace per line, trailing blank lines dropped
fn normalize(s: &str) -> Vec<String> {
    let mut lines: Vec<String> = s
        .replace("\r\n", "\n")
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect();
    while lines.last().map(|s| s.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines
}

/// Line-based comparison, with numeric tokens compared under `tolerance` when set
pub fn compare_text(actual: &str, expected: &str, tolerance: Option<f64>) -> CheckOutcome {
    let actual_lines = normalize(actual);
    let expected_lines = normalize(expected);

    if actual_lines == expected_lines {
        return CheckOutcome::pass();
    }

    if let Some(tol) = tolerance {
        if tokens_match(&actual_lines, &expected_lines, tol) {
            return CheckOutcome::pass();
        }
    }

    CheckOutcome::fail(first_difference(&actual_lines, &expected_lines))
}

fn tokens_match(actual: &[String], expected: &[String], tol: f64) -> bool {
    let actual_tokens: Vec<&str> = actual.iter().flat_map(|l| l.split_whitespace()).collect();
    let expected_tokens: Vec<&str> = expected.iter().flat_map(|l| l.split_whitespace()).collect();

    actual_tokens.len() == expected_tokens.len()
        && actual_tokens
            .iter()
            .zip(&expected_tokens)
            .all(|(a, e)| a == e || numbers_close(a, e, tol))
}

fn numbers_close(a: &str, e: &str, tol: f64) -> bool {
    match (a.parse::<f64>(), e.parse::<f64>()) {
        (Ok(a), Ok(e)) => is_close(a, e, tol),
        _ => false,
    }
}

/// Relative or absolute closeness, like Python's `math.isclose(rel_tol=tol, abs_tol=tol)`
pub fn is_close(a: f64, b: f64, tol: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    let diff = (a - b).abs();
    diff <= (tol * a.abs().max(b.abs())).max(tol)
}

fn first_difference(actual: &[String], expected: &[String]) -> String {
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        if a != e {
            return format!(
                "line {}: expected `{}`, got `{}`",
                i + 1,
                truncate_output(e, DIAGNOSTIC_SNIPPET_CHARS),
                truncate_output(a, DIAGNOSTIC_SNIPPET_CHARS)
            );
        }
    }
    format!(
        "expected {} lines, got {}",
        expected.len(),
        actual.len()
    )
}

fn compare_json(actual: &str, expected: &Payload, tolerance: Option<f64>) -> CheckOutcome {
    let tol = tolerance.unwrap_or(DEFAULT_LEETCODE_TOLERANCE);

    let actual_value: Value = match serde_json::from_str(actual.trim()) {
        Ok(v) => v,
        Err(_) => {
            return CheckOutcome::fail(format!(
                "return value is not valid JSON: `{}`",
                truncate_output(actual.trim(), DIAGNOSTIC_SNIPPET_CHARS)
            ))
        }
    };

    let expected_value = match expected {
        Payload::Value(v) => v.clone(),
        Payload::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(v) => v,
            // plain text answer: compare the returned string
            Err(_) => {
                let got = match &actual_value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                return if got.trim() == text.trim() {
                    CheckOutcome::pass()
                } else {
                    CheckOutcome::fail(mismatch(text.trim(), &got))
                };
            }
        },
    };

    if deep_eq(&actual_value, &expected_value, tol) {
        CheckOutcome::pass()
    } else {
        CheckOutcome::fail(mismatch(&expected_value.to_string(), &actual_value.to_string()))
    }
}

fn mismatch(expected: &str, actual: &str) -> String {
    format!(
        "Expected:\n{}\nActual:\n{}",
        truncate_output(expected, DIAGNOSTIC_SNIPPET_CHARS),
        truncate_output(actual, DIAGNOSTIC_SNIPPET_CHARS)
    )
}

/// Structural equality with float tolerance
pub fn deep_eq(a: &Value, b: &Value, tol: f64) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => is_close(x, y, tol),
                _ => false,
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_eq(x, y, tol))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).map(|y| deep_eq(x, y, tol)).unwrap_or(false))
        }
        _ => a == b,
    }
}
