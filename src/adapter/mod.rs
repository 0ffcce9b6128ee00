//! Mode adapter
//!
//! Turns a submission into the program text to run plus one invocation per
//! execution. Nothing here spawns a process: a submission that cannot be
//! adapted fails with [`AdaptError`] and is judged `compile_error`.

pub mod leetcode;

use crate::core::{JudgeMode, Payload, Submission};
use crate::error::AdaptError;

pub use leetcode::EntryPoint;

/// One execution of the prepared program
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Index of the test case this execution judges
    pub index: usize,
    pub stdin: String,
    /// `None` when exit status alone decides (FullCode)
    pub expected: Option<Payload>,
}

#[derive(Debug, Clone)]
pub struct PreparedProgram {
    pub program_text: String,
    pub invocations: Vec<Invocation>,
    /// Set when stdout carries a harness result line
    pub harness: Option<EntryPoint>,
}

pub fn prepare(submission: &Submission) -> Result<PreparedProgram, AdaptError> {
    match submission.mode {
        JudgeMode::Acm => Ok(PreparedProgram {
            program_text: submission.code.clone(),
            invocations: submission
                .test_cases
                .iter()
                .enumerate()
                .map(|(index, case)| Invocation {
                    index,
                    stdin: case.input.to_text(),
                    expected: Some(case.expected.clone()),
                })
                .collect(),
            harness: None,
        }),
        JudgeMode::Leetcode => {
            let entry = leetcode::resolve_entry_point(
                &submission.code,
                submission.entry_point.as_deref(),
            )?;

            let invocations = submission
                .test_cases
                .iter()
                .enumerate()
                .map(|(index, case)| {
                    Ok(Invocation {
                        index,
                        stdin: argument_list(index, &case.input)?,
                        expected: Some(case.expected.clone()),
                    })
                })
                .collect::<Result<Vec<_>, AdaptError>>()?;

            Ok(PreparedProgram {
                program_text: leetcode::build_program(&submission.code, &entry),
                invocations,
                harness: Some(entry),
            })
        }
        JudgeMode::Fullcode => Ok(PreparedProgram {
            program_text: submission.code.clone(),
            invocations: vec![Invocation {
                index: 0,
                stdin: String::new(),
                expected: None,
            }],
            harness: None,
        }),
    }
}

/// Serialized JSON array of call arguments
fn argument_list(index: usize, input: &Payload) -> Result<String, AdaptError> {
    let value = match input {
        Payload::Value(value) => value.clone(),
        Payload::Text(text) => serde_json::from_str::<serde_json::Value>(text).map_err(|e| {
            AdaptError::InvalidArguments {
                index,
                reason: e.to_string(),
            }
        })?,
    };

    if !value.is_array() {
        return Err(AdaptError::InvalidArguments {
            index,
            reason: format!("got {}", json_kind(&value)),
        });
    }
    Ok(value.to_string())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
