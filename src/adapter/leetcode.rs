//! LeetCode-style harness
//!
//! The submission defines a function (or a `Solution` method). The generated
//! program reads a JSON argument list from stdin, calls the entry point and
//! prints the JSON-encoded return value on a line prefixed with [`RESULT_SENTINEL`].

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::utils::cached_regex;
use crate::error::AdaptError;

/// Prefix of the harness result line on stdout
pub const RESULT_SENTINEL: &str = "__JUDGE_RESULT__:";

/// Names available to LeetCode submissions without importing them
const PRELUDE: &str = r#"from typing import *
from collections import *
from heapq import *
from bisect import *
from math import *
from itertools import *
from functools import *
import collections
import heapq
import bisect
import math
import itertools
import functools
import string
import re
import sys

inf = float("inf")
sys.setrecursionlimit(50000)
"#;

const HARNESS: &str = r#"

def __judge_default(value):
    if isinstance(value, (set, frozenset)):
        return list(value)
    return repr(value)


def __judge_main():
    import json as __json
    import sys as __sys

    __args = __json.loads(__sys.stdin.read())
    __result = {call}(*__args)
    __sys.stdout.write("\n{sentinel}" + __json.dumps(__result, default=__judge_default) + "\n")
    __sys.stdout.flush()


__judge_main()
"#;

/// What the harness calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum EntryPoint {
    /// `Solution().<name>(*args)`
    SolutionMethod(String),
    /// `<name>(*args)`
    Function(String),
}

impl EntryPoint {
    pub fn name(&self) -> &str {
        match self {
            EntryPoint::SolutionMethod(name) | EntryPoint::Function(name) => name,
        }
    }

    fn call_expr(&self) -> String {
        match self {
            EntryPoint::SolutionMethod(name) => format!("Solution().{}", name),
            EntryPoint::Function(name) => name.clone(),
        }
    }
}

/// Callables found in the submission
#[derive(Debug, Default, PartialEq, Eq)]
struct Definitions {
    has_solution: bool,
    solution_methods: Vec<String>,
    functions: Vec<String>,
}

fn class_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(&RE, r"^class\s+([A-Za-z_]\w*)\s*[:(]")
}

fn def_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(&RE, r"^([ \t]*)(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(")
}

/// Lexical state carried from one physical line to the next
#[derive(Debug, Default)]
struct LineState {
    /// Quote character of an open triple-quoted string
    triple: Option<char>,
    /// Open brackets
    depth: usize,
    /// Previous line ended in a backslash
    continued: bool,
}

impl LineState {
    /// Whether the next physical line begins a new statement
    fn at_statement_start(&self) -> bool {
        self.triple.is_none() && self.depth == 0 && !self.continued
    }

    fn advance(&mut self, line: &str) {
        let chars: Vec<char> = line.chars().collect();
        let quoted_thrice = |i: usize, q: char| {
            chars.get(i) == Some(&q) && chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q)
        };
        self.continued = false;

        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if let Some(q) = self.triple {
                if c == '\\' {
                    i += 2;
                } else if quoted_thrice(i, q) {
                    self.triple = None;
                    i += 3;
                } else {
                    i += 1;
                }
                continue;
            }

            match c {
                '#' => break,
                '"' | '\'' if quoted_thrice(i, c) => {
                    self.triple = Some(c);
                    i += 3;
                    continue;
                }
                '"' | '\'' => {
                    i += 1;
                    while i < chars.len() && chars[i] != c {
                        if chars[i] == '\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                }
                '(' | '[' | '{' => self.depth += 1,
                ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                '\\' if i + 1 == chars.len() => self.continued = true,
                _ => {}
            }
            i += 1;
        }
    }
}

fn scan(code: &str) -> Definitions {
    let mut defs = Definitions::default();
    let (class_re, def_re) = match (class_re(), def_re()) {
        (Some(c), Some(d)) => (c, d),
        _ => return defs,
    };

    let mut state = LineState::default();
    let mut in_solution = false;
    // indentation of the first def inside Solution marks its method level
    let mut method_indent: Option<String> = None;

    for line in code.lines() {
        // string bodies and continuation lines are not statements
        let starts_statement = state.at_statement_start();
        state.advance(line);
        if !starts_statement {
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let at_top_level = trimmed.len() == line.len();

        if at_top_level {
            in_solution = false;
            if let Some(caps) = class_re.captures(line) {
                if &caps[1] == "Solution" {
                    defs.has_solution = true;
                    in_solution = true;
                    method_indent = None;
                }
                continue;
            }
            if let Some(caps) = def_re.captures(line) {
                defs.functions.push(caps[2].to_string());
            }
            continue;
        }

        if in_solution {
            if let Some(caps) = def_re.captures(line) {
                let indent = caps[1].to_string();
                let level = method_indent.get_or_insert_with(|| indent.clone());
                if *level == indent {
                    defs.solution_methods.push(caps[2].to_string());
                }
            }
        }
    }
    defs
}

fn is_public(name: &str) -> bool {
    !name.starts_with('_')
}

/// Find the callable the harness should invoke
///
/// An explicit name wins; otherwise `class Solution` with exactly one public
/// method, then exactly one public top-level function.
pub fn resolve_entry_point(code: &str, explicit: Option<&str>) -> Result<EntryPoint, AdaptError> {
    let defs = scan(code);

    if let Some(name) = explicit {
        let name = name.trim();
        let name = name.strip_prefix("Solution.").unwrap_or(name);
        if defs.solution_methods.iter().any(|m| m == name) {
            return Ok(EntryPoint::SolutionMethod(name.to_string()));
        }
        if defs.functions.iter().any(|f| f == name) {
            return Ok(EntryPoint::Function(name.to_string()));
        }
        return Err(AdaptError::UnknownEntryPoint(name.to_string()));
    }

    if defs.has_solution {
        let methods: Vec<String> = defs
            .solution_methods
            .into_iter()
            .filter(|m| is_public(m))
            .collect();
        return match methods.len() {
            0 => Err(AdaptError::MissingEntryPoint),
            1 => Ok(EntryPoint::SolutionMethod(methods[0].clone())),
            _ => Err(AdaptError::AmbiguousEntryPoint(methods)),
        };
    }

    let functions: Vec<String> = defs.functions.into_iter().filter(|f| is_public(f)).collect();
    match functions.len() {
        0 => Err(AdaptError::MissingEntryPoint),
        1 => Ok(EntryPoint::Function(functions[0].clone())),
        _ => Err(AdaptError::AmbiguousEntryPoint(functions)),
    }
}

/// Prelude, user code and harness as one program
pub fn build_program(code: &str, entry: &EntryPoint) -> String {
    let harness = HARNESS
        .replace("{call}", &entry.call_expr())
        .replace("{sentinel}", RESULT_SENTINEL);
    let mut program = String::with_capacity(PRELUDE.len() + code.len() + harness.len() + 2);
    program.push_str(PRELUDE);
    program.push('\n');
    program.push_str(code);
    if !code.ends_with('\n') {
        program.push('\n');
    }
    program.push_str(&harness);
    program
}

/// The harness result line from stdout, if the call returned
pub fn extract_result(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(RESULT_SENTINEL))
        .map(str::trim)
}

/// Everything the submission printed itself, without the result line
pub fn user_output(stdout: &str) -> String {
    stdout
        .lines()
        .filter(|line| !line.starts_with(RESULT_SENTINEL))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}
