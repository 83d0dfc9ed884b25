//! Verdict evaluation for a single test case

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dispatcher::ExecutionResult;

/// Verdict from judging, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    RuntimeError,
    CompilationError,
    ExecutionFault,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// Human readable label shown to users
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::CompilationError => "Compilation Error",
            Verdict::ExecutionFault => "Execution Fault",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Accepted => "accepted",
            Verdict::WrongAnswer => "wrong_answer",
            Verdict::RuntimeError => "runtime_error",
            Verdict::CompilationError => "compilation_error",
            Verdict::ExecutionFault => "execution_fault",
        };
        write!(f, "{}", s)
    }
}

/// Verdict for one test case plus the text shown for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub diagnostic: String,
}

impl Evaluation {
    pub fn accepted() -> Self {
        Self {
            verdict: Verdict::Accepted,
            diagnostic: String::new(),
        }
    }

    pub fn new(verdict: Verdict, diagnostic: impl Into<String>) -> Self {
        Self {
            verdict,
            diagnostic: diagnostic.into(),
        }
    }
}

const UNKNOWN_COMPILATION_ERROR: &str = "Unknown compilation error";
const UNKNOWN_RUNTIME_ERROR: &str = "Unknown runtime error";

/// Classify one execution. Compile failures win over run failures, which win
/// over output mismatches. Stderr is ignored when both stages exit 0, so
/// compiler warnings never fail a run.
pub fn evaluate(result: &ExecutionResult, input: &str, expected_output: &str) -> Evaluation {
    if result.compile_exit_code != 0 {
        return Evaluation::new(
            Verdict::CompilationError,
            non_empty_or(&result.compile_stderr, UNKNOWN_COMPILATION_ERROR),
        );
    }

    if result.run_exit_code != 0 {
        return Evaluation::new(
            Verdict::RuntimeError,
            non_empty_or(&result.run_stderr, UNKNOWN_RUNTIME_ERROR),
        );
    }

    if !compare_output(&result.run_stdout, expected_output) {
        let diagnostic = format!(
            "Input: {}\nExpected: {}\nGot: {}",
            input,
            expected_output.trim(),
            result.run_stdout.trim()
        );
        return Evaluation::new(Verdict::WrongAnswer, diagnostic);
    }

    Evaluation::accepted()
}

/// Exact comparison after trimming surrounding whitespace
pub fn compare_output(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}

fn non_empty_or(text: &str, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}
