//! Driver module - Harness synthesis around user code
//!
//! A harness reads codec literals from stdin, calls the user's `Solution`
//! method and prints the encoded return value. Synthesis is split in two:
//! - `DriverPlan`: a small language-neutral program (imports, ordered steps)
//! - `DriverBackend`: renders each step for one target language
//!
//! The driver module does NOT:
//! - Execute anything (see `dispatcher`)
//! - Compare outputs or decide verdicts

pub mod java;
pub mod javascript;
pub mod python;

use serde::{Deserialize, Serialize};

use crate::codec::ValueKind;
use crate::models::MethodSignature;

/// Prefix of every harness-generated diagnostic line
pub const DRIVER_ERROR_PREFIX: &str = "Driver Error:";

/// Name of the class users must define
pub const SOLUTION_CLASS: &str = "Solution";

/// How the harness picks the method to call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodTarget {
    /// The sole externally visible instance method of `Solution`
    Discover,
    /// A method declared by the problem's signature
    Named { name: String, arity: usize },
}

/// One statement of the harness `main`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    ReadLines,
    DecodeArguments,
    Instantiate,
    Locate(MethodTarget),
    /// Declared kinds, when the problem supplies a signature
    CoerceArguments(Option<Vec<ValueKind>>),
    Invoke,
    Emit,
}

/// Language-neutral harness program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverPlan {
    /// Import lines, hoisted user imports first
    pub imports: Vec<String>,
    /// User code with any hoisted imports removed
    pub user_code: String,
    pub steps: Vec<Step>,
}

impl DriverPlan {
    pub fn build<B: DriverBackend + ?Sized>(
        backend: &B,
        user_code: &str,
        signature: Option<&MethodSignature>,
    ) -> Self {
        let (hoisted, user_code) = backend.hoist_imports(user_code);

        // Hoisted lines lead: some (Python `__future__`) must open the file
        let mut imports: Vec<String> = Vec::new();
        let standard = backend.standard_imports().iter().map(|s| s.to_string());
        for import in hoisted.into_iter().chain(standard) {
            if !imports.contains(&import) {
                imports.push(import);
            }
        }

        let (target, kinds) = match signature {
            Some(sig) => (
                MethodTarget::Named {
                    name: sig.method.clone(),
                    arity: sig.params.len(),
                },
                Some(sig.params.clone()),
            ),
            None => (MethodTarget::Discover, None),
        };

        Self {
            imports,
            user_code,
            steps: vec![
                Step::ReadLines,
                Step::DecodeArguments,
                Step::Instantiate,
                Step::Locate(target),
                Step::CoerceArguments(kinds),
                Step::Invoke,
                Step::Emit,
            ],
        }
    }
}

/// Rendering backend for one target language
pub trait DriverBackend: Send + Sync {
    fn standard_imports(&self) -> &'static [&'static str];

    /// Split import lines that must precede the harness out of user code
    fn hoist_imports(&self, user_code: &str) -> (Vec<String>, String) {
        (Vec::new(), user_code.to_string())
    }

    /// Lines for one step, unindented
    fn render_step(&self, step: &Step) -> Vec<String>;

    /// Full program text around the rendered `main` body
    fn assemble(&self, plan: &DriverPlan, body: &[String]) -> String;

    fn synthesize(&self, user_code: &str, signature: Option<&MethodSignature>) -> String {
        let plan = DriverPlan::build(self, user_code, signature);
        self.render(&plan)
    }

    fn render(&self, plan: &DriverPlan) -> String {
        let body: Vec<String> = plan
            .steps
            .iter()
            .flat_map(|step| self.render_step(step))
            .collect();
        self.assemble(plan, &body)
    }
}

/// Harness backends known to the language registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Python,
    Java,
    JavaScript,
}

impl DriverKind {
    pub fn backend(&self) -> &'static dyn DriverBackend {
        match self {
            DriverKind::Python => &python::PythonBackend,
            DriverKind::Java => &java::JavaBackend,
            DriverKind::JavaScript => &javascript::JavaScriptBackend,
        }
    }
}

/// Double-quoted literal valid in Python, Java and JavaScript
pub(crate) fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Append `lines` to `out`, each prefixed with `indent` (blank lines stay blank)
pub(crate) fn push_indented(out: &mut String, lines: &[String], indent: &str) {
    for line in lines {
        if !line.is_empty() {
            out.push_str(indent);
            out.push_str(line);
        }
        out.push('\n');
    }
}
