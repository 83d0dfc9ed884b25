//! Python harness
//!
//! Methods are discovered with `dir()`; names starting with an underscore
//! (including dunder methods) are never candidates. `from __future__`
//! imports are lifted above the harness imports.

use super::{
    push_indented, string_literal, DriverBackend, DriverPlan, MethodTarget, Step, SOLUTION_CLASS,
};
use crate::codec::ValueKind;

pub struct PythonBackend;

const HELPERS: &str = r#"def _decode(line):
    text = line.strip()
    if text.startswith("[") and text.endswith("]"):
        inner = text[1:-1].strip()
        if not inner:
            return []
        return [int(part.strip()) for part in inner.split(",")]
    try:
        return int(text)
    except ValueError:
        pass
    if len(text) >= 2 and text[0] == text[-1] and text[0] in "\"'":
        return text[1:-1]
    return text


def _encode(value):
    if isinstance(value, (list, tuple)):
        return "[" + ", ".join(_encode(item) for item in value) + "]"
    return str(value)


def _fail(message):
    print("Driver Error: " + message, file=sys.stderr)
    sys.exit(1)
"#;

const ENTRY: &str = r#"if __name__ == "__main__":
    try:
        _main()
    except Exception:
        traceback.print_exc()
        sys.exit(1)
"#;

impl DriverBackend for PythonBackend {
    fn standard_imports(&self) -> &'static [&'static str] {
        &["import sys", "import traceback"]
    }

    fn hoist_imports(&self, user_code: &str) -> (Vec<String>, String) {
        let mut imports = Vec::new();
        let mut body = Vec::new();

        for line in user_code.lines() {
            if line.starts_with("from __future__ import ") {
                imports.push(line.trim_end().to_string());
            } else {
                body.push(line);
            }
        }

        (imports, body.join("\n"))
    }

    fn render_step(&self, step: &Step) -> Vec<String> {
        match step {
            Step::ReadLines => vec![
                "lines = [line for line in sys.stdin.read().split(\"\\n\") if line.strip()]".into(),
            ],
            Step::DecodeArguments => vec!["args = [_decode(line) for line in lines]".into()],
            Step::Instantiate => vec![format!("sol = {}()", SOLUTION_CLASS)],
            Step::Locate(MethodTarget::Discover) => vec![
                "candidates = [name for name in dir(sol) if not name.startswith(\"_\") and callable(getattr(sol, name))]".into(),
                "if len(candidates) != 1:".into(),
                "    _fail(\"expected exactly one public method on Solution, found %d\" % len(candidates))".into(),
                "method = getattr(sol, candidates[0])".into(),
            ],
            Step::Locate(MethodTarget::Named { name, .. }) => {
                let literal = string_literal(name);
                vec![
                    format!("method = getattr(sol, {}, None)", literal),
                    "if method is None or not callable(method):".into(),
                    format!("    _fail(\"Solution has no method \" + {})", literal),
                ]
            }
            Step::CoerceArguments(None) => Vec::new(),
            Step::CoerceArguments(Some(kinds)) => {
                let mut lines = vec![
                    format!("if len(args) != {}:", kinds.len()),
                    format!(
                        "    _fail(\"expected {} arguments, input has %d\" % len(args))",
                        kinds.len()
                    ),
                ];
                for (index, kind) in kinds.iter().enumerate() {
                    match kind {
                        ValueKind::String => lines.push(format!("args[{0}] = str(args[{0}])", index)),
                        ValueKind::Integer => lines.push(format!("args[{0}] = int(args[{0}])", index)),
                        ValueKind::IntegerArray => {}
                    }
                }
                lines
            }
            Step::Invoke => vec!["result = method(*args)".into()],
            Step::Emit => vec!["print(_encode(result))".into()],
        }
    }

    fn assemble(&self, plan: &DriverPlan, body: &[String]) -> String {
        let mut out = String::new();
        for import in &plan.imports {
            out.push_str(import);
            out.push('\n');
        }
        out.push_str("\n# User Code\n");
        out.push_str(&plan.user_code);
        out.push_str("\n\n\n");
        out.push_str(HELPERS);
        out.push_str("\n\ndef _main():\n");
        push_indented(&mut out, body, "    ");
        out.push_str("\n\n");
        out.push_str(ENTRY);
        out
    }
}
