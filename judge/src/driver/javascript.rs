//! JavaScript (Node) harness

use super::{push_indented, string_literal, DriverBackend, DriverPlan, MethodTarget, Step, SOLUTION_CLASS};
use crate::codec::ValueKind;

pub struct JavaScriptBackend;

const HELPERS: &str = r#"function __decode(line) {
    const text = line.trim();
    if (text.startsWith("[") && text.endsWith("]")) {
        const inner = text.slice(1, -1).trim();
        if (inner === "") return [];
        return inner.split(",").map((part) => {
            const item = part.trim();
            if (!/^[+-]?\d+$/.test(item)) throw new Error("invalid array element " + JSON.stringify(item));
            return Number(item);
        });
    }
    if (/^[+-]?\d+$/.test(text)) return Number(text);
    if (text.length >= 2 && text[0] === text[text.length - 1] && (text[0] === '"' || text[0] === "'")) {
        return text.slice(1, -1);
    }
    return text;
}

function __encode(value) {
    if (Array.isArray(value)) return "[" + value.map(__encode).join(", ") + "]";
    return String(value);
}

function __fail(message) {
    process.stderr.write("Driver Error: " + message + "\n");
    process.exit(1);
}
"#;

const ENTRY: &str = r#"try {
    __main();
} catch (e) {
    process.stderr.write((e && e.stack ? e.stack : String(e)) + "\n");
    process.exit(1);
}
"#;

impl DriverBackend for JavaScriptBackend {
    fn standard_imports(&self) -> &'static [&'static str] {
        &["const __fs = require(\"fs\");"]
    }

    fn render_step(&self, step: &Step) -> Vec<String> {
        match step {
            Step::ReadLines => vec![
                "const lines = __fs.readFileSync(0, \"utf8\").split(\"\\n\").filter((line) => line.trim() !== \"\");".into(),
            ],
            Step::DecodeArguments => vec!["const args = lines.map(__decode);".into()],
            Step::Instantiate => vec![format!("const sol = new {}();", SOLUTION_CLASS)],
            Step::Locate(MethodTarget::Discover) => vec![
                "const candidates = Object.getOwnPropertyNames(Object.getPrototypeOf(sol)).filter(".into(),
                "    (name) => name !== \"constructor\" && !name.startsWith(\"_\") && typeof sol[name] === \"function\"".into(),
                ");".into(),
                "if (candidates.length !== 1) {".into(),
                "    __fail(\"expected exactly one public method on Solution, found \" + candidates.length);".into(),
                "}".into(),
                "const method = sol[candidates[0]];".into(),
            ],
            Step::Locate(MethodTarget::Named { name, .. }) => {
                let literal = string_literal(name);
                vec![
                    format!("const method = sol[{}];", literal),
                    "if (typeof method !== \"function\") {".into(),
                    format!("    __fail(\"Solution has no method \" + {});", literal),
                    "}".into(),
                ]
            }
            Step::CoerceArguments(None) => Vec::new(),
            Step::CoerceArguments(Some(kinds)) => {
                let mut lines = vec![
                    format!("if (args.length !== {}) {{", kinds.len()),
                    format!(
                        "    __fail(\"expected {} arguments, input has \" + args.length);",
                        kinds.len()
                    ),
                    "}".into(),
                ];
                for (index, kind) in kinds.iter().enumerate() {
                    if *kind == ValueKind::String {
                        lines.push(format!("args[{0}] = String(args[{0}]);", index));
                    }
                }
                lines
            }
            Step::Invoke => vec!["const result = method.apply(sol, args);".into()],
            Step::Emit => vec!["console.log(__encode(result));".into()],
        }
    }

    fn assemble(&self, plan: &DriverPlan, body: &[String]) -> String {
        let mut out = String::new();
        for import in &plan.imports {
            out.push_str(import);
            out.push('\n');
        }
        out.push_str("\n// User Code\n");
        out.push_str(&plan.user_code);
        out.push_str("\n\n");
        out.push_str(HELPERS);
        out.push_str("\nfunction __main() {\n");
        push_indented(&mut out, body, "    ");
        out.push_str("}\n\n");
        out.push_str(ENTRY);
        out
    }
}
