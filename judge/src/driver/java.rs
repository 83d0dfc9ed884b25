//! Java harness
//!
//! Discovery is reflective: the candidate is the sole public, non-static,
//! non-synthetic method declared on `Solution`. Decoded values are converted
//! to the declared parameter types before `Method.invoke`, and the return
//! value is formatted by its runtime type (`int[]`/`long[]` have their own
//! string form, separate from object arrays and collections).
//!
//! User classes are appended after `Main` in the same file, so top-level
//! `public` type declarations lose their `public` modifier. Narrowing to
//! `int` uses `Math.toIntExact`, so out-of-range literals fail the run
//! instead of wrapping.

use super::{
    push_indented, string_literal, DriverBackend, DriverPlan, MethodTarget, Step, SOLUTION_CLASS,
};

pub struct JavaBackend;

const HELPERS: &str = r#"    private static void fail(String message) {
        System.err.println("Driver Error: " + message);
        System.exit(1);
    }

    private static Object decode(String line) {
        String s = line.trim();
        if (s.startsWith("[") && s.endsWith("]")) {
            String inner = s.substring(1, s.length() - 1).trim();
            List<Long> list = new ArrayList<>();
            if (inner.isEmpty()) return list;
            for (String part : inner.split(",")) {
                list.add(Long.parseLong(part.trim()));
            }
            return list;
        }
        try {
            return Long.parseLong(s);
        } catch (NumberFormatException e) {
            // not an integer
        }
        if (s.length() >= 2
                && ((s.startsWith("\"") && s.endsWith("\"")) || (s.startsWith("'") && s.endsWith("'")))) {
            return s.substring(1, s.length() - 1);
        }
        return s;
    }

    private static Object convert(Object value, Class<?> target) {
        if (value instanceof List) {
            List<?> list = (List<?>) value;
            if (target == int[].class) {
                int[] arr = new int[list.size()];
                for (int i = 0; i < arr.length; i++) arr[i] = Math.toIntExact((Long) list.get(i));
                return arr;
            }
            if (target == long[].class) {
                long[] arr = new long[list.size()];
                for (int i = 0; i < arr.length; i++) arr[i] = (Long) list.get(i);
                return arr;
            }
            if (target == Integer[].class) {
                Integer[] arr = new Integer[list.size()];
                for (int i = 0; i < arr.length; i++) arr[i] = Math.toIntExact((Long) list.get(i));
                return arr;
            }
            if (target.isAssignableFrom(ArrayList.class)) {
                List<Integer> ints = new ArrayList<>();
                for (Object item : list) ints.add(Math.toIntExact((Long) item));
                return ints;
            }
        }
        if (value instanceof Long) {
            long n = (Long) value;
            if (target == int.class || target == Integer.class) return Math.toIntExact(n);
            if (target == long.class || target == Long.class) return n;
            if (target == String.class) return String.valueOf(n);
        }
        return value;
    }

    private static String encode(Object value) {
        if (value == null) return "null";
        if (value instanceof int[]) return Arrays.toString((int[]) value);
        if (value instanceof long[]) return Arrays.toString((long[]) value);
        if (value instanceof Object[]) {
            StringBuilder sb = new StringBuilder("[");
            Object[] items = (Object[]) value;
            for (int i = 0; i < items.length; i++) {
                if (i > 0) sb.append(", ");
                sb.append(encode(items[i]));
            }
            return sb.append("]").toString();
        }
        if (value.getClass().isArray()) {
            StringBuilder sb = new StringBuilder("[");
            int length = Array.getLength(value);
            for (int i = 0; i < length; i++) {
                if (i > 0) sb.append(", ");
                sb.append(encode(Array.get(value, i)));
            }
            return sb.append("]").toString();
        }
        if (value instanceof Collection) {
            StringBuilder sb = new StringBuilder("[");
            boolean first = true;
            for (Object item : (Collection<?>) value) {
                if (!first) sb.append(", ");
                sb.append(encode(item));
                first = false;
            }
            return sb.append("]").toString();
        }
        return String.valueOf(value);
    }
"#;

const ENTRY: &str = r#"    public static void main(String[] argv) {
        try {
            run();
        } catch (InvocationTargetException e) {
            Throwable cause = e.getCause() != null ? e.getCause() : e;
            cause.printStackTrace();
            System.exit(1);
        } catch (Throwable e) {
            e.printStackTrace();
            System.exit(1);
        }
    }
"#;

impl DriverBackend for JavaBackend {
    fn standard_imports(&self) -> &'static [&'static str] {
        &[
            "import java.util.*;",
            "import java.lang.reflect.*;",
            "import java.nio.charset.StandardCharsets;",
        ]
    }

    fn hoist_imports(&self, user_code: &str) -> (Vec<String>, String) {
        let mut imports = Vec::new();
        let mut body = Vec::new();
        let mut depth: i64 = 0;

        for line in user_code.lines() {
            let trimmed = line.trim();
            if depth == 0 && trimmed.starts_with("import ") && trimmed.ends_with(';') {
                imports.push(trimmed.to_string());
                continue;
            }
            if depth == 0 && trimmed.starts_with("package ") && trimmed.ends_with(';') {
                continue;
            }

            let line = if depth == 0 {
                demote_public_type(line)
            } else {
                line.to_string()
            };
            depth += brace_delta(&line);
            body.push(line);
        }

        (imports, body.join("\n"))
    }

    fn render_step(&self, step: &Step) -> Vec<String> {
        match step {
            Step::ReadLines => vec![
                "String input = new String(System.in.readAllBytes(), StandardCharsets.UTF_8);".into(),
                "List<String> lines = new ArrayList<>();".into(),
                "for (String line : input.split(\"\\n\")) {".into(),
                "    if (!line.trim().isEmpty()) lines.add(line);".into(),
                "}".into(),
            ],
            Step::DecodeArguments => vec![
                "Object[] parsed = new Object[lines.size()];".into(),
                "for (int i = 0; i < parsed.length; i++) {".into(),
                "    parsed[i] = decode(lines.get(i));".into(),
                "}".into(),
            ],
            Step::Instantiate => vec![format!("{0} sol = new {0}();", SOLUTION_CLASS)],
            Step::Locate(target) => {
                let (filter, missing) = match target {
                    MethodTarget::Discover => (
                        "Modifier.isPublic(m.getModifiers()) && !Modifier.isStatic(m.getModifiers()) && !m.isSynthetic()".to_string(),
                        "\"expected exactly one public method on Solution, found \" + candidates.size()".to_string(),
                    ),
                    MethodTarget::Named { name, arity } => (
                        format!(
                            "m.getName().equals({}) && m.getParameterCount() == {} && Modifier.isPublic(m.getModifiers()) && !Modifier.isStatic(m.getModifiers())",
                            string_literal(name),
                            arity
                        ),
                        format!(
                            "\"expected one public method \" + {} + \" taking {} arguments on Solution, found \" + candidates.size()",
                            string_literal(name),
                            arity
                        ),
                    ),
                };
                vec![
                    "List<Method> candidates = new ArrayList<>();".into(),
                    format!("for (Method m : {}.class.getDeclaredMethods()) {{", SOLUTION_CLASS),
                    format!("    if ({}) candidates.add(m);", filter),
                    "}".into(),
                    "if (candidates.size() != 1) {".into(),
                    format!("    fail({});", missing),
                    "    return;".into(),
                    "}".into(),
                    "Method method = candidates.get(0);".into(),
                ]
            }
            // Java always converts by declared parameter types
            Step::CoerceArguments(_) => vec![
                "Class<?>[] paramTypes = method.getParameterTypes();".into(),
                "if (paramTypes.length != parsed.length) {".into(),
                "    fail(method.getName() + \" takes \" + paramTypes.length + \" arguments, input has \" + parsed.length);".into(),
                "    return;".into(),
                "}".into(),
                "Object[] callArgs = new Object[parsed.length];".into(),
                "for (int i = 0; i < parsed.length; i++) {".into(),
                "    callArgs[i] = convert(parsed[i], paramTypes[i]);".into(),
                "}".into(),
            ],
            Step::Invoke => vec![
                "method.setAccessible(true);".into(),
                "Object result = method.invoke(sol, callArgs);".into(),
            ],
            Step::Emit => vec!["System.out.println(encode(result));".into()],
        }
    }

    fn assemble(&self, plan: &DriverPlan, body: &[String]) -> String {
        let mut out = String::new();
        for import in &plan.imports {
            out.push_str(import);
            out.push('\n');
        }
        out.push_str("\npublic class Main {\n");
        out.push_str(ENTRY);
        out.push_str("\n    private static void run() throws Exception {\n");
        push_indented(&mut out, body, "        ");
        out.push_str("    }\n\n");
        out.push_str(HELPERS);
        out.push_str("}\n\n// User Code\n");
        out.push_str(&plan.user_code);
        out.push('\n');
        out
    }
}

const TYPE_KEYWORDS: [&str; 4] = ["class", "interface", "enum", "record"];
const TYPE_MODIFIERS: [&str; 4] = ["final", "abstract", "static", "strictfp"];

/// Drop `public` from a top-level type declaration, keeping indentation
fn demote_public_type(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];
    let Some(rest) = trimmed.strip_prefix("public ") else {
        return line.to_string();
    };

    let declares_type = rest
        .split_whitespace()
        .find(|word| !TYPE_MODIFIERS.contains(word))
        .is_some_and(|word| TYPE_KEYWORDS.contains(&word));

    if declares_type {
        format!("{}{}", indent, rest.trim_start())
    } else {
        line.to_string()
    }
}

/// Net `{` minus `}` on a line, ignoring string and char literals and `//` comments
fn brace_delta(line: &str) -> i64 {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' {
                    chars.next();
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '/' if chars.peek() == Some(&'/') => break,
                '{' => delta += 1,
                '}' => delta -= 1,
                _ => {}
            },
        }
    }

    delta
}
