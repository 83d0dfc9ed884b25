//! Value codec shared by every driver backend
//!
//! Test case inputs hold one literal per line and expected outputs hold one
//! literal in canonical form. The grammar is deliberately small: integers,
//! flat integer arrays and strings. Each driver backend re-implements the same
//! rules in its target language, so this module is the reference for what a
//! harness accepts and prints.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A decoded argument or result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    IntegerArray(Vec<i64>),
    Str(String),
}

/// Shape of a value, used by method signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Integer,
    IntegerArray,
    String,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Integer => "integer",
            ValueKind::IntegerArray => "integer_array",
            ValueKind::String => "string",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid array element {element:?} in {line:?}")]
    InvalidArrayElement { line: String, element: String },
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::IntegerArray(_) => ValueKind::IntegerArray,
            Value::Str(_) => ValueKind::String,
        }
    }

    /// Literal form suitable for a stdin line; strings are quoted so that
    /// numeric-looking text survives a decode.
    pub fn literal(&self) -> String {
        match self {
            Value::Str(s) => format!("\"{}\"", s),
            other => encode(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(self))
    }
}

/// Decode a single literal line
pub fn decode(line: &str) -> Result<Value, CodecError> {
    let text = line.trim();

    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        let inner = inner.trim();
        if inner.is_empty() {
            return Ok(Value::IntegerArray(Vec::new()));
        }
        let items = inner
            .split(',')
            .map(|part| {
                let part = part.trim();
                part.parse::<i64>()
                    .map_err(|_| CodecError::InvalidArrayElement {
                        line: text.to_string(),
                        element: part.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::IntegerArray(items));
    }

    if let Ok(n) = text.parse::<i64>() {
        return Ok(Value::Integer(n));
    }

    Ok(Value::Str(strip_quotes(text).to_string()))
}

/// Encode a value in its canonical output form
pub fn encode(value: &Value) -> String {
    match value {
        Value::Integer(n) => n.to_string(),
        Value::IntegerArray(items) => {
            let parts: Vec<String> = items.iter().map(|n| n.to_string()).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Str(s) => s.clone(),
    }
}

/// Decode a whole stdin payload the way a harness does: one literal per
/// non-blank line, in order.
pub fn decode_lines(input: &str) -> Result<Vec<Value>, CodecError> {
    input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(decode)
        .collect()
}

/// Build a stdin payload from argument values
pub fn encode_input(values: &[Value]) -> String {
    let mut out = String::new();
    for value in values {
        out.push_str(&value.literal());
        out.push('\n');
    }
    out
}

fn strip_quotes(text: &str) -> &str {
    if text.len() >= 2 {
        for quote in ['"', '\''] {
            if let Some(inner) = text.strip_prefix(quote).and_then(|t| t.strip_suffix(quote)) {
                return inner;
            }
        }
    }
    text
}
