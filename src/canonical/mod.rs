//! Canonical JSON serialization.
//!
//! The canonical form of a document is:
//!   - compact (no whitespace between tokens),
//!   - object members in ascending byte order of their names, at every depth,
//!   - array elements in source order,
//!   - numbers exactly as written in the source,
//!   - terminated by a single `\n`.
//!
//! Two documents that differ only in member order or formatting therefore
//! serialize to identical bytes.
//!
//! # String escaping
//! `"` and `\` are backslash-escaped, `\b \t \n \f \r` use their short forms,
//! the remaining C0 controls become `\u00xx` (lowercase hex), and U+2028 /
//! U+2029 are escaped so the output stays valid JavaScript.  Everything else,
//! including non-ASCII text and `/`, is written through unchanged.

use std::fmt::Write;

use crate::value::{ParseError, StructuredValue};

/// Parse `text` and return its canonical serialization.
pub fn canonicalize(text: &str) -> Result<String, ParseError> {
    let value = StructuredValue::parse(text)?;
    Ok(to_canonical_string(&value))
}

/// Serialize an already parsed value.  Infallible: every [`StructuredValue`]
/// has exactly one canonical form.
pub fn to_canonical_string(value: &StructuredValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out.push('\n');
    out
}

fn write_value(out: &mut String, value: &StructuredValue) {
    match value {
        StructuredValue::Null      => out.push_str("null"),
        StructuredValue::Bool(b)   => out.push_str(if *b { "true" } else { "false" }),
        StructuredValue::Number(n) => out.push_str(n.as_str()),
        StructuredValue::String(s) => write_string(out, s),
        StructuredValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        StructuredValue::Object(members) => {
            let mut sorted: Vec<&(String, StructuredValue)> = members.iter().collect();
            sorted.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));

            out.push('{');
            for (i, (key, member)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, member);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"'  => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{0C}' => out.push_str("\\f"),
            '\u{2028}' | '\u{2029}' => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c if u32::from(c) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
