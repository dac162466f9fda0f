//! Parsed JSON documents with numbers kept as their literal source text.
//!
//! A [`StructuredValue`] lives only as long as the processing of one archive
//! entry: parse the payload, hand the tree to [`crate::canonical`], drop it.
//!
//! # Numbers
//! [`Number`] stores the exact slice of source text the number occupied.
//! Parsing walks the document through `serde_json` one level at a time,
//! deserializing each member as a borrowed [`RawValue`]; scalars are decoded
//! from their raw slice, and numbers keep that slice verbatim.  A literal such
//! as `1E+2`, `1e400` or `0.1000000000000000055511151231257827` never passes
//! through a binary numeric type and comes back out unchanged.

use std::collections::HashMap;
use std::fmt;
use std::string::FromUtf8Error;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::value::RawValue;
use thiserror::Error;

/// Deepest array/object nesting accepted by [`StructuredValue::parse`].
pub const MAX_DEPTH: usize = 64;

// ── ParseError ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
    #[error("expected a JSON object at the document root, found {0}")]
    NotAnObject(&'static str),
}

// ── Number ───────────────────────────────────────────────────────────────────

/// A JSON number in its exact textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Number(String);

impl Number {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ── StructuredValue ──────────────────────────────────────────────────────────

/// Tagged JSON value tree.
///
/// Object members are kept in the order they first appear; ordering for
/// output is decided by the serializer, not here.  Member names are unique:
/// when a document repeats a key, the last value wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<StructuredValue>),
    Object(Vec<(String, StructuredValue)>),
}

impl StructuredValue {
    /// Parse a complete JSON document.  Anything other than whitespace after
    /// the top-level value is rejected.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let raw: &RawValue = serde_json::from_str(text)?;
        Self::from_raw(raw, 0)
    }

    /// Decode `bytes` as UTF-8 and parse them.
    pub fn parse_bytes(bytes: Vec<u8>) -> Result<Self, ParseError> {
        let text = String::from_utf8(bytes)?;
        Self::parse(&text)
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            StructuredValue::Null      => "null",
            StructuredValue::Bool(_)   => "boolean",
            StructuredValue::Number(_) => "number",
            StructuredValue::String(_) => "string",
            StructuredValue::Array(_)  => "array",
            StructuredValue::Object(_) => "object",
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, StructuredValue::Object(_))
    }

    // `raw` has already been validated by serde_json, so its first byte
    // identifies the value's type.
    fn from_raw(raw: &RawValue, depth: usize) -> Result<Self, ParseError> {
        let text = raw.get();
        match text.as_bytes().first() {
            Some(b'{') => {
                let depth = descend(depth)?;
                let Members(members) = serde_json::from_str(text)?;
                let mut object: Vec<(String, StructuredValue)> = Vec::with_capacity(members.len());
                let mut slots: HashMap<String, usize> = HashMap::with_capacity(members.len());
                for (key, member) in members {
                    let member = Self::from_raw(member, depth)?;
                    match slots.get(&key) {
                        Some(&i) => object[i].1 = member,
                        None => {
                            slots.insert(key.clone(), object.len());
                            object.push((key, member));
                        }
                    }
                }
                Ok(StructuredValue::Object(object))
            }
            Some(b'[') => {
                let depth = descend(depth)?;
                let items: Vec<&RawValue> = serde_json::from_str(text)?;
                let items = items
                    .into_iter()
                    .map(|item| Self::from_raw(item, depth))
                    .collect::<Result<_, _>>()?;
                Ok(StructuredValue::Array(items))
            }
            Some(b'"') => Ok(StructuredValue::String(serde_json::from_str(text)?)),
            Some(b't') | Some(b'f') => Ok(StructuredValue::Bool(serde_json::from_str(text)?)),
            Some(b'n') => Ok(StructuredValue::Null),
            _ => Ok(StructuredValue::Number(Number(text.to_owned()))),
        }
    }
}

fn descend(depth: usize) -> Result<usize, ParseError> {
    if depth >= MAX_DEPTH {
        return Err(ParseError::TooDeep(MAX_DEPTH));
    }
    Ok(depth + 1)
}

// ── Members ──────────────────────────────────────────────────────────────────

/// One object level: names decoded, values still raw, in source order and
/// including repeated names.
struct Members<'a>(Vec<(String, &'a RawValue)>);

impl<'de> Deserialize<'de> for Members<'de> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MembersVisitor;

        impl<'de> Visitor<'de> for MembersVisitor {
            type Value = Members<'de>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut members = Vec::new();
                while let Some(entry) = map.next_entry::<String, &'de RawValue>()? {
                    members.push(entry);
                }
                Ok(Members(members))
            }
        }

        deserializer.deserialize_map(MembersVisitor)
    }
}
