//! JSONL encoding for batch input files and decoding for batch output files
//!
//! A batch input file is one JSON object per line, joined by `\n` with no
//! trailing newline. Schema types are written compactly using their wire
//! names; plain mappings are written in key order with `", "` and `": "`
//! separators. Anything else aborts the whole batch.

use crate::error::{Error, SchemaError};
use crate::models::{
    Candidate, Content, FileData, GeminiRequest, GeminiResponse, GenerationConfig,
    InlineResponse, Part, RequestBody, ResponseBody, Schema, ThinkingConfig, TokensDetail,
    UsageMetadata,
};
use crate::Result;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io;

/// An item the default encoder knows how to turn into one line.
pub trait JsonlRecord {
    fn to_json_line(&self) -> Result<String>;
}

impl<R: JsonlRecord + ?Sized> JsonlRecord for &R {
    fn to_json_line(&self) -> Result<String> {
        (**self).to_json_line()
    }
}

impl<R: JsonlRecord + ?Sized> JsonlRecord for Box<R> {
    fn to_json_line(&self) -> Result<String> {
        (**self).to_json_line()
    }
}

macro_rules! schema_records {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl JsonlRecord for $ty {
                fn to_json_line(&self) -> Result<String> {
                    Ok(self.to_json()?)
                }
            }
        )+
    };
}

schema_records!(
    FileData,
    Part,
    Content,
    ThinkingConfig,
    GenerationConfig,
    RequestBody,
    GeminiRequest,
    TokensDetail,
    UsageMetadata,
    Candidate,
    ResponseBody,
    GeminiResponse,
    InlineResponse,
);

impl JsonlRecord for Map<String, Value> {
    fn to_json_line(&self) -> Result<String> {
        to_spaced_string(self)
    }
}

impl<V: Serialize> JsonlRecord for BTreeMap<String, V> {
    fn to_json_line(&self) -> Result<String> {
        to_spaced_string(self)
    }
}

impl<V: Serialize> JsonlRecord for IndexMap<String, V> {
    fn to_json_line(&self) -> Result<String> {
        to_spaced_string(self)
    }
}

/// Untyped values are accepted only when they are objects.
impl JsonlRecord for Value {
    fn to_json_line(&self) -> Result<String> {
        match self {
            Value::Object(map) => map.to_json_line(),
            other => Err(Error::UnsupportedType(json_type_name(other).to_string())),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Single-line formatter that puts a space after `,` and `:`.
#[derive(Debug, Clone, Copy, Default)]
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

fn to_spaced_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8(buf).map_err(|e| e.utf8_error())?)
}

/// Encodes `items` as JSONL using each item's default representation.
///
/// Fails on the first item that cannot be encoded; no partial buffer is
/// returned.
pub fn to_jsonl_bytes<I>(items: I) -> Result<Vec<u8>>
where
    I: IntoIterator,
    I::Item: JsonlRecord,
{
    let lines = items
        .into_iter()
        .map(|item| item.to_json_line())
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!("Encoded {} JSONL lines", lines.len());
    Ok(lines.join("\n").into_bytes())
}

/// Encodes `items` as JSONL, using `serializer`'s output verbatim as each line.
pub fn to_jsonl_bytes_with<I, F>(items: I, serializer: F) -> Vec<u8>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> String,
{
    items
        .into_iter()
        .map(serializer)
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

/// Parses a JSONL buffer into schema values, one per non-blank line.
///
/// Each line is decoded on its own, so a bad line (invalid UTF-8 included)
/// only affects its own entry and the caller can skip or abort. Failures
/// report the 1-based line number.
pub fn read_jsonl<T: Schema>(bytes: &[u8]) -> Vec<Result<T>> {
    bytes
        .split(|&b| b == b'\n')
        .enumerate()
        .filter_map(|(i, raw)| {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let parsed = match std::str::from_utf8(raw) {
                Ok(line) if line.trim().is_empty() => return None,
                Ok(line) => T::from_json(line),
                Err(e) => Err(SchemaError::Encoding(e)),
            };
            Some(parsed.map_err(|source| Error::Line {
                line: i + 1,
                source,
            }))
        })
        .collect()
}
