//! Schema model for the batch inference wire format
//!
//! Request types are built through validating constructors and builders;
//! response types are produced by parsing result lines. Both directions go
//! through [`Schema`], which owns the parse pipeline and the constraint checks.

pub mod common;
pub mod request;
pub mod response;
pub mod timestamp;

pub use common::{Content, FileData, Part, PartKind};
pub use request::{
    GeminiRequest, GenerationConfig, GenerationConfigBuilder, RequestBody, RequestBodyBuilder,
    ThinkingConfig,
};
pub use response::{
    Candidate, GeminiResponse, InlineError, InlineResponse, ResponseBody, TokensDetail,
    UsageMetadata,
};

use crate::error::SchemaError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A validated type of the batch wire format.
///
/// Parsing runs in a fixed order: part-shape resolution, [`Schema::normalize`]
/// on the raw value, typed decoding, then [`Schema::validate`]. Every failure
/// carries the dotted path of the offending field.
pub trait Schema: Serialize + DeserializeOwned {
    /// Rewrites raw field values before typed decoding.
    fn normalize(_raw: &mut Value) -> Result<(), SchemaError> {
        Ok(())
    }

    /// Checks constraints the field types alone do not carry.
    fn validate(&self, path: &str) -> Result<(), SchemaError>;

    fn from_value(mut raw: Value) -> Result<Self, SchemaError> {
        resolve_part_shapes(&raw, "")?;
        Self::normalize(&mut raw)?;
        let parsed: Self = serde_path_to_error::deserialize(raw)?;
        parsed.validate("")?;
        Ok(parsed)
    }

    fn from_json(json: &str) -> Result<Self, SchemaError> {
        let raw: Value = serde_json::from_str(json).map_err(SchemaError::Syntax)?;
        Self::from_value(raw)
    }

    /// Compact JSON using wire names, with absent fields omitted.
    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Schema for FileData {
    fn validate(&self, _path: &str) -> Result<(), SchemaError> {
        Ok(())
    }
}

impl Schema for Part {
    fn normalize(raw: &mut Value) -> Result<(), SchemaError> {
        PartKind::resolve_value(raw)
            .map(|_| ())
            .map_err(|reason| SchemaError::PartUnion {
                path: String::new(),
                reason,
            })
    }

    fn validate(&self, _path: &str) -> Result<(), SchemaError> {
        Ok(())
    }
}

impl Schema for Content {
    fn validate(&self, _path: &str) -> Result<(), SchemaError> {
        Ok(())
    }
}

impl Schema for TokensDetail {
    fn validate(&self, _path: &str) -> Result<(), SchemaError> {
        Ok(())
    }
}

impl Schema for UsageMetadata {
    fn validate(&self, _path: &str) -> Result<(), SchemaError> {
        Ok(())
    }
}

impl Schema for Candidate {
    fn validate(&self, _path: &str) -> Result<(), SchemaError> {
        Ok(())
    }
}

pub(crate) fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

pub(crate) fn index(path: &str, i: usize) -> String {
    format!("{}[{}]", path, i)
}

/// Resolves every element of every `parts` array to a single [`Part`] variant.
///
/// Runs ahead of typed decoding so that an ambiguous or unrecognized part is
/// reported as [`SchemaError::PartUnion`] with its exact path.
fn resolve_part_shapes(value: &Value, path: &str) -> Result<(), SchemaError> {
    match value {
        Value::Object(fields) => {
            for (key, nested) in fields {
                let nested_path = child(path, key);
                match (key.as_str(), nested) {
                    ("parts", Value::Array(parts)) => {
                        for (i, part) in parts.iter().enumerate() {
                            let part_path = index(&nested_path, i);
                            PartKind::resolve_value(part).map_err(|reason| {
                                SchemaError::PartUnion {
                                    path: part_path.clone(),
                                    reason,
                                }
                            })?;
                            resolve_part_shapes(part, &part_path)?;
                        }
                    }
                    _ => resolve_part_shapes(nested, &nested_path)?,
                }
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                resolve_part_shapes(item, &index(path, i))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PartShapeError;
    use serde_json::json;

    #[test]
    fn test_child_and_index_paths() {
        assert_eq!(child("", "request"), "request");
        assert_eq!(child("request", "contents"), "request.contents");
        assert_eq!(index("request.contents", 3), "request.contents[3]");
    }

    #[test]
    fn test_part_with_both_keys_fails_union_resolution() {
        let err = Part::from_value(json!({
            "text": "caption",
            "fileData": { "fileUri": "gs://b/a.png", "mimeType": "image/png" }
        }))
        .unwrap_err();

        match err {
            SchemaError::PartUnion { path, reason } => {
                assert_eq!(path, "");
                assert_eq!(reason, PartShapeError::Ambiguous);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_part_with_neither_key_fails_union_resolution() {
        let err = Part::from_json(r#"{"videoMetadata":{}}"#).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::PartUnion {
                reason: PartShapeError::Unrecognized,
                ..
            }
        ));
    }

    #[test]
    fn test_non_object_part_fails_union_resolution() {
        let err = Content::from_value(json!({ "role": "user", "parts": ["just text"] }))
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::PartUnion {
                reason: PartShapeError::NotAnObject,
                ..
            }
        ));
        assert_eq!(err.path(), "parts[0]");
    }

    #[test]
    fn test_candidate_parts_are_resolved_too() {
        let err = Candidate::from_value(json!({
            "avgLogprobs": -0.1,
            "content": { "role": "model", "parts": [{}] },
            "finishReason": "STOP"
        }))
        .unwrap_err();
        assert_eq!(err.path(), "content.parts[0]");
    }

    #[test]
    fn test_invalid_json_is_a_syntax_error() {
        let err = GeminiRequest::from_json("{\"request\":").unwrap_err();
        assert!(matches!(err, SchemaError::Syntax(_)));
    }

    #[test]
    fn test_file_data_parses_from_wire_names() {
        let file = FileData::from_json(r#"{"fileUri":"gs://b/a.png","mimeType":"image/png"}"#)
            .unwrap();
        assert_eq!(file, FileData::new("gs://b/a.png", "image/png"));
    }
}
