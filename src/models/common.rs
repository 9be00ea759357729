//! Content payload types shared by batch requests and responses.

use crate::error::PartShapeError;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reference to media already uploaded to the file service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub file_uri: String,
    pub mime_type: String,
}

impl FileData {
    pub fn new(file_uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            file_uri: file_uri.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// One segment of a multimodal turn: either text or a file reference.
///
/// Serializes untagged (`{"text": ..}` or `{"fileData": ..}`). Decoding goes
/// through [`PartKind::resolve`] instead of trying each variant in turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn file_data(file_uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::FileData {
            file_data: FileData::new(file_uri, mime_type),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::FileData { .. } => None,
        }
    }

    pub fn as_file_data(&self) -> Option<&FileData> {
        match self {
            Self::FileData { file_data } => Some(file_data),
            Self::Text { .. } => None,
        }
    }

    pub fn kind(&self) -> PartKind {
        match self {
            Self::Text { .. } => PartKind::Text,
            Self::FileData { .. } => PartKind::FileData,
        }
    }
}

/// Discriminant of a [`Part`], decided by which shape-defining key is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Text,
    FileData,
}

impl PartKind {
    pub const TEXT_KEY: &'static str = "text";
    pub const FILE_DATA_KEY: &'static str = "fileData";

    /// Picks the variant for a raw part object.
    ///
    /// The text shape is checked first, then the file-data shape. An object
    /// carrying both keys is rejected rather than silently read as text. Keys
    /// other than the two discriminants are ignored.
    pub fn resolve(fields: &Map<String, Value>) -> Result<Self, PartShapeError> {
        match (
            fields.contains_key(Self::TEXT_KEY),
            fields.contains_key(Self::FILE_DATA_KEY),
        ) {
            (true, true) => Err(PartShapeError::Ambiguous),
            (true, false) => Ok(Self::Text),
            (false, true) => Ok(Self::FileData),
            (false, false) => Err(PartShapeError::Unrecognized),
        }
    }

    /// Like [`PartKind::resolve`], for a value that may not be an object.
    pub fn resolve_value(value: &Value) -> Result<Self, PartShapeError> {
        match value {
            Value::Object(fields) => Self::resolve(fields),
            _ => Err(PartShapeError::NotAnObject),
        }
    }
}

#[derive(Deserialize)]
struct TextFields {
    text: String,
}

#[derive(Deserialize)]
struct FileDataFields {
    #[serde(rename = "fileData")]
    file_data: FileData,
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        let kind = PartKind::resolve(&fields).map_err(de::Error::custom)?;
        let fields = Value::Object(fields);

        match kind {
            PartKind::Text => {
                let TextFields { text } =
                    serde_json::from_value(fields).map_err(de::Error::custom)?;
                Ok(Self::Text { text })
            }
            PartKind::FileData => {
                let FileDataFields { file_data } =
                    serde_json::from_value(fields).map_err(de::Error::custom)?;
                Ok(Self::FileData { file_data })
            }
        }
    }
}

/// A single conversational turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Speaker of this turn (`user`, `model`, ...).
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            role: role.into(),
            parts,
        }
    }

    pub fn user(parts: Vec<Part>) -> Self {
        Self::new("user", parts)
    }

    /// First text part of this turn, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(Part::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_part_serializes_with_wire_names() {
        let parts = vec![
            Part::text("Describe this image"),
            Part::file_data("gs://bucket/car.jpeg", "image/jpeg"),
        ];

        let json = serde_json::to_string(&parts).unwrap();
        assert_eq!(
            json,
            r#"[{"text":"Describe this image"},{"fileData":{"fileUri":"gs://bucket/car.jpeg","mimeType":"image/jpeg"}}]"#
        );
    }

    #[test]
    fn test_part_deserializes_each_variant() {
        let text: Part = serde_json::from_value(json!({ "text": "hello" })).unwrap();
        assert_eq!(text, Part::text("hello"));

        let file: Part = serde_json::from_value(json!({
            "fileData": { "fileUri": "gs://b/a.mp4", "mimeType": "video/mp4" }
        }))
        .unwrap();
        assert_eq!(file.kind(), PartKind::FileData);
    }

    #[test]
    fn test_part_ignores_extra_keys() {
        let part: Part =
            serde_json::from_value(json!({ "text": "thinking...", "thought": true })).unwrap();
        assert_eq!(part.as_text(), Some("thinking..."));
    }

    #[test]
    fn test_part_with_both_keys_is_ambiguous() {
        let raw = json!({
            "text": "hi",
            "fileData": { "fileUri": "gs://b/a.png", "mimeType": "image/png" }
        });
        assert_eq!(
            PartKind::resolve_value(&raw),
            Err(PartShapeError::Ambiguous)
        );

        let err = serde_json::from_value::<Part>(raw).unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn test_part_with_neither_key_is_unrecognized() {
        let raw = json!({ "inlineData": { "data": "", "mimeType": "image/png" } });
        assert_eq!(
            PartKind::resolve_value(&raw),
            Err(PartShapeError::Unrecognized)
        );
        assert!(serde_json::from_value::<Part>(raw).is_err());
    }

    #[test]
    fn test_file_data_part_requires_mime_type() {
        let raw = json!({ "fileData": { "fileUri": "gs://b/a.png" } });
        let err = serde_json::from_value::<Part>(raw).unwrap_err();
        assert!(err.to_string().contains("mimeType"));
    }

    #[test]
    fn test_content_first_text_skips_file_parts() {
        let content = Content::user(vec![
            Part::file_data("gs://b/logo.png", "image/png"),
            Part::text("What app is this logo from?"),
        ]);
        assert_eq!(content.role, "user");
        assert_eq!(content.first_text(), Some("What app is this logo from?"));
    }
}
