//! Error handling and custom error types
//!
//! Provides unified error handling across the crate using thiserror. Schema
//! failures get their own enum so callers building a batch can inspect the
//! offending field path and decide whether to skip the item or abort.

use thiserror::Error;

/// Why a raw part object could not be resolved to a single [`Part`] variant.
///
/// [`Part`]: crate::models::Part
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartShapeError {
    #[error("part has both `text` and `fileData`; expected exactly one")]
    Ambiguous,

    #[error("part has neither `text` nor `fileData`")]
    Unrecognized,

    #[error("part must be a JSON object")]
    NotAnObject,
}

/// A value that does not fit the batch request/response schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Malformed JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    #[error("Invalid UTF-8: {0}")]
    Encoding(#[source] std::str::Utf8Error),

    #[error("{}: {constraint}", display_path(.path))]
    Constraint { path: String, constraint: String },

    #[error("{}: {reason}", display_path(.path))]
    PartUnion {
        path: String,
        #[source]
        reason: PartShapeError,
    },

    #[error("{}: malformed timestamp {raw:?}: {source}", display_path(.field))]
    Timestamp {
        field: String,
        raw: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl SchemaError {
    pub(crate) fn constraint(path: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::Constraint {
            path: path.into(),
            constraint: constraint.into(),
        }
    }

    /// Dotted field path of the offending value (`""` for the document root).
    pub fn path(&self) -> &str {
        match self {
            Self::Syntax(_) | Self::Encoding(_) => "",
            Self::Constraint { path, .. } | Self::PartUnion { path, .. } => path,
            Self::Timestamp { field, .. } => field,
        }
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for SchemaError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let path = match err.path().to_string() {
            root if root == "." => String::new(),
            path => path,
        };
        Self::Constraint {
            path,
            constraint: err.into_inner().to_string(),
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Schema validation error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: SchemaError,
    },

    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Gemini API error: {0}")]
    Api(String),

    #[error("Batch job error: {0}")]
    Batch(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
