//! Batch result payloads: one [`GeminiResponse`] per output line.

use super::timestamp;
use super::{child, Content, RequestBody, Schema};
use crate::error::SchemaError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensDetail {
    /// Modality of the counted tokens (`TEXT`, `IMAGE`, `VIDEO`, ...).
    pub modality: String,
    pub token_count: i64,
}

/// Token accounting attached to a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates_token_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates_tokens_details: Option<Vec<TokensDetail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_token_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<Vec<TokensDetail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_token_count: Option<i64>,
    /// Billing classification, e.g. `ON_DEMAND`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_type: Option<String>,
}

/// One generated completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub avg_logprobs: f64,
    pub content: Content,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Creation time, normalized to KST.
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub create_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

impl ResponseBody {
    /// Text of the first part of the first candidate, if that part is text.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.first_text())
    }
}

impl Schema for ResponseBody {
    fn normalize(raw: &mut Value) -> Result<(), SchemaError> {
        normalize_field(raw, "", "createTime")
    }

    fn validate(&self, _path: &str) -> Result<(), SchemaError> {
        Ok(())
    }
}

/// One line of a batch output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiResponse {
    /// Empty on success, otherwise the error message for this request.
    pub status: String,
    /// When the service processed the request, normalized to KST.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub processed_time: DateTime<FixedOffset>,
    pub request: RequestBody,
    /// Empty when the request failed.
    #[serde(default)]
    pub response: ResponseBody,
}

impl GeminiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_empty()
    }

    pub fn text(&self) -> Option<&str> {
        self.response.text()
    }
}

impl std::fmt::Display for GeminiResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<GeminiResponse status={:?} processed_time={} candidates={}>",
            self.status,
            self.processed_time.to_rfc3339(),
            self.response.candidates.len()
        )
    }
}

impl Schema for GeminiResponse {
    fn normalize(raw: &mut Value) -> Result<(), SchemaError> {
        normalize_field(raw, "", "processed_time")?;
        if let Some(response) = raw.get_mut("response") {
            normalize_field(response, "response", "createTime")?;
        }
        Ok(())
    }

    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        self.request.validate(&child(path, "request"))?;
        self.response.validate(&child(path, "response"))
    }
}

/// Per-request failure reported inline by the batch service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// One entry of a job's inline results: a response or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InlineError>,
    /// Opaque per-request metadata echoed back by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl InlineResponse {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn text(&self) -> Option<&str> {
        self.response.as_ref()?.text()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

impl Schema for InlineResponse {
    fn normalize(raw: &mut Value) -> Result<(), SchemaError> {
        if let Some(response) = raw.get_mut("response") {
            normalize_field(response, "response", "createTime")?;
        }
        Ok(())
    }

    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        match (&self.response, &self.error) {
            (Some(_), Some(_)) => Err(SchemaError::constraint(
                path,
                "has both `response` and `error`; expected exactly one",
            )),
            (None, None) => Err(SchemaError::constraint(
                path,
                "has neither `response` nor `error`",
            )),
            (Some(response), None) => response.validate(&child(path, "response")),
            (None, Some(_)) => Ok(()),
        }
    }
}

fn normalize_field(object: &mut Value, path: &str, key: &str) -> Result<(), SchemaError> {
    match object.get_mut(key) {
        Some(value) => timestamp::normalize_value(&child(path, key), value),
        None => Ok(()),
    }
}
