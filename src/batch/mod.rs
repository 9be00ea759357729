//! Batch job collaborators
//!
//! Uploading input files, submitting batch jobs, polling their state and
//! fetching results. The schema and encoder layers never depend on this
//! module; it only consumes the bytes they produce.

pub mod client;
pub mod mock;

pub use client::GeminiBatchClient;
pub use mock::MockBatchClient;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// MIME type used for batch input files.
pub const JSONL_MIME_TYPE: &str = "application/jsonl";

/// A file stored by the remote file service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Lifecycle state of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Unspecified,
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Expired,
}

impl BatchState {
    /// Parses both the REST (`BATCH_STATE_*`) and SDK (`JOB_STATE_*`) spellings.
    pub fn from_wire(raw: &str) -> Self {
        let state = raw
            .strip_prefix("BATCH_STATE_")
            .or_else(|| raw.strip_prefix("JOB_STATE_"))
            .unwrap_or(raw);

        match state {
            "PENDING" | "QUEUED" => Self::Pending,
            "RUNNING" => Self::Running,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "CANCELLED" | "CANCELLING" => Self::Cancelled,
            "EXPIRED" => Self::Expired,
            _ => Self::Unspecified,
        }
    }

    /// Whether the job will not change state any more.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Expired
        )
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unspecified => "BATCH_STATE_UNSPECIFIED",
            Self::Pending => "BATCH_STATE_PENDING",
            Self::Running => "BATCH_STATE_RUNNING",
            Self::Succeeded => "BATCH_STATE_SUCCEEDED",
            Self::Failed => "BATCH_STATE_FAILED",
            Self::Cancelled => "BATCH_STATE_CANCELLED",
            Self::Expired => "BATCH_STATE_EXPIRED",
        };
        f.write_str(name)
    }
}

/// Where a finished job put its results.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutput {
    None,
    /// Name of a downloadable JSONL result file.
    File(String),
    /// Per-request results returned inline, in request order.
    Inline(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    /// Resource name, e.g. `batches/123`.
    pub name: String,
    pub state: BatchState,
    pub output: BatchOutput,
    /// Job-level error message reported by the service, if any.
    pub error: Option<String>,
}

impl BatchJob {
    pub fn new(name: impl Into<String>, state: BatchState) -> Self {
        Self {
            name: name.into(),
            state,
            output: BatchOutput::None,
            error: None,
        }
    }

    pub fn with_output(mut self, output: BatchOutput) -> Self {
        self.output = output;
        self
    }
}

#[async_trait]
pub trait BatchService: Send + Sync {
    async fn upload_file(
        &self,
        display_name: &str,
        data: &[u8],
        mime_type: &str,
    ) -> Result<UploadedFile>;
    async fn create_batch(
        &self,
        model: &str,
        display_name: &str,
        input_file: &str,
    ) -> Result<BatchJob>;
    async fn get_batch(&self, name: &str) -> Result<BatchJob>;
    async fn download_file(&self, name: &str) -> Result<Vec<u8>>;
}
