use super::{BatchJob, BatchOutput, BatchService, BatchState, UploadedFile};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Gemini Developer API client for the Files and Batch endpoints.
pub struct GeminiBatchClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadStartRequest<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Serialize)]
struct CreateBatchRequest<'a> {
    batch: BatchSpec<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchSpec<'a> {
    display_name: &'a str,
    input_config: InputConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputConfig<'a> {
    file_name: &'a str,
}

/// Long-running operation envelope returned by the batch endpoints.
#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    metadata: Option<BatchMetadata>,
    #[serde(default)]
    response: Option<BatchResult>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    output: Option<BatchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchResult {
    #[serde(default)]
    responses_file: Option<String>,
    #[serde(default)]
    inlined_responses: Option<InlinedResponses>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlinedResponses {
    #[serde(default)]
    inlined_responses: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

impl BatchResult {
    fn into_output(self) -> BatchOutput {
        match (self.responses_file, self.inlined_responses) {
            (Some(file), _) => BatchOutput::File(file),
            (None, Some(inline)) => BatchOutput::Inline(inline.inlined_responses),
            (None, None) => BatchOutput::None,
        }
    }
}

impl From<Operation> for BatchJob {
    fn from(op: Operation) -> Self {
        let (name, state, metadata_output) = match op.metadata {
            Some(metadata) => (
                metadata.name.unwrap_or(op.name),
                metadata.state.as_deref().map(BatchState::from_wire),
                metadata.output,
            ),
            None => (op.name, None, None),
        };

        let output = op
            .response
            .or(metadata_output)
            .map(BatchResult::into_output)
            .unwrap_or(BatchOutput::None);

        let error = op.error.map(|e| e.message);
        let state = state.unwrap_or(if error.is_some() {
            BatchState::Failed
        } else {
            BatchState::Unspecified
        });

        Self {
            name,
            state,
            output,
            error,
        }
    }
}

impl GeminiBatchClient {
    pub fn new(api_key: String) -> Self {
        Self::new_with_client(api_key, Client::new())
    }

    pub fn new_with_client(api_key: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .timeout(self.timeout)
            .header("x-goog-api-key", &self.api_key)
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let response = self.authorized(request).send().await.map_err(|e| {
            tracing::error!("Failed to send {} request to Gemini: {}", action, e);
            e
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!(
                "Gemini {} error (status {}): {}",
                action,
                status,
                error_text
            );
            return Err(Error::Api(format!(
                "{} failed (status {}): {}",
                action, status, error_text
            )));
        }

        Ok(response)
    }

    async fn parse<Resp: DeserializeOwned>(response: Response, action: &str) -> Result<Resp> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse Gemini {} response: {}\nBody: {}", action, e, body);
            Error::Api(format!("Failed to parse {} response: {}", action, e))
        })
    }
}

#[async_trait]
impl BatchService for GeminiBatchClient {
    async fn upload_file(
        &self,
        display_name: &str,
        data: &[u8],
        mime_type: &str,
    ) -> Result<UploadedFile> {
        tracing::debug!(
            "Starting upload of {} ({} bytes, {})",
            display_name,
            data.len(),
            mime_type
        );

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", data.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&UploadStartRequest {
                file: UploadMetadata { display_name },
            });
        let response = self.send(start, "upload start").await?;

        let upload_url = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Api("Upload start response had no upload URL".to_string()))?;

        let finalize = self
            .client
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("Content-Type", mime_type)
            .body(data.to_vec());
        let response = self.send(finalize, "upload").await?;

        let uploaded: UploadResponse = Self::parse(response, "upload").await?;
        tracing::debug!("Uploaded {} as {}", display_name, uploaded.file.name);
        Ok(uploaded.file)
    }

    async fn create_batch(
        &self,
        model: &str,
        display_name: &str,
        input_file: &str,
    ) -> Result<BatchJob> {
        let model = model.strip_prefix("models/").unwrap_or(model);
        let request = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:batchGenerateContent",
                self.base_url, model
            ))
            .json(&CreateBatchRequest {
                batch: BatchSpec {
                    display_name,
                    input_config: InputConfig {
                        file_name: input_file,
                    },
                },
            });

        let response = self.send(request, "batch create").await?;
        let operation: Operation = Self::parse(response, "batch create").await?;
        Ok(operation.into())
    }

    async fn get_batch(&self, name: &str) -> Result<BatchJob> {
        let request = self
            .client
            .get(format!("{}/v1beta/{}", self.base_url, name));

        let response = self.send(request, "batch get").await?;
        let operation: Operation = Self::parse(response, "batch get").await?;
        Ok(operation.into())
    }

    async fn download_file(&self, name: &str) -> Result<Vec<u8>> {
        let request = self
            .client
            .get(format!("{}/download/v1beta/{}:download", self.base_url, name))
            .query(&[("alt", "media")]);

        let response = self.send(request, "download").await?;
        Ok(response.bytes().await?.to_vec())
    }
}
