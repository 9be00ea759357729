//! Batch pipeline orchestration: manifest entries are uploaded, turned into
//! typed requests, encoded as JSONL, submitted as a batch job, polled, and
//! read back as parsed responses.

use crate::batch::{
    BatchJob, BatchOutput, BatchService, BatchState, GeminiBatchClient, UploadedFile,
    JSONL_MIME_TYPE,
};
use crate::config::Config;
use crate::jsonl::{read_jsonl, to_jsonl_bytes};
use crate::mime::detect_mime;
use crate::models::{
    Content, GeminiRequest, GeminiResponse, GenerationConfig, InlineResponse, Part, RequestBody,
    Schema, ThinkingConfig,
};
use crate::{Error, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_retry::{strategy::FixedInterval, Retry};
use tracing::{info, warn};

/// Display name given to uploaded batch input files.
pub const INPUT_DISPLAY_NAME: &str = "my_gemini_batch_request";

/// One media file and the prompt to ask about it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestEntry {
    pub file: PathBuf,
    pub prompt: String,
}

/// Reads a JSON array of manifest entries.
///
/// Relative file paths are resolved against the manifest's own directory.
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let raw = fs::read_to_string(path)?;
    let mut entries: Vec<ManifestEntry> = serde_json::from_str(&raw)?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    for entry in &mut entries {
        if entry.file.is_relative() {
            entry.file = base.join(&entry.file);
        }
    }
    Ok(entries)
}

/// Pipeline knobs, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub model: String,
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    pub max_polls: u32,
    /// Delay between retries of a failed status check.
    pub retry_delay: Duration,
    pub generation_config: GenerationConfig,
}

impl Settings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let generation_config = GenerationConfig::builder()
            .max_output_tokens(config.max_output_tokens)
            .thinking_config(ThinkingConfig::new(config.thinking_budget)?)
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            output_dir: config.output_dir.clone(),
            poll_interval: config.poll_interval,
            max_polls: config.max_polls,
            retry_delay: Duration::from_secs(2),
            generation_config,
        })
    }
}

/// Outcome of reading a finished job's results.
#[derive(Debug)]
pub struct BatchReport {
    pub job: BatchJob,
    /// Full output lines, from the result file or echoed inline.
    pub responses: Vec<GeminiResponse>,
    /// Inline `response`/`error` envelopes, in request order.
    pub inline: Vec<InlineResponse>,
    /// Result entries that did not parse; each is logged as it is skipped.
    pub rejected: usize,
}

impl BatchReport {
    /// Requests the service reported as failed.
    pub fn failed(&self) -> usize {
        self.responses.iter().filter(|r| !r.is_success()).count()
            + self.inline.iter().filter(|r| !r.is_success()).count()
    }
}

fn keep_readable<T>(results: impl IntoIterator<Item = Result<T>>) -> (Vec<T>, usize) {
    let mut readable = Vec::new();
    let mut rejected = 0;
    for result in results {
        match result {
            Ok(entry) => readable.push(entry),
            Err(e) => {
                warn!("Skipping unreadable result: {}", e);
                rejected += 1;
            }
        }
    }
    (readable, rejected)
}

pub struct App {
    batch: Box<dyn BatchService>,
    settings: Settings,
}

impl App {
    /// Build an app against the live Gemini API.
    pub fn new(config: &Config) -> Result<Self> {
        let client =
            GeminiBatchClient::new(config.api_key.clone()).with_base_url(config.base_url.clone());
        Ok(Self::with_service(
            Box::new(client),
            Settings::from_config(config)?,
        ))
    }

    /// Build an app from an injected batch service, mainly for tests.
    pub fn with_service(batch: Box<dyn BatchService>, settings: Settings) -> Self {
        Self { batch, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Uploads each entry's media file, in manifest order.
    pub async fn upload_media(&self, entries: &[ManifestEntry]) -> Result<Vec<UploadedFile>> {
        let mut uploads = Vec::with_capacity(entries.len());
        for entry in entries {
            let data = fs::read(&entry.file)?;
            let mime_type = detect_mime(&entry.file, &data);
            let display_name = entry
                .file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| entry.file.display().to_string());

            let uploaded = self
                .batch
                .upload_file(&display_name, &data, mime_type)
                .await?;
            info!(
                "Uploaded {} as {} ({})",
                entry.file.display(),
                uploaded.name,
                uploaded.mime_type
            );
            uploads.push(uploaded);
        }
        Ok(uploads)
    }

    /// One request per entry: the file reference first, then the prompt.
    pub fn build_requests(
        &self,
        entries: &[ManifestEntry],
        uploads: &[UploadedFile],
    ) -> Result<Vec<GeminiRequest>> {
        if entries.len() != uploads.len() {
            return Err(Error::Batch(format!(
                "{} manifest entries but {} uploads",
                entries.len(),
                uploads.len()
            )));
        }

        entries
            .iter()
            .zip(uploads)
            .enumerate()
            .map(|(i, (entry, uploaded))| -> Result<GeminiRequest> {
                let mime_type = if uploaded.mime_type.is_empty() {
                    detect_mime(&entry.file, &[])
                } else {
                    uploaded.mime_type.as_str()
                };
                let body = RequestBody::builder()
                    .content(Content::user(vec![
                        Part::file_data(uploaded.uri.clone(), mime_type),
                        Part::text(entry.prompt.clone()),
                    ]))
                    .generation_config(self.settings.generation_config.clone())
                    .label("item", i.to_string())
                    .build()?;
                Ok(GeminiRequest::new(body))
            })
            .collect()
    }

    /// Writes a local copy of the encoded input file.
    pub fn save_local(&self, jsonl: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.settings.output_dir)?;
        let path = self
            .settings
            .output_dir
            .join(format!("{}_gemini_requests.jsonl", Utc::now().timestamp()));
        fs::write(&path, jsonl)?;
        info!("Saved JSONL locally at: {}", path.display());
        Ok(path)
    }

    /// Encodes `requests`, uploads them, and creates the batch job.
    pub async fn submit_requests(&self, requests: &[GeminiRequest]) -> Result<BatchJob> {
        let jsonl = to_jsonl_bytes(requests)?;
        self.save_local(&jsonl)?;

        let input = self
            .batch
            .upload_file(INPUT_DISPLAY_NAME, &jsonl, JSONL_MIME_TYPE)
            .await?;
        info!("Uploaded batch input {} ({} requests)", input.name, requests.len());

        let job = self
            .batch
            .create_batch(&self.settings.model, INPUT_DISPLAY_NAME, &input.name)
            .await?;
        info!(
            "Created batch job {} on {} (state: {})",
            job.name, self.settings.model, job.state
        );
        Ok(job)
    }

    /// Uploads media, builds requests and submits them as one batch job.
    pub async fn submit(&self, entries: &[ManifestEntry]) -> Result<BatchJob> {
        let uploads = self.upload_media(entries).await?;
        let requests = self.build_requests(entries, &uploads)?;
        self.submit_requests(&requests).await
    }

    /// Current job state, retrying transient failures.
    pub async fn status(&self, name: &str) -> Result<BatchJob> {
        let retry_strategy = FixedInterval::new(self.settings.retry_delay).take(3);

        Retry::spawn(retry_strategy, || async move {
            self.batch.get_batch(name).await.map_err(|e| {
                warn!("Status check for {} failed: {}. Will retry...", name, e);
                e
            })
        })
        .await
    }

    /// Polls until the job reaches a terminal state or the poll budget runs out.
    pub async fn wait_for_completion(&self, name: &str) -> Result<BatchJob> {
        for poll in 1..=self.settings.max_polls {
            tokio::time::sleep(self.settings.poll_interval).await;

            let job = self.status(name).await?;
            info!(
                "Batch {} state: {} (poll {}/{})",
                name, job.state, poll, self.settings.max_polls
            );
            if job.state.is_terminal() {
                return Ok(job);
            }
        }

        Err(Error::Batch(format!(
            "Batch {} did not finish after {} polls",
            name, self.settings.max_polls
        )))
    }

    /// Downloads or reads inline results of a finished job.
    pub async fn fetch_results(&self, job: BatchJob) -> Result<BatchReport> {
        if job.state != BatchState::Succeeded {
            return Err(Error::Batch(format!(
                "Batch {} ended in state {}{}",
                job.name,
                job.state,
                job.error
                    .as_deref()
                    .map(|e| format!(": {}", e))
                    .unwrap_or_default()
            )));
        }

        let (responses, inline, rejected) = match &job.output {
            BatchOutput::File(name) => {
                info!("Downloading result file {}", name);
                let bytes = self.batch.download_file(name).await?;
                let (responses, rejected) = keep_readable(read_jsonl::<GeminiResponse>(&bytes));
                (responses, Vec::new(), rejected)
            }
            BatchOutput::Inline(items) => {
                // Entries echoing their request are full output lines; the rest
                // are `response`/`error` envelopes.
                let (lines, envelopes): (Vec<&Value>, Vec<&Value>) =
                    items.iter().partition(|item| item.get("request").is_some());
                let (responses, rejected_lines) = keep_readable(
                    lines
                        .into_iter()
                        .map(|item| GeminiResponse::from_value(item.clone()).map_err(Error::from)),
                );
                let (inline, rejected_envelopes) = keep_readable(
                    envelopes
                        .into_iter()
                        .map(|item| InlineResponse::from_value(item.clone()).map_err(Error::from)),
                );
                (responses, inline, rejected_lines + rejected_envelopes)
            }
            BatchOutput::None => {
                return Err(Error::Batch(format!(
                    "Batch {} succeeded but reported no results",
                    job.name
                )))
            }
        };

        let report = BatchReport {
            job,
            responses,
            inline,
            rejected,
        };
        info!(
            "Batch {}: {} results, {} failed, {} rejected",
            report.job.name,
            report.responses.len() + report.inline.len(),
            report.failed(),
            report.rejected
        );
        Ok(report)
    }

    /// Full pipeline for a manifest.
    pub async fn run(&self, entries: &[ManifestEntry]) -> Result<BatchReport> {
        let job = self.submit(entries).await?;
        let job = self.wait_for_completion(&job.name).await?;
        self.fetch_results(job).await
    }
}
