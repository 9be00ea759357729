use super::{BatchJob, BatchOutput, BatchService, BatchState, UploadedFile};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// In-memory [`BatchService`] that replays a scripted sequence of job states.
#[derive(Clone)]
pub struct MockBatchClient {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    states: Arc<Mutex<VecDeque<BatchState>>>,
    output: Arc<Mutex<BatchOutput>>,
    jobs: Arc<Mutex<HashMap<String, String>>>,
    base_uri: String,
    upload_count: Arc<Mutex<usize>>,
    poll_count: Arc<Mutex<usize>>,
}

impl MockBatchClient {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            states: Arc::new(Mutex::new(VecDeque::new())),
            output: Arc::new(Mutex::new(BatchOutput::None)),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            base_uri: "https://mock-files.example.com".to_string(),
            upload_count: Arc::new(Mutex::new(0)),
            poll_count: Arc::new(Mutex::new(0)),
        }
    }

    /// States returned by successive `get_batch` calls; the last one repeats.
    pub fn with_states(self, states: Vec<BatchState>) -> Self {
        *self.states.lock().unwrap() = states.into();
        self
    }

    /// Result file served for finished jobs.
    pub fn with_result_file(self, name: String, content: Vec<u8>) -> Self {
        self.files.lock().unwrap().insert(name.clone(), content);
        *self.output.lock().unwrap() = BatchOutput::File(name);
        self
    }

    pub fn with_output(self, output: BatchOutput) -> Self {
        *self.output.lock().unwrap() = output;
        self
    }

    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    pub fn get_poll_count(&self) -> usize {
        *self.poll_count.lock().unwrap()
    }

    pub fn get_files(&self) -> HashMap<String, Vec<u8>> {
        self.files.lock().unwrap().clone()
    }

    /// Input file each created job was submitted with, keyed by job name.
    pub fn get_jobs(&self) -> HashMap<String, String> {
        self.jobs.lock().unwrap().clone()
    }

    fn next_state(&self) -> BatchState {
        let mut states = self.states.lock().unwrap();
        if states.len() > 1 {
            states.pop_front().unwrap_or(BatchState::Succeeded)
        } else {
            states.front().copied().unwrap_or(BatchState::Succeeded)
        }
    }
}

impl Default for MockBatchClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchService for MockBatchClient {
    async fn upload_file(
        &self,
        display_name: &str,
        data: &[u8],
        mime_type: &str,
    ) -> Result<UploadedFile> {
        let mut count = self.upload_count.lock().unwrap();
        *count += 1;

        let name = format!("files/upload-{}", *count);
        self.files
            .lock()
            .unwrap()
            .insert(name.clone(), data.to_vec());

        Ok(UploadedFile {
            uri: format!("{}/{}", self.base_uri, name),
            name,
            mime_type: mime_type.to_string(),
            display_name: Some(display_name.to_string()),
        })
    }

    async fn create_batch(
        &self,
        _model: &str,
        _display_name: &str,
        input_file: &str,
    ) -> Result<BatchJob> {
        if !self.files.lock().unwrap().contains_key(input_file) {
            return Err(Error::Api(format!("File not found: {}", input_file)));
        }

        let mut jobs = self.jobs.lock().unwrap();
        let name = format!("batches/mock-{}", jobs.len() + 1);
        jobs.insert(name.clone(), input_file.to_string());
        Ok(BatchJob::new(name, BatchState::Pending))
    }

    async fn get_batch(&self, name: &str) -> Result<BatchJob> {
        *self.poll_count.lock().unwrap() += 1;

        if !self.jobs.lock().unwrap().contains_key(name) {
            return Err(Error::Api(format!("Batch not found: {}", name)));
        }

        let state = self.next_state();
        let job = BatchJob::new(name, state);
        if state == BatchState::Succeeded {
            Ok(job.with_output(self.output.lock().unwrap().clone()))
        } else {
            Ok(job)
        }
    }

    async fn download_file(&self, name: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Api(format!("File not found: {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_upload_and_download() {
        let client = MockBatchClient::new();

        let file = client
            .upload_file("requests", b"{\"a\": 1}", "application/jsonl")
            .await
            .unwrap();

        assert_eq!(file.name, "files/upload-1");
        assert_eq!(file.uri, "https://mock-files.example.com/files/upload-1");
        assert_eq!(client.get_upload_count(), 1);

        let content = client.download_file(&file.name).await.unwrap();
        assert_eq!(content, b"{\"a\": 1}".to_vec());
    }

    #[tokio::test]
    async fn test_mock_replays_states_then_repeats_last() {
        let client = MockBatchClient::new().with_states(vec![
            BatchState::Pending,
            BatchState::Running,
            BatchState::Succeeded,
        ]);
        let input = client
            .upload_file("requests", b"{}", "application/jsonl")
            .await
            .unwrap();
        let job = client.create_batch("m", "d", &input.name).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(client.get_batch(&job.name).await.unwrap().state);
        }

        assert_eq!(
            seen,
            vec![
                BatchState::Pending,
                BatchState::Running,
                BatchState::Succeeded,
                BatchState::Succeeded
            ]
        );
        assert_eq!(client.get_poll_count(), 4);
    }

    #[tokio::test]
    async fn test_mock_attaches_output_on_success() {
        let client = MockBatchClient::new()
            .with_result_file("files/out".to_string(), b"result".to_vec());
        let input = client.upload_file("in", b"{}", "application/jsonl").await.unwrap();
        let job = client.create_batch("m", "d", &input.name).await.unwrap();

        let finished = client.get_batch(&job.name).await.unwrap();
        assert_eq!(finished.output, BatchOutput::File("files/out".to_string()));
        assert_eq!(client.get_jobs()[&job.name], input.name);
    }

    #[tokio::test]
    async fn test_mock_rejects_unknown_input_file() {
        let client = MockBatchClient::new();
        let result = client.create_batch("m", "d", "files/missing").await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("File not found"));
    }
}
