//! Batch request payloads: one [`GeminiRequest`] per JSONL input line.

use super::{child, Content, Schema};
use crate::error::SchemaError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

fn default_thinking_budget() -> Option<i32> {
    Some(0)
}

fn check_range(path: &str, value: f64, min: f64, max: f64) -> Result<(), SchemaError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SchemaError::constraint(
            path,
            format!("must be between {} and {} (got {})", min, max, value),
        ))
    }
}

fn check_positive(path: &str, value: u32) -> Result<(), SchemaError> {
    if value > 0 {
        Ok(())
    } else {
        Err(SchemaError::constraint(path, "must be greater than 0 (got 0)"))
    }
}

/// Reasoning budget for thinking-capable models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    #[serde(
        default = "default_thinking_budget",
        skip_serializing_if = "Option::is_none"
    )]
    thinking_budget: Option<i32>,
}

impl ThinkingConfig {
    pub fn new(thinking_budget: i32) -> Result<Self, SchemaError> {
        let config = Self {
            thinking_budget: Some(thinking_budget),
        };
        config.validate("")?;
        Ok(config)
    }

    pub fn thinking_budget(&self) -> Option<i32> {
        self.thinking_budget
    }
}

impl Default for ThinkingConfig {
    fn default() -> Self {
        Self {
            thinking_budget: default_thinking_budget(),
        }
    }
}

impl Schema for ThinkingConfig {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        match self.thinking_budget {
            Some(budget) if budget < 0 => Err(SchemaError::constraint(
                child(path, "thinkingBudget"),
                format!("must be greater than or equal to 0 (got {})", budget),
            )),
            _ => Ok(()),
        }
    }
}

/// Sampling parameters. Every field is optional and omitted when unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidate_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

impl GenerationConfig {
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder::default()
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn top_p(&self) -> Option<f64> {
        self.top_p
    }

    pub fn max_output_tokens(&self) -> Option<u32> {
        self.max_output_tokens
    }

    pub fn top_k(&self) -> Option<u32> {
        self.top_k
    }

    pub fn candidate_count(&self) -> Option<u32> {
        self.candidate_count
    }

    pub fn thinking_config(&self) -> Option<&ThinkingConfig> {
        self.thinking_config.as_ref()
    }
}

impl Schema for GenerationConfig {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        if let Some(temperature) = self.temperature {
            check_range(&child(path, "temperature"), temperature, 0.0, 2.0)?;
        }
        if let Some(top_p) = self.top_p {
            check_range(&child(path, "topP"), top_p, 0.0, 1.0)?;
        }
        if let Some(tokens) = self.max_output_tokens {
            check_positive(&child(path, "maxOutputTokens"), tokens)?;
        }
        if let Some(top_k) = self.top_k {
            check_positive(&child(path, "topK"), top_k)?;
        }
        if let Some(count) = self.candidate_count {
            check_positive(&child(path, "candidateCount"), count)?;
        }
        if let Some(thinking) = &self.thinking_config {
            thinking.validate(&child(path, "thinkingConfig"))?;
        }
        Ok(())
    }
}

/// Collects [`GenerationConfig`] fields and validates them all in `build`.
#[derive(Debug, Clone, Default)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.config.top_p = Some(top_p);
        self
    }

    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.config.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn top_k(mut self, top_k: u32) -> Self {
        self.config.top_k = Some(top_k);
        self
    }

    pub fn candidate_count(mut self, candidate_count: u32) -> Self {
        self.config.candidate_count = Some(candidate_count);
        self
    }

    pub fn thinking_config(mut self, thinking_config: ThinkingConfig) -> Self {
        self.config.thinking_config = Some(thinking_config);
        self
    }

    pub fn build(self) -> Result<GenerationConfig, SchemaError> {
        self.config.validate("")?;
        Ok(self.config)
    }
}

/// Body of a single batch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    /// Caller-chosen tags echoed back with the response, in insertion order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    labels: Option<IndexMap<String, String>>,
}

impl RequestBody {
    pub fn builder() -> RequestBodyBuilder {
        RequestBodyBuilder::default()
    }

    pub fn system_instruction(&self) -> Option<&Content> {
        self.system_instruction.as_ref()
    }

    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    pub fn generation_config(&self) -> Option<&GenerationConfig> {
        self.generation_config.as_ref()
    }

    pub fn labels(&self) -> Option<&IndexMap<String, String>> {
        self.labels.as_ref()
    }

    /// Value of a single label, if set.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.as_ref()?.get(key).map(String::as_str)
    }
}

impl Schema for RequestBody {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        if self.contents.is_empty() {
            return Err(SchemaError::constraint(
                child(path, "contents"),
                "must contain at least one content entry",
            ));
        }
        if let Some(config) = &self.generation_config {
            config.validate(&child(path, "generationConfig"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestBodyBuilder {
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: Option<GenerationConfig>,
    labels: Option<IndexMap<String, String>>,
}

impl RequestBodyBuilder {
    pub fn system_instruction(mut self, instruction: Content) -> Self {
        self.system_instruction = Some(instruction);
        self
    }

    /// Appends one turn; turns keep the order they are added in.
    pub fn content(mut self, content: Content) -> Self {
        self.contents.push(content);
        self
    }

    pub fn contents(mut self, contents: impl IntoIterator<Item = Content>) -> Self {
        self.contents.extend(contents);
        self
    }

    pub fn generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<RequestBody, SchemaError> {
        let body = RequestBody {
            system_instruction: self.system_instruction,
            contents: self.contents,
            generation_config: self.generation_config,
            labels: self.labels,
        };
        body.validate("")?;
        Ok(body)
    }
}

/// Envelope written as one line of a batch input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiRequest {
    request: RequestBody,
}

impl GeminiRequest {
    pub fn new(request: RequestBody) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &RequestBody {
        &self.request
    }

    pub fn into_request(self) -> RequestBody {
        self.request
    }
}

impl From<RequestBody> for GeminiRequest {
    fn from(request: RequestBody) -> Self {
        Self::new(request)
    }
}

impl Schema for GeminiRequest {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        self.request.validate(&child(path, "request"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Part;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn describe_car() -> RequestBody {
        RequestBody::builder()
            .content(Content::user(vec![
                Part::text("Describe this image"),
                Part::file_data("gs://cloud-samples-data/generative-ai/image/car.jpeg", "image/jpeg"),
            ]))
            .generation_config(
                GenerationConfig::builder()
                    .temperature(0.5)
                    .max_output_tokens(512)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_request_serializes_without_absent_fields() {
        let request = GeminiRequest::new(describe_car());
        let json = request.to_json().unwrap();

        assert_eq!(
            json,
            r#"{"request":{"contents":[{"role":"user","parts":[{"text":"Describe this image"},{"fileData":{"fileUri":"gs://cloud-samples-data/generative-ai/image/car.jpeg","mimeType":"image/jpeg"}}]}],"generationConfig":{"temperature":0.5,"maxOutputTokens":512}}}"#
        );
        assert!(!json.contains("null"));
    }

    #[test]
    fn test_temperature_out_of_range_names_field() {
        let err = GenerationConfig::builder()
            .temperature(2.5)
            .build()
            .unwrap_err();
        assert_eq!(err.path(), "temperature");
        assert!(err.to_string().contains("between 0 and 2"));
    }

    #[test]
    fn test_nan_temperature_is_rejected() {
        let err = GenerationConfig::builder()
            .temperature(f64::NAN)
            .build()
            .unwrap_err();
        assert_eq!(err.path(), "temperature");
    }

    #[test]
    fn test_boundary_values_are_accepted() {
        let config = GenerationConfig::builder()
            .temperature(0.0)
            .top_p(1.0)
            .top_k(1)
            .candidate_count(1)
            .max_output_tokens(1)
            .build()
            .unwrap();
        assert_eq!(config.temperature(), Some(0.0));
        assert_eq!(config.top_p(), Some(1.0));
    }

    #[test]
    fn test_zero_counts_are_rejected() {
        let err = GenerationConfig::builder().top_k(0).build().unwrap_err();
        assert_eq!(err.path(), "topK");

        let err = GenerationConfig::builder()
            .max_output_tokens(0)
            .build()
            .unwrap_err();
        assert_eq!(err.path(), "maxOutputTokens");

        let err = GenerationConfig::builder()
            .candidate_count(0)
            .build()
            .unwrap_err();
        assert_eq!(err.path(), "candidateCount");
    }

    #[test]
    fn test_top_p_above_one_is_rejected() {
        let err = GenerationConfig::builder().top_p(1.01).build().unwrap_err();
        assert_eq!(err.path(), "topP");
    }

    #[test]
    fn test_values_below_lower_bound_are_rejected() {
        let err = GenerationConfig::builder()
            .temperature(-0.1)
            .build()
            .unwrap_err();
        assert_eq!(err.path(), "temperature");

        let err = GenerationConfig::builder().top_p(-0.1).build().unwrap_err();
        assert_eq!(err.path(), "topP");

        let err = GenerationConfig::from_value(json!({ "temperature": -0.5 })).unwrap_err();
        assert_eq!(err.path(), "temperature");
    }

    #[test]
    fn test_negative_thinking_budget_is_rejected() {
        let err = ThinkingConfig::new(-1).unwrap_err();
        assert_eq!(err.path(), "thinkingBudget");
        assert!(ThinkingConfig::new(0).is_ok());
    }

    #[test]
    fn test_thinking_budget_defaults_to_zero_when_missing() {
        let config = ThinkingConfig::from_value(json!({})).unwrap();
        assert_eq!(config.thinking_budget(), Some(0));
        assert_eq!(config.to_json().unwrap(), r#"{"thinkingBudget":0}"#);
    }

    #[test]
    fn test_empty_contents_is_rejected() {
        let err = RequestBody::builder().build().unwrap_err();
        assert_eq!(err.path(), "contents");
    }

    #[test]
    fn test_parse_reports_nested_range_violation() {
        let err = GeminiRequest::from_json(
            r#"{"request":{"contents":[{"role":"user","parts":[{"text":"hi"}]}],"generationConfig":{"temperature":3}}}"#,
        )
        .unwrap_err();
        assert_eq!(err.path(), "request.generationConfig.temperature");
    }

    #[test]
    fn test_parse_reports_type_errors_with_path() {
        let err = GeminiRequest::from_json(
            r#"{"request":{"contents":[{"role":"user","parts":[{"text":"hi"}]}],"generationConfig":{"topK":"many"}}}"#,
        )
        .unwrap_err();
        assert_eq!(err.path(), "request.generationConfig.topK");
    }

    #[test]
    fn test_parse_reports_missing_contents() {
        let err = GeminiRequest::from_json(r#"{"request":{}}"#).unwrap_err();
        assert!(err.to_string().contains("contents"));
    }

    #[test]
    fn test_parse_rejects_ambiguous_part_with_path() {
        let err = GeminiRequest::from_json(
            r#"{"request":{"contents":[{"role":"user","parts":[{"text":"a"},{"text":"b","fileData":{"fileUri":"gs://x","mimeType":"image/png"}}]}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::PartUnion { .. }));
        assert_eq!(err.path(), "request.contents[0].parts[1]");
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let body = RequestBody::builder()
            .system_instruction(Content::new("system", vec![Part::text("답변은 한국어로.")]))
            .content(Content::user(vec![
                Part::file_data("gs://b/video.mp4", "video/mp4"),
                Part::text("What is the relation between these?"),
            ]))
            .content(Content::new("model", vec![Part::text("Both show animals.")]))
            .generation_config(
                GenerationConfig::builder()
                    .temperature(0.9)
                    .top_p(1.0)
                    .top_k(40)
                    .max_output_tokens(256)
                    .candidate_count(2)
                    .thinking_config(ThinkingConfig::new(1024).unwrap())
                    .build()
                    .unwrap(),
            )
            .label("item", "0")
            .label("batch", "nightly")
            .build()
            .unwrap();
        let request = GeminiRequest::new(body);

        let first = request.to_json().unwrap();
        let reparsed = GeminiRequest::from_json(&first).unwrap();
        let second = reparsed.to_json().unwrap();

        assert_eq!(first, second);
        assert_eq!(reparsed, request);
    }

    #[test]
    fn test_labels_are_exposed() {
        let body = RequestBody::builder()
            .content(Content::user(vec![Part::text("hi")]))
            .label("item", "7")
            .build()
            .unwrap();
        assert_eq!(body.label("item"), Some("7"));
        assert_eq!(body.label("missing"), None);
    }

    #[test]
    fn test_labels_keep_wire_order() {
        let line = r#"{"request":{"contents":[{"role":"user","parts":[{"text":"hi"}]}],"labels":{"z":"1","a":"2"}}}"#;

        let request = GeminiRequest::from_json(line).unwrap();
        let keys: Vec<&str> = request
            .request()
            .labels()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();

        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(request.to_json().unwrap(), line);
    }

    #[test]
    fn test_builder_labels_keep_insertion_order() {
        let body = RequestBody::builder()
            .content(Content::user(vec![Part::text("hi")]))
            .label("item", "0")
            .label("batch", "nightly")
            .build()
            .unwrap();

        assert!(GeminiRequest::new(body)
            .to_json()
            .unwrap()
            .ends_with(r#""labels":{"item":"0","batch":"nightly"}}}"#));
    }
}
