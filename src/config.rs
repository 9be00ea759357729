//! Runtime configuration loaded from the environment (and `.env`).

use crate::batch::client::DEFAULT_BASE_URL;
use crate::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub max_output_tokens: u32,
    pub thinking_budget: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup, applying the same defaults as
    /// [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config("GEMINI_API_KEY not set".to_string()))?;

        Ok(Self {
            api_key,
            model: lookup("GEMINI_BATCH_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: lookup("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            output_dir: lookup("BATCH_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/batch_requests")),
            poll_interval: Duration::from_secs(parse_or(
                &lookup,
                "BATCH_POLL_INTERVAL_SECS",
                10,
            )?),
            max_polls: parse_or(&lookup, "BATCH_MAX_POLLS", 360)?,
            max_output_tokens: parse_or(&lookup, "BATCH_MAX_OUTPUT_TOKENS", 512)?,
            thinking_budget: parse_or(&lookup, "BATCH_THINKING_BUDGET", 0)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{} has invalid value '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply() {
        let config = Config::from_lookup(lookup_from(&[("GEMINI_API_KEY", "key")])).unwrap();

        assert_eq!(config.api_key, "key");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.output_dir, PathBuf::from("data/batch_requests"));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_polls, 360);
        assert_eq!(config.max_output_tokens, 512);
        assert_eq!(config.thinking_budget, 0);
    }

    #[test]
    fn test_overrides_apply() {
        let config = Config::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "key"),
            ("GEMINI_BATCH_MODEL", "gemini-2.5-pro"),
            ("BATCH_POLL_INTERVAL_SECS", "30"),
            ("BATCH_THINKING_BUDGET", "1024"),
        ]))
        .unwrap();

        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.thinking_budget, 1024);
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));

        let err = Config::from_lookup(lookup_from(&[("GEMINI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "key"),
            ("BATCH_MAX_POLLS", "forever"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("BATCH_MAX_POLLS"));
    }
}
