//! Typed models and a JSONL encoder for Gemini batch inference
//!
//! Requests are built from validated schema types, encoded one JSON document
//! per line, submitted as a batch job, and the result lines are parsed back
//! into typed responses with Asia/Seoul timestamps.

pub mod app;
pub mod batch;
pub mod config;
pub mod error;
pub mod jsonl;
pub mod mime;
pub mod models;

pub use error::{Error, Result, SchemaError};
