use serde_json::Value;
use std::{io, path::PathBuf};
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

use crate::schema::validate::Violation;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Malformed history: {0}")]
    MalformedHistory(String),
    #[error("Cyclic schema reference: {reference}")]
    CyclicSchema { reference: String, schema: Value },
    #[error("Unresolved schema reference: {reference}")]
    UnresolvedReference { reference: String, schema: Value },
    #[error("No JSON found in backend reply")]
    NoJsonFound { raw_text: String },
    #[error("Invalid JSON in backend reply: {source}")]
    JsonDecode {
        span: String,
        raw_text: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Schema validation failed: {}", summarize(violations))]
    SchemaValidation {
        violations: Vec<Violation>,
        payload: Value,
    },
    #[error("Claude Code request failed: {message}")]
    BackendInvocation { message: String },
    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),
    #[error("Attachment error at {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AdapterError {
    /// Whether re-running the same turn, usually with a corrective prompt, can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdapterError::NoJsonFound { .. }
                | AdapterError::JsonDecode { .. }
                | AdapterError::SchemaValidation { .. }
                | AdapterError::BackendInvocation { .. }
        )
    }
}

impl From<BackendError> for AdapterError {
    fn from(error: BackendError) -> Self {
        AdapterError::BackendInvocation {
            message: error.to_string(),
        }
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to spawn backend process: {0}")]
    Spawn(#[source] io::Error),
    #[error("Backend exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },
    #[error("Backend reported an error: {0}")]
    Reported(String),
    #[error("Backend protocol error: {0}")]
    Protocol(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON serialization/deserialization failed: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Line codec error: {0}")]
    Lines(#[from] LinesCodecError),
}
