//! Port error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading rule data.
///
/// Rule-data fetch failures happen before the engine is invoked; they never
/// surface from inside an apply.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Data file not found: {0}")]
    DataFileNotFound(PathBuf),
    #[error("Invalid filename (path traversal attempt): {0}")]
    InvalidFilename(String),
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },
}

impl ImportError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }
}
