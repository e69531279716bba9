use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to read {path}: {source}")]
    ReadInput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    ParseInput {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Expected a JSON array of conversations in {path}")]
    NotAnArray { path: PathBuf },

    #[error("Unsupported encoding \"{input}\" (expected o200k_base or cl100k_base)")]
    InvalidEncoding { input: String },

    #[error("Failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}

/// Failures crossing the tokenizer worker boundary.
///
/// None of these abort a run; callers degrade to the heuristic estimate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizerError {
    #[error("tokenizer failed: {0}")]
    Failed(String),

    #[error("tokenizer worker crashed")]
    WorkerCrashed,

    #[error("tokenizer shut down")]
    Shutdown,

    #[error("tokenizer unavailable: {0}")]
    Unavailable(String),
}
