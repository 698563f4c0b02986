//! Error handling for haul

use crate::task::{EngineKind, TaskAction};
use thiserror::Error;

/// Main error type for haul
#[derive(Debug, Error)]
pub enum HaulError {
    #[error("Download engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("aria2 RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("yt-dlp not found. Please install yt-dlp")]
    YtDlpNotFound,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("{engine} engine does not support {action}")]
    Unsupported {
        engine: EngineKind,
        action: TaskAction,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
