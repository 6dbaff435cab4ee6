use thiserror::Error;

use crate::types::{DisplayId, Mode};

/// Failure reported by a platform collaborator
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("display server connection failed: {0}")]
    Connection(String),

    #[error("display query failed: {0}")]
    Query(String),

    #[error("display {0} is not connected")]
    UnknownDisplay(DisplayId),

    #[error("mode {mode_id} is not supported by display {display}")]
    UnsupportedMode { display: DisplayId, mode_id: u32 },

    #[error("configuration rejected: {0}")]
    Rejected(String),
}

impl PlatformError {
    pub fn query(err: impl std::fmt::Display) -> Self {
        PlatformError::Query(err.to_string())
    }

    pub fn rejected(err: impl std::fmt::Display) -> Self {
        PlatformError::Rejected(err.to_string())
    }
}

/// Why a resolution switch did not happen
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("failed to begin display configuration: {0}")]
    BeginFailed(#[source] PlatformError),

    #[error("failed to set {}x{} on display {display}: {source}", mode.logical_width, mode.logical_height)]
    ConfigureFailed {
        display: DisplayId,
        mode: Mode,
        #[source]
        source: PlatformError,
    },

    #[error("failed to complete display configuration: {0}")]
    CommitFailed(#[source] PlatformError),
}

/// Persistent key-value storage failure
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("value stored under '{key}' has an unexpected shape")]
    Shape { key: String },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
