// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or saving persisted preferences
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("Permission denied accessing preferences: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error accessing preferences {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed preferences file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Failed to serialize preferences: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PreferenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}
