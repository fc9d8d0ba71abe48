//! Error types shared by the converter and the draft store

use thiserror::Error;

/// Content conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unsupported format: {0}")]
    Unsupported(String),

    #[error("Content is {actual}, expected {expected}")]
    Mismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Malformed {format} content: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },
}

/// Draft persistence errors
#[derive(Error, Debug)]
pub enum DraftError {
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Draft not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for DraftError {
    fn from(err: rusqlite::Error) -> Self {
        DraftError::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for DraftError {
    fn from(err: std::io::Error) -> Self {
        DraftError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for DraftError {
    fn from(err: serde_json::Error) -> Self {
        DraftError::Persistence(err.to_string())
    }
}
