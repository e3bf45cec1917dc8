//! Error types for the notebell core
//!
//! All errors use thiserror for structured error handling.
//! Only validation errors are expected to surface to callers; referential
//! anomalies and persistence I/O problems degrade gracefully and are
//! observable through logs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Note not found: {0}")]
    NoteNotFound(u64),

    #[error("Folder not found: {0}")]
    FolderNotFound(u64),

    #[error("Tag not found: {0}")]
    TagNotFound(u64),
}

pub type Result<T> = std::result::Result<T, AppError>;
