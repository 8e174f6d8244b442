//! Error types for the storage node

use std::path::PathBuf;

use thiserror::Error;

use crate::http::response::StatusCode;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the storage, codec and configuration layers.
///
/// Parse errors live in [`crate::http::parser::ParseError`] and queue
/// admission failures in [`crate::dispatch::SubmitError`]; neither is
/// folded in here because both are handled before a request reaches the
/// storage layer.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Packing the payload for the archive tier failed
    #[error("Compression failed ({format}): {reason}")]
    CompressionFailed { format: String, reason: String },

    /// Unpacking an archived payload failed
    #[error("Decompression failed ({format}): {reason}")]
    DecompressionFailed { format: String, reason: String },

    /// Archive header names a codec this build does not know
    #[error("Unknown archive format code: {0}")]
    UnknownFormat(u8),

    /// The index could not be written to its persistence file
    #[error("Failed to persist index to {path}: {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record is missing its key or storage path
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// No object or file behind the requested key
    #[error("Not found: {0}")]
    NotFound(String),

    /// File exists but is not world-readable, or the path escapes the root
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A directory was requested where a file is required
    #[error("Is a directory: {0}")]
    IsDirectory(String),

    /// Upload request is missing a field or carries an unusable one
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Maps the error to the status code sent to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NotFound,
            Error::Forbidden(_) => StatusCode::Forbidden,
            Error::IsDirectory(_) | Error::InvalidUpload(_) => StatusCode::BadRequest,
            _ => StatusCode::InternalServerError,
        }
    }

    /// True for errors caused by the request rather than by the server.
    pub fn is_client_error(&self) -> bool {
        self.status().as_u16() < 500
    }
}
