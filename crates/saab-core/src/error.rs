//! Error types for the core library.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport failed (connect, send, or reading the body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error (config file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The chat endpoint answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// A `data:` line whose payload is not a JSON object.
    #[error("malformed stream chunk {payload:?}: {source}")]
    MalformedChunk {
        /// The text after the `data: ` marker.
        payload: String,
        /// Why it failed to parse.
        source: serde_json::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Malformed chunks are skipped; everything else ends the turn.
    pub fn is_malformed_chunk(&self) -> bool {
        matches!(self, Error::MalformedChunk { .. })
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
