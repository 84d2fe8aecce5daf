/// Error types for source extraction
use thiserror::Error;

/// Errors raised while extracting data from an upstream source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The upstream API answered with a non-success status or a body that
    /// reports failure.
    #[error("Upstream API failure ({status}): {message}")]
    UpstreamApiFailure { status: u16, message: String },

    /// Transport-level failure (connection, timeout, body read)
    #[cfg(feature = "api")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to decode a JSON body
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to parse CSV data
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to read a local file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A source registry row is malformed
    #[error("Invalid source definition: {0}")]
    InvalidSource(String),
}

/// Type alias for Results using SourceError
pub type Result<T> = std::result::Result<T, SourceError>;
