//! Error types for quakeboard.
//!
//! Uses `thiserror` for library-style error definitions.

use thiserror::Error;

/// Errors that can occur in quakeboard operations.
#[derive(Error, Debug)]
pub enum QuakeboardError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// API returned an error status
    #[error("earthquake API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Envelope arrived but reported `status: false`
    #[error("upstream reported failure (HTTP {status}): {desc}")]
    Upstream { status: u16, desc: String },

    /// Invalid response structure
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Input rejected before any request was issued
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The polling coordinator is no longer running
    #[error("polling coordinator has stopped")]
    Stopped,
}
