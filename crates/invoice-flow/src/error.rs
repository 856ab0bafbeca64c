//! Error types for the invoice extraction service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid request from a caller
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Batch not found
    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    /// Requested artifact not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Extraction provider failure
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Report artifact could not be written
    #[error("Report export failed: {0}")]
    Export(String),

    /// Work queue is closed or refused the submission
    #[error("Queue unavailable: {0}")]
    Queue(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an extraction error
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create an export error
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Config(msg) => (StatusCode::BAD_REQUEST, "config_error", msg.clone()),
            Error::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg.clone()),
            Error::JobNotFound(msg) => (StatusCode::NOT_FOUND, "not_found", format!("Job not found: {}", msg)),
            Error::BatchNotFound(msg) => (StatusCode::NOT_FOUND, "not_found", format!("Batch not found: {}", msg)),
            Error::FileNotFound(msg) => (StatusCode::NOT_FOUND, "not_found", format!("File not found: {}", msg)),
            Error::Extraction(msg) => (StatusCode::BAD_GATEWAY, "extraction_error", msg.clone()),
            Error::Export(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "export_error", msg.clone()),
            Error::Queue(msg) => (StatusCode::SERVICE_UNAVAILABLE, "queue_error", msg.clone()),
            Error::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error", e.to_string()),
            Error::Json(e) => (StatusCode::BAD_REQUEST, "json_error", e.to_string()),
            Error::Http(e) => (StatusCode::BAD_GATEWAY, "http_error", e.to_string()),
            Error::Csv(e) => (StatusCode::INTERNAL_SERVER_ERROR, "csv_error", e.to_string()),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone()),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
