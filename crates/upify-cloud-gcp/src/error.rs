//! GCP REST error types

use thiserror::Error;
use upify_cloud::CloudError;

#[derive(Error, Debug)]
pub enum GcpError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} returned HTTP {status}: {message}")]
    Status {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("No access token: set GOOGLE_OAUTH_ACCESS_TOKEN or run `gcloud auth login` ({0})")]
    MissingToken(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<GcpError> for CloudError {
    fn from(err: GcpError) -> Self {
        match err {
            GcpError::Status {
                operation, status, ..
            } if status == 404 => CloudError::NotFound(operation),
            GcpError::Status {
                operation, status, ..
            } if status == 409 => CloudError::AlreadyExists(operation),
            GcpError::Status {
                operation,
                status,
                message,
            } if status == 401 => {
                CloudError::AuthenticationFailed(format!("{}: HTTP {} {}", operation, status, message))
            }
            GcpError::Status {
                operation,
                status,
                message,
            } => CloudError::api(operation, format!("HTTP {}: {}", status, message)),
            GcpError::MissingToken(detail) => CloudError::AuthenticationFailed(detail),
            GcpError::Json(e) => CloudError::Json(e),
            GcpError::Http(e) => CloudError::api("HTTP request", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, GcpError>;
