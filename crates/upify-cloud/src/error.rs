//! Cloud platform error types

use thiserror::Error;

/// Cloud platform errors
#[derive(Error, Debug)]
pub enum CloudError {
    /// Expected during probing; selects the create branch
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// The grant being added is already present
    #[error("Permission already granted: {0}")]
    PermissionConflict(String),

    #[error("{operation} failed: {message}")]
    Api { operation: String, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn api(operation: impl Into<String>, message: impl ToString) -> Self {
        CloudError::Api {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
