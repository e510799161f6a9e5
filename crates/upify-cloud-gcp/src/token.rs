//! OAuth access token for the Google Cloud REST APIs

use crate::error::{GcpError, Result};
use std::process::Stdio;
use tokio::process::Command;

pub const ACCESS_TOKEN_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Token from `GOOGLE_OAUTH_ACCESS_TOKEN`, falling back to the gcloud CLI
pub async fn resolve_access_token() -> Result<String> {
    if let Ok(token) = std::env::var(ACCESS_TOKEN_VAR) {
        let token = token.trim().to_string();
        if !token.is_empty() {
            tracing::debug!("Using access token from {}", ACCESS_TOKEN_VAR);
            return Ok(token);
        }
    }

    gcloud_access_token().await
}

async fn gcloud_access_token() -> Result<String> {
    tracing::debug!("Running: gcloud auth print-access-token");

    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| GcpError::MissingToken(format!("gcloud: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GcpError::MissingToken(stderr.trim().to_string()));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(GcpError::MissingToken("gcloud returned an empty token".to_string()));
    }
    Ok(token)
}
