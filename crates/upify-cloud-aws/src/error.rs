//! SDK error classification
//!
//! Service error codes are mapped onto the shared [`CloudError`] variants so
//! the convergence protocol can branch on not-found and conflict signals.

use aws_sdk_lambda::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use upify_cloud::CloudError;

const NOT_FOUND_CODES: &[&str] = &["ResourceNotFoundException", "NoSuchEntity"];
const ALREADY_EXISTS_CODES: &[&str] = &["EntityAlreadyExists"];

/// Lambda reports both duplicates and in-flight updates with this code
const RESOURCE_CONFLICT: &str = "ResourceConflictException";

/// Map an SDK error to a [`CloudError`] tagged with `operation`
pub(crate) fn classify<E, R>(operation: &str, err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    classify_code(operation, code.as_deref(), &message(&err), false)
}

/// Like [`classify`], for calls where a conflict may mean the resource already exists
///
/// Only a conflict whose message reports an existing resource becomes
/// `AlreadyExists`; an update in progress stays an API error.
pub(crate) fn classify_duplicate<E, R>(operation: &str, err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    classify_code(operation, code.as_deref(), &message(&err), true)
}

fn message<E, R>(err: &SdkError<E, R>) -> String
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.message() {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => DisplayErrorContext(err).to_string(),
    }
}

fn reports_existing(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("exist") && !message.contains("in progress")
}

fn classify_code(
    operation: &str,
    code: Option<&str>,
    message: &str,
    duplicate_expected: bool,
) -> CloudError {
    match code {
        Some(code) if NOT_FOUND_CODES.contains(&code) => {
            CloudError::NotFound(format!("{}: {}", operation, message))
        }
        Some(code) if ALREADY_EXISTS_CODES.contains(&code) => {
            CloudError::AlreadyExists(format!("{}: {}", operation, message))
        }
        Some(RESOURCE_CONFLICT) if duplicate_expected && reports_existing(message) => {
            CloudError::AlreadyExists(format!("{}: {}", operation, message))
        }
        _ => CloudError::api(operation, message),
    }
}
