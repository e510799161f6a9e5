//! Narrow ports over the Lambda and IAM APIs
//!
//! [`LambdaPlatform`](crate::LambdaPlatform) only talks to these traits, so
//! tests can substitute in-memory fakes for the SDK clients.

use async_trait::async_trait;
use upify_cloud::{FunctionSpec, Result};

/// Handler reference inside the uploaded archive
pub const HANDLER: &str = "upify_handler.handler";

/// Statement id of the public Function URL permission
pub const PUBLIC_URL_STATEMENT_ID: &str = "FunctionURLAllowPublicAccess";

/// Code update status reported by `GetFunctionConfiguration`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    InProgress,
    Successful,
    Failed(String),
}

#[async_trait]
pub trait LambdaApi: Send + Sync {
    /// Function ARN, or `None` when the function does not exist
    async fn get_function(&self, name: &str) -> Result<Option<String>>;

    /// Create the function and return its ARN
    async fn create_function(&self, spec: &FunctionSpec, role_arn: &str, zip: Vec<u8>)
    -> Result<String>;

    async fn update_function_code(&self, name: &str, zip: Vec<u8>) -> Result<()>;

    async fn last_update_status(&self, name: &str) -> Result<UpdateStatus>;

    /// Apply environment, runtime, memory and timeout
    async fn update_function_configuration(&self, spec: &FunctionSpec) -> Result<()>;

    /// Allow unauthenticated `lambda:InvokeFunctionUrl`.
    ///
    /// Fails with `PermissionConflict` when the statement already exists.
    async fn add_public_url_permission(&self, name: &str) -> Result<()>;

    /// Create a Function URL with auth type `NONE`.
    ///
    /// Fails with `AlreadyExists` when the function already has one.
    async fn create_function_url(&self, name: &str) -> Result<String>;

    async fn get_function_url(&self, name: &str) -> Result<String>;
}

#[async_trait]
pub trait IamApi: Send + Sync {
    /// Role ARN, or `None` when the role does not exist
    async fn get_role_arn(&self, role_name: &str) -> Result<Option<String>>;

    async fn create_role(&self, role_name: &str, trust_policy: &str) -> Result<String>;

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;
}
