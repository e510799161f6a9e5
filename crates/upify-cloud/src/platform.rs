//! Function platform trait definition

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use upify_core::{EnvironmentSet, Platform};

/// Where the platform reads the function code from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeSource {
    /// Archive bytes uploaded with the create/update call
    Inline(Vec<u8>),
    /// Archive staged in object storage
    Storage { bucket: String, object: String },
}

/// Desired state of the remote function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: String,
    pub runtime: String,
    pub environment: EnvironmentSet,
    /// Memory in MB; platform default when unset
    pub memory_mb: Option<u32>,
    /// Timeout in seconds; platform default when unset
    pub timeout_secs: Option<u32>,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>, runtime: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runtime: runtime.into(),
            environment: EnvironmentSet::new(),
            memory_mb: None,
            timeout_secs: None,
        }
    }

    pub fn with_environment(mut self, environment: EnvironmentSet) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_memory(mut self, memory_mb: Option<u32>) -> Self {
        self.memory_mb = memory_mb;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: Option<u32>) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// A function found by [`FunctionPlatform::probe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFunction {
    pub name: String,
    /// Platform resource identifier (ARN or resource path)
    pub id: String,
}

/// Identity the function runs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub created: bool,
}

/// Public invocation endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    /// True when the endpoint was created by this run
    pub created: bool,
}

/// Function platform abstraction
///
/// Each step of the convergence protocol is a separate call so that
/// [`Converger`](crate::Converger) owns the ordering and error policy.
#[async_trait]
pub trait FunctionPlatform: Send + Sync {
    fn platform(&self) -> Platform;

    /// Make the archive available to the platform
    async fn stage_code(&self, spec: &FunctionSpec, artifact: &Path) -> Result<CodeSource>;

    /// Look up the function; `Ok(None)` when it does not exist
    async fn probe(&self, name: &str) -> Result<Option<RemoteFunction>>;

    /// Ensure the execution identity exists, reusing one with the same name
    async fn bootstrap_identity(&self) -> Result<Option<Identity>> {
        Ok(None)
    }

    async fn create_function(
        &self,
        spec: &FunctionSpec,
        code: &CodeSource,
        identity: Option<&Identity>,
    ) -> Result<RemoteFunction>;

    /// Converge an existing function to `spec`
    async fn update_function(
        &self,
        spec: &FunctionSpec,
        code: &CodeSource,
        existing: &RemoteFunction,
    ) -> Result<()>;

    /// Release staged code after create/update consumed it
    async fn release_code(&self, _code: &CodeSource) -> Result<()> {
        Ok(())
    }

    /// Grant unauthenticated invocation.
    ///
    /// Returns [`CloudError::PermissionConflict`](crate::CloudError::PermissionConflict)
    /// when the grant already exists.
    async fn expose_publicly(&self, name: &str) -> Result<()>;

    async fn ensure_endpoint(&self, name: &str) -> Result<Endpoint>;
}
