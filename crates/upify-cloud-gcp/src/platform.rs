//! GCP Cloud Functions implementation of [`FunctionPlatform`]
//!
//! The archive travels through a per-deployment Cloud Storage bucket that
//! only lives for the duration of the create/update call.

use crate::api::{FunctionsApi, Operation, RunApi, StorageApi};
use crate::rest::RestClient;
use crate::token::resolve_access_token;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use upify_cloud::{
    CloudError, CodeSource, Endpoint, FunctionPlatform, FunctionSpec, Identity, PollPolicy,
    PollStatus, RemoteFunction, Result,
};
use upify_core::{GcpCloudRunConfig, Platform};

/// Long-running operation polling for create/update
pub const OPERATION_POLL: PollPolicy = PollPolicy::constant(120, Duration::from_secs(5));

pub const SOURCE_OBJECT: &str = "source.zip";
pub const ENTRY_POINT: &str = "handler";
pub const DEFAULT_TIMEOUT_SECS: u32 = 60;
pub const INVOKER_ROLE: &str = "roles/run.invoker";
pub const ALL_USERS: &str = "allUsers";

const OPERATION_HINT: &str = "Cloud Build may still be running; check the build logs in the console.";

pub struct CloudFunctionsPlatform {
    storage: Box<dyn StorageApi>,
    functions: Box<dyn FunctionsApi>,
    run: Box<dyn RunApi>,
    project_id: String,
    region: String,
    operation_poll: PollPolicy,
    created_in_run: AtomicBool,
}

impl CloudFunctionsPlatform {
    /// Resolve an access token and build REST clients
    pub async fn from_config(config: &GcpCloudRunConfig) -> Result<Self> {
        let token = resolve_access_token().await?;
        tracing::debug!(project = %config.project_id, region = %config.region, "Resolved GCP credentials");

        Ok(Self::with_apis(
            Box::new(RestClient::new(token.clone())),
            Box::new(RestClient::new(token.clone())),
            Box::new(RestClient::new(token)),
            &config.project_id,
            &config.region,
        ))
    }

    pub fn with_apis(
        storage: Box<dyn StorageApi>,
        functions: Box<dyn FunctionsApi>,
        run: Box<dyn RunApi>,
        project_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            functions,
            run,
            project_id: project_id.into(),
            region: region.into(),
            operation_poll: OPERATION_POLL,
            created_in_run: AtomicBool::new(false),
        }
    }

    pub fn with_operation_poll(mut self, policy: PollPolicy) -> Self {
        self.operation_poll = policy;
        self
    }

    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.region)
    }

    pub fn function_name(&self, name: &str) -> String {
        format!("{}/functions/{}", self.parent(), name)
    }

    /// Bucket names are global and lowercase
    pub fn staging_bucket(&self, name: &str) -> String {
        format!("upify-{}-{}-source", self.project_id, name).to_lowercase()
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<()> {
        for object in self.storage.list_objects(bucket).await? {
            self.storage.delete_object(bucket, &object).await?;
        }
        self.storage.delete_bucket(bucket).await?;
        tracing::debug!(bucket = %bucket, "Deleted staging bucket");
        Ok(())
    }

    async fn wait_for_operation(&self, operation: Operation) -> Result<()> {
        let operation = if operation.done {
            operation
        } else {
            let functions = self.functions.as_ref();
            let name = operation.name.as_str();
            self.operation_poll
                .wait_until("Cloud Functions operation", OPERATION_HINT, move || async move {
                    match functions.get_operation(name).await {
                        Ok(op) if op.done => Ok(PollStatus::Ready(op)),
                        Ok(_) => Ok(PollStatus::Pending),
                        Err(e) => Err(e),
                    }
                })
                .await?
        };

        match operation.error {
            Some(error) => Err(CloudError::OperationFailed(format!(
                "{} (code {})",
                error.message, error.code
            ))),
            None => Ok(()),
        }
    }

    fn function_body(&self, spec: &FunctionSpec, code: &CodeSource) -> Result<Value> {
        let CodeSource::Storage { bucket, object } = code else {
            return Err(CloudError::InvalidConfig(
                "Cloud Functions expects a Cloud Storage source".to_string(),
            ));
        };

        let environment: Map<String, Value> = spec
            .environment
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();

        let mut service_config = json!({
            "timeoutSeconds": spec.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            "environmentVariables": environment,
        });
        if let Some(memory) = spec.memory_mb {
            service_config["availableMemory"] = Value::String(format!("{}M", memory));
        }

        Ok(json!({
            "name": self.function_name(&spec.name),
            "buildConfig": {
                "runtime": spec.runtime,
                "entryPoint": ENTRY_POINT,
                "source": {
                    "storageSource": {
                        "bucket": bucket,
                        "object": object,
                    }
                }
            },
            "serviceConfig": service_config,
        }))
    }

    async fn deployed_function(&self, name: &str) -> Result<crate::api::CloudFunction> {
        let full_name = self.function_name(name);
        self.functions
            .get_function(&full_name)
            .await?
            .ok_or(CloudError::NotFound(full_name))
    }
}

#[async_trait]
impl FunctionPlatform for CloudFunctionsPlatform {
    fn platform(&self) -> Platform {
        Platform::GcpCloudRun
    }

    async fn stage_code(&self, spec: &FunctionSpec, artifact: &Path) -> Result<CodeSource> {
        let bucket = self.staging_bucket(&spec.name);

        if self.storage.bucket_exists(&bucket).await? {
            tracing::warn!(bucket = %bucket, "Removing stale staging bucket from a previous run");
            self.remove_bucket(&bucket).await?;
        }

        self.storage
            .create_bucket(&self.project_id, &bucket, &self.region)
            .await?;

        let data = tokio::fs::read(artifact).await?;
        tracing::info!(bucket = %bucket, size = data.len(), "Uploading source archive");
        self.storage
            .upload_object(&bucket, SOURCE_OBJECT, data)
            .await?;

        Ok(CodeSource::Storage {
            bucket,
            object: SOURCE_OBJECT.to_string(),
        })
    }

    async fn probe(&self, name: &str) -> Result<Option<RemoteFunction>> {
        let full_name = self.function_name(name);
        Ok(self
            .functions
            .get_function(&full_name)
            .await?
            .map(|function| RemoteFunction {
                name: name.to_string(),
                id: function.name,
            }))
    }

    async fn create_function(
        &self,
        spec: &FunctionSpec,
        code: &CodeSource,
        _identity: Option<&Identity>,
    ) -> Result<RemoteFunction> {
        let body = self.function_body(spec, code)?;
        let operation = self
            .functions
            .create_function(&self.parent(), &spec.name, &body)
            .await?;
        tracing::info!(operation = %operation.name, "Waiting for function creation");
        self.wait_for_operation(operation).await?;
        self.created_in_run.store(true, Ordering::SeqCst);

        Ok(RemoteFunction {
            name: spec.name.clone(),
            id: self.function_name(&spec.name),
        })
    }

    async fn update_function(
        &self,
        spec: &FunctionSpec,
        code: &CodeSource,
        existing: &RemoteFunction,
    ) -> Result<()> {
        let body = self.function_body(spec, code)?;
        let operation = self.functions.update_function(&existing.id, &body).await?;
        tracing::info!(operation = %operation.name, "Waiting for function update");
        self.wait_for_operation(operation).await
    }

    async fn release_code(&self, code: &CodeSource) -> Result<()> {
        match code {
            CodeSource::Storage { bucket, .. } => self.remove_bucket(bucket).await,
            CodeSource::Inline(_) => Ok(()),
        }
    }

    async fn expose_publicly(&self, name: &str) -> Result<()> {
        let function = self.deployed_function(name).await?;
        let service = function.service().ok_or_else(|| {
            CloudError::api("GetFunction", "function has no backing Cloud Run service")
        })?;

        let mut policy = self.run.get_iam_policy(service).await?;
        if !policy.grant(INVOKER_ROLE, ALL_USERS) {
            return Err(CloudError::PermissionConflict(format!(
                "{} already has {} on {}",
                ALL_USERS, INVOKER_ROLE, service
            )));
        }

        self.run.set_iam_policy(service, &policy).await?;
        Ok(())
    }

    async fn ensure_endpoint(&self, name: &str) -> Result<Endpoint> {
        let function = self.deployed_function(name).await?;
        let url = function
            .uri()
            .ok_or_else(|| CloudError::api("GetFunction", "function has no service URI"))?;

        Ok(Endpoint {
            url: url.to_string(),
            created: self.created_in_run.load(Ordering::SeqCst),
        })
    }
}
