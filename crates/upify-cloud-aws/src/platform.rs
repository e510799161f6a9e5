//! AWS Lambda implementation of [`FunctionPlatform`]

use crate::api::{IamApi, LambdaApi, UpdateStatus};
use crate::role::{ROLE_SETTLE_DELAY, ensure_role};
use crate::sdk::{SdkIam, SdkLambda, load_sdk_config};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use upify_cloud::{
    CloudError, CodeSource, Endpoint, FunctionPlatform, FunctionSpec, Identity, PollPolicy,
    PollStatus, RemoteFunction, Result,
};
use upify_core::{AwsLambdaConfig, Platform};

/// Code update confirmation before configuration is applied
pub const CODE_UPDATE_POLL: PollPolicy = PollPolicy::constant(15, Duration::from_secs(2));

const CODE_UPDATE_HINT: &str = "The code update may still be propagating, or the credentials \
     lack the lambda:GetFunctionConfiguration permission.";

pub struct LambdaPlatform {
    lambda: Box<dyn LambdaApi>,
    iam: Box<dyn IamApi>,
    role_name: String,
    settle_delay: Duration,
    update_poll: PollPolicy,
}

impl LambdaPlatform {
    /// Build clients from the default credential chain
    pub async fn from_config(config: &AwsLambdaConfig) -> Self {
        let sdk_config = load_sdk_config(&config.region).await;
        tracing::debug!(region = %config.region, "Loaded AWS configuration");

        Self::with_apis(
            Box::new(SdkLambda::new(&sdk_config)),
            Box::new(SdkIam::new(&sdk_config)),
            &config.role_name,
        )
    }

    pub fn with_apis(
        lambda: Box<dyn LambdaApi>,
        iam: Box<dyn IamApi>,
        role_name: impl Into<String>,
    ) -> Self {
        Self {
            lambda,
            iam,
            role_name: role_name.into(),
            settle_delay: ROLE_SETTLE_DELAY,
            update_poll: CODE_UPDATE_POLL,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_update_poll(mut self, policy: PollPolicy) -> Self {
        self.update_poll = policy;
        self
    }

    async fn wait_for_code_update(&self, name: &str) -> Result<()> {
        let lambda = self.lambda.as_ref();
        self.update_poll
            .wait_until("Lambda code update", CODE_UPDATE_HINT, move || async move {
                match lambda.last_update_status(name).await {
                    Ok(UpdateStatus::Successful) => Ok(PollStatus::Ready(())),
                    Ok(UpdateStatus::InProgress) => Ok(PollStatus::Pending),
                    Ok(UpdateStatus::Failed(reason)) => Err(CloudError::OperationFailed(
                        format!("code update for {} failed: {}", name, reason),
                    )),
                    Err(e) => Err(e),
                }
            })
            .await
    }
}

fn inline_bytes(code: &CodeSource) -> Result<Vec<u8>> {
    match code {
        CodeSource::Inline(bytes) => Ok(bytes.clone()),
        CodeSource::Storage { .. } => Err(CloudError::InvalidConfig(
            "Lambda expects inline archive bytes".to_string(),
        )),
    }
}

#[async_trait]
impl FunctionPlatform for LambdaPlatform {
    fn platform(&self) -> Platform {
        Platform::AwsLambda
    }

    async fn stage_code(&self, _spec: &FunctionSpec, artifact: &Path) -> Result<CodeSource> {
        let bytes = tokio::fs::read(artifact).await?;
        tracing::debug!(artifact = %artifact.display(), size = bytes.len(), "Read archive");
        Ok(CodeSource::Inline(bytes))
    }

    async fn probe(&self, name: &str) -> Result<Option<RemoteFunction>> {
        Ok(self.lambda.get_function(name).await?.map(|arn| {
            tracing::info!(function = %name, "Function already exists");
            RemoteFunction {
                name: name.to_string(),
                id: arn,
            }
        }))
    }

    async fn bootstrap_identity(&self) -> Result<Option<Identity>> {
        ensure_role(self.iam.as_ref(), &self.role_name, self.settle_delay)
            .await
            .map(Some)
    }

    async fn create_function(
        &self,
        spec: &FunctionSpec,
        code: &CodeSource,
        identity: Option<&Identity>,
    ) -> Result<RemoteFunction> {
        let role = identity.ok_or_else(|| {
            CloudError::InvalidConfig("creating a Lambda function requires a role".to_string())
        })?;

        let arn = self
            .lambda
            .create_function(spec, &role.id, inline_bytes(code)?)
            .await?;
        tracing::info!(function = %spec.name, arn = %arn, "Created Lambda function");

        Ok(RemoteFunction {
            name: spec.name.clone(),
            id: arn,
        })
    }

    async fn update_function(
        &self,
        spec: &FunctionSpec,
        code: &CodeSource,
        existing: &RemoteFunction,
    ) -> Result<()> {
        self.lambda
            .update_function_code(&existing.name, inline_bytes(code)?)
            .await?;
        tracing::info!(function = %existing.name, "Uploaded new code, waiting for update");

        // Configuration must not be applied before the code update lands
        self.wait_for_code_update(&existing.name).await?;

        self.lambda.update_function_configuration(spec).await?;
        tracing::info!(function = %existing.name, "Updated function configuration");
        Ok(())
    }

    async fn expose_publicly(&self, name: &str) -> Result<()> {
        self.lambda.add_public_url_permission(name).await
    }

    async fn ensure_endpoint(&self, name: &str) -> Result<Endpoint> {
        match self.lambda.create_function_url(name).await {
            Ok(url) => Ok(Endpoint { url, created: true }),
            Err(CloudError::AlreadyExists(_)) => {
                tracing::debug!(function = %name, "Function URL already exists");
                let url = self.lambda.get_function_url(name).await?;
                Ok(Endpoint {
                    url,
                    created: false,
                })
            }
            Err(e) => Err(e),
        }
    }
}
