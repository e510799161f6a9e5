//! [`LambdaApi`] and [`IamApi`] backed by the AWS SDK

use crate::api::{HANDLER, IamApi, LambdaApi, PUBLIC_URL_STATEMENT_ID, UpdateStatus};
use crate::error::{classify, classify_duplicate};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_lambda::config::Region;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{
    Environment, FunctionCode, FunctionUrlAuthType, LastUpdateStatus, Runtime,
};
use std::collections::HashMap;
use upify_cloud::{CloudError, FunctionSpec, Result};

/// Load the default credential chain for `region`
pub async fn load_sdk_config(region: &str) -> aws_config::SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

fn environment(spec: &FunctionSpec) -> Environment {
    let variables: HashMap<String, String> = spec
        .environment
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Environment::builder().set_variables(Some(variables)).build()
}

fn to_i32(value: Option<u32>) -> Option<i32> {
    value.and_then(|v| i32::try_from(v).ok())
}

pub struct SdkLambda {
    client: aws_sdk_lambda::Client,
}

impl SdkLambda {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_lambda::Client::new(config),
        }
    }
}

#[async_trait]
impl LambdaApi for SdkLambda {
    async fn get_function(&self, name: &str) -> Result<Option<String>> {
        match self.client.get_function().function_name(name).send().await {
            Ok(output) => Ok(Some(
                output
                    .configuration()
                    .and_then(|c| c.function_arn())
                    .unwrap_or(name)
                    .to_string(),
            )),
            Err(e) => match classify("GetFunction", e) {
                CloudError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn create_function(
        &self,
        spec: &FunctionSpec,
        role_arn: &str,
        zip: Vec<u8>,
    ) -> Result<String> {
        let output = self
            .client
            .create_function()
            .function_name(&spec.name)
            .runtime(Runtime::from(spec.runtime.as_str()))
            .role(role_arn)
            .handler(HANDLER)
            .code(FunctionCode::builder().zip_file(Blob::new(zip)).build())
            .environment(environment(spec))
            .set_memory_size(to_i32(spec.memory_mb))
            .set_timeout(to_i32(spec.timeout_secs))
            .send()
            .await
            .map_err(|e| classify("CreateFunction", e))?;

        Ok(output.function_arn().unwrap_or(&spec.name).to_string())
    }

    async fn update_function_code(&self, name: &str, zip: Vec<u8>) -> Result<()> {
        self.client
            .update_function_code()
            .function_name(name)
            .zip_file(Blob::new(zip))
            .send()
            .await
            .map_err(|e| classify("UpdateFunctionCode", e))?;
        Ok(())
    }

    async fn last_update_status(&self, name: &str) -> Result<UpdateStatus> {
        let output = self
            .client
            .get_function_configuration()
            .function_name(name)
            .send()
            .await
            .map_err(|e| classify("GetFunctionConfiguration", e))?;

        Ok(match output.last_update_status() {
            Some(LastUpdateStatus::Successful) => UpdateStatus::Successful,
            Some(LastUpdateStatus::Failed) => UpdateStatus::Failed(
                output
                    .last_update_status_reason()
                    .unwrap_or("no reason reported")
                    .to_string(),
            ),
            _ => UpdateStatus::InProgress,
        })
    }

    async fn update_function_configuration(&self, spec: &FunctionSpec) -> Result<()> {
        self.client
            .update_function_configuration()
            .function_name(&spec.name)
            .runtime(Runtime::from(spec.runtime.as_str()))
            .environment(environment(spec))
            .set_memory_size(to_i32(spec.memory_mb))
            .set_timeout(to_i32(spec.timeout_secs))
            .send()
            .await
            .map_err(|e| classify("UpdateFunctionConfiguration", e))?;
        Ok(())
    }

    async fn add_public_url_permission(&self, name: &str) -> Result<()> {
        let result = self
            .client
            .add_permission()
            .function_name(name)
            .statement_id(PUBLIC_URL_STATEMENT_ID)
            .action("lambda:InvokeFunctionUrl")
            .principal("*")
            .function_url_auth_type(FunctionUrlAuthType::None)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match classify_duplicate("AddPermission", e) {
                CloudError::AlreadyExists(detail) => Err(CloudError::PermissionConflict(detail)),
                other => Err(other),
            },
        }
    }

    async fn create_function_url(&self, name: &str) -> Result<String> {
        let output = self
            .client
            .create_function_url_config()
            .function_name(name)
            .auth_type(FunctionUrlAuthType::None)
            .send()
            .await
            .map_err(|e| classify_duplicate("CreateFunctionUrlConfig", e))?;
        Ok(output.function_url().to_string())
    }

    async fn get_function_url(&self, name: &str) -> Result<String> {
        let output = self
            .client
            .get_function_url_config()
            .function_name(name)
            .send()
            .await
            .map_err(|e| classify("GetFunctionUrlConfig", e))?;
        Ok(output.function_url().to_string())
    }
}

pub struct SdkIam {
    client: aws_sdk_iam::Client,
}

impl SdkIam {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_iam::Client::new(config),
        }
    }
}

#[async_trait]
impl IamApi for SdkIam {
    async fn get_role_arn(&self, role_name: &str) -> Result<Option<String>> {
        match self.client.get_role().role_name(role_name).send().await {
            Ok(output) => Ok(output.role().map(|role| role.arn().to_string())),
            Err(e) => match classify("GetRole", e) {
                CloudError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn create_role(&self, role_name: &str, trust_policy: &str) -> Result<String> {
        let output = self
            .client
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(trust_policy)
            .send()
            .await
            .map_err(|e| classify("CreateRole", e))?;

        output
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| CloudError::api("CreateRole", "response did not include the role"))
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify("AttachRolePolicy", e))?;
        Ok(())
    }
}
