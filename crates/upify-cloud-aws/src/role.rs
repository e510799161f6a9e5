//! Execution role for Lambda functions

use crate::api::IamApi;
use std::time::Duration;
use upify_cloud::{Identity, Result};

/// Managed policy granting CloudWatch Logs access
pub const BASIC_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Delay before a freshly created role can be assumed by Lambda
pub const ROLE_SETTLE_DELAY: Duration = Duration::from_secs(15);

pub const LAMBDA_TRUST_POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {
            "Effect": "Allow",
            "Principal": {
                "Service": "lambda.amazonaws.com"
            },
            "Action": "sts:AssumeRole"
        }
    ]
}"#;

/// Return the role named `role_name`, creating it when missing
pub async fn ensure_role(
    iam: &dyn IamApi,
    role_name: &str,
    settle_delay: Duration,
) -> Result<Identity> {
    if let Some(arn) = iam.get_role_arn(role_name).await? {
        tracing::debug!(role = %role_name, "Reusing existing IAM role");
        return Ok(Identity {
            id: arn,
            created: false,
        });
    }

    tracing::info!(role = %role_name, "Creating IAM role");
    let arn = iam.create_role(role_name, LAMBDA_TRUST_POLICY).await?;
    iam.attach_role_policy(role_name, BASIC_EXECUTION_POLICY_ARN).await?;

    // New roles are not assumable until IAM propagates them
    tracing::info!(
        role = %role_name,
        delay_secs = settle_delay.as_secs(),
        "Waiting for IAM role to propagate"
    );
    tokio::time::sleep(settle_delay).await;

    Ok(Identity { id: arn, created: true })
}
