//! Ports over Cloud Storage, Cloud Functions v2 and Cloud Run v2

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use upify_cloud::Result;

/// Subset of a Cloud Functions v2 `Function` resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_config: Option<ServiceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    /// Backing Cloud Run service, `projects/*/locations/*/services/*`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl CloudFunction {
    pub fn service(&self) -> Option<&str> {
        self.service_config.as_ref()?.service.as_deref()
    }

    pub fn uri(&self) -> Option<&str> {
        self.service_config
            .as_ref()
            .and_then(|s| s.uri.as_deref())
            .or(self.url.as_deref())
    }
}

/// Long-running operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl IamPolicy {
    pub fn has_member(&self, role: &str, member: &str) -> bool {
        self.bindings
            .iter()
            .any(|b| b.role == role && b.members.iter().any(|m| m == member))
    }

    /// Add `member` to `role`; `false` when it is already granted
    pub fn grant(&mut self, role: &str, member: &str) -> bool {
        if self.has_member(role, member) {
            return false;
        }
        match self.bindings.iter_mut().find(|b| b.role == role) {
            Some(binding) => binding.members.push(member.to_string()),
            None => self.bindings.push(Binding {
                role: role.to_string(),
                members: vec![member.to_string()],
            }),
        }
        true
    }
}

#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    async fn create_bucket(&self, project_id: &str, bucket: &str, location: &str) -> Result<()>;

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>>;

    async fn delete_object(&self, bucket: &str, object: &str) -> Result<()>;

    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    async fn upload_object(&self, bucket: &str, object: &str, data: Vec<u8>) -> Result<()>;
}

#[async_trait]
pub trait FunctionsApi: Send + Sync {
    /// `None` when the function does not exist
    async fn get_function(&self, name: &str) -> Result<Option<CloudFunction>>;

    async fn create_function(
        &self,
        parent: &str,
        function_id: &str,
        body: &serde_json::Value,
    ) -> Result<Operation>;

    async fn update_function(&self, name: &str, body: &serde_json::Value) -> Result<Operation>;

    async fn get_operation(&self, name: &str) -> Result<Operation>;
}

#[async_trait]
pub trait RunApi: Send + Sync {
    async fn get_iam_policy(&self, service: &str) -> Result<IamPolicy>;

    async fn set_iam_policy(&self, service: &str, policy: &IamPolicy) -> Result<IamPolicy>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_is_idempotent() {
        let mut policy = IamPolicy::default();
        assert!(policy.grant("roles/run.invoker", "allUsers"));
        assert!(!policy.grant("roles/run.invoker", "allUsers"));
        assert!(policy.grant("roles/run.invoker", "user:a@example.com"));

        assert_eq!(policy.bindings.len(), 1);
        assert_eq!(policy.bindings[0].members.len(), 2);
    }

    #[test]
    fn test_function_uri_prefers_service_config() {
        let function: CloudFunction = serde_json::from_str(
            r#"{
                "name": "projects/p/locations/r/functions/demo",
                "url": "https://r-p.cloudfunctions.net/demo",
                "serviceConfig": {
                    "service": "projects/p/locations/r/services/demo",
                    "uri": "https://demo-abc-uc.a.run.app"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(function.uri(), Some("https://demo-abc-uc.a.run.app"));
        assert_eq!(function.service(), Some("projects/p/locations/r/services/demo"));
    }
}
