//! Google Cloud REST client
//!
//! Direct JSON API calls with bearer token authentication.

use crate::api::{CloudFunction, FunctionsApi, IamPolicy, Operation, RunApi, StorageApi};
use crate::error::{GcpError, Result as GcpResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use upify_cloud::{CloudError, Result};

const STORAGE_API_BASE: &str = "https://storage.googleapis.com/storage/v1";
const STORAGE_UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";
const FUNCTIONS_API_BASE: &str = "https://cloudfunctions.googleapis.com/v2";
const RUN_API_BASE: &str = "https://run.googleapis.com/v2";

pub struct RestClient {
    client: reqwest::Client,
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl ObjectList {
    /// Token for the following page, `None` on the last page
    fn next_page(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

impl RestClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
        }
    }

    /// Send the request and turn non-success statuses into [`GcpError::Status`]
    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> GcpResult<reqwest::Response> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        tracing::debug!(operation, status = status.as_u16(), "GCP API error");
        Err(GcpError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> GcpResult<T> {
        let response = self.send(operation, request).await?;
        Ok(response.json().await?)
    }
}

/// Object names are a single path segment in the JSON API
fn encode_object(object: &str) -> String {
    object.replace('%', "%25").replace('/', "%2F")
}

/// Follow `nextPageToken` until the last page and gather object names
async fn collect_pages<F, Fut>(mut fetch: F) -> GcpResult<Vec<String>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = GcpResult<ObjectList>>,
{
    let mut names = Vec::new();
    let mut page_token = None;

    loop {
        let list = fetch(page_token.take()).await?;
        page_token = list.next_page().map(str::to_string);
        names.extend(list.items.into_iter().map(|item| item.name));

        if page_token.is_none() {
            return Ok(names);
        }
    }
}

fn not_found_as_none<T>(result: GcpResult<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) => match CloudError::from(e) {
            CloudError::NotFound(_) => Ok(None),
            other => Err(other),
        },
    }
}

#[async_trait]
impl StorageApi for RestClient {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let url = format!("{}/b/{}", STORAGE_API_BASE, bucket);
        let result = self.send("GetBucket", self.client.get(&url)).await;
        Ok(not_found_as_none(result)?.is_some())
    }

    async fn create_bucket(&self, project_id: &str, bucket: &str, location: &str) -> Result<()> {
        let url = format!("{}/b", STORAGE_API_BASE);
        let body = serde_json::json!({ "name": bucket, "location": location });
        self.send(
            "CreateBucket",
            self.client
                .post(&url)
                .query(&[("project", project_id)])
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        let url = format!("{}/b/{}/o", STORAGE_API_BASE, bucket);
        let url = url.as_str();
        let names = collect_pages(move |page_token| {
            let mut request = self.client.get(url);
            if let Some(token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }
            self.send_json::<ObjectList>("ListObjects", request)
        })
        .await?;

        tracing::debug!(bucket, objects = names.len(), "Listed bucket objects");
        Ok(names)
    }

    async fn delete_object(&self, bucket: &str, object: &str) -> Result<()> {
        let url = format!(
            "{}/b/{}/o/{}",
            STORAGE_API_BASE,
            bucket,
            encode_object(object)
        );
        self.send("DeleteObject", self.client.delete(&url)).await?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let url = format!("{}/b/{}", STORAGE_API_BASE, bucket);
        self.send("DeleteBucket", self.client.delete(&url)).await?;
        Ok(())
    }

    async fn upload_object(&self, bucket: &str, object: &str, data: Vec<u8>) -> Result<()> {
        let url = format!("{}/b/{}/o", STORAGE_UPLOAD_BASE, bucket);
        self.send(
            "UploadObject",
            self.client
                .post(&url)
                .query(&[("uploadType", "media"), ("name", object)])
                .header(reqwest::header::CONTENT_TYPE, "application/zip")
                .body(data),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl FunctionsApi for RestClient {
    async fn get_function(&self, name: &str) -> Result<Option<CloudFunction>> {
        let url = format!("{}/{}", FUNCTIONS_API_BASE, name);
        not_found_as_none(self.send_json("GetFunction", self.client.get(&url)).await)
    }

    async fn create_function(
        &self,
        parent: &str,
        function_id: &str,
        body: &serde_json::Value,
    ) -> Result<Operation> {
        let url = format!("{}/{}/functions", FUNCTIONS_API_BASE, parent);
        Ok(self
            .send_json(
                "CreateFunction",
                self.client
                    .post(&url)
                    .query(&[("functionId", function_id)])
                    .json(body),
            )
            .await?)
    }

    async fn update_function(&self, name: &str, body: &serde_json::Value) -> Result<Operation> {
        let url = format!("{}/{}", FUNCTIONS_API_BASE, name);
        Ok(self
            .send_json("UpdateFunction", self.client.patch(&url).json(body))
            .await?)
    }

    async fn get_operation(&self, name: &str) -> Result<Operation> {
        let url = format!("{}/{}", FUNCTIONS_API_BASE, name);
        Ok(self.send_json("GetOperation", self.client.get(&url)).await?)
    }
}

#[async_trait]
impl RunApi for RestClient {
    async fn get_iam_policy(&self, service: &str) -> Result<IamPolicy> {
        let url = format!("{}/{}:getIamPolicy", RUN_API_BASE, service);
        Ok(self.send_json("GetIamPolicy", self.client.get(&url)).await?)
    }

    async fn set_iam_policy(&self, service: &str, policy: &IamPolicy) -> Result<IamPolicy> {
        let url = format!("{}/{}:setIamPolicy", RUN_API_BASE, service);
        let body = serde_json::json!({ "policy": policy });
        Ok(self
            .send_json("SetIamPolicy", self.client.post(&url).json(&body))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_object() {
        assert_eq!(encode_object("source.zip"), "source.zip");
        assert_eq!(encode_object("dir/source.zip"), "dir%2Fsource.zip");
    }

    #[test]
    fn test_object_list_without_items() {
        let list: ObjectList = serde_json::from_str(r#"{"kind":"storage#objects"}"#).unwrap();
        assert!(list.items.is_empty());
        assert_eq!(list.next_page(), None);
    }

    fn page(names: &[&str], next: Option<&str>) -> ObjectList {
        ObjectList {
            items: names
                .iter()
                .map(|name| ObjectItem {
                    name: name.to_string(),
                })
                .collect(),
            next_page_token: next.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_collect_pages_follows_tokens() {
        let requested = std::sync::Mutex::new(Vec::new());

        let names = collect_pages(|token| {
            requested.lock().unwrap().push(token.clone());
            let list = match token.as_deref() {
                None => page(&["a.zip", "b.zip"], Some("p2")),
                Some("p2") => page(&["c.zip"], Some("p3")),
                Some(_) => page(&["d.zip"], None),
            };
            async move { Ok(list) }
        })
        .await
        .unwrap();

        assert_eq!(names, vec!["a.zip", "b.zip", "c.zip", "d.zip"]);
        assert_eq!(
            *requested.lock().unwrap(),
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_collect_pages_stops_on_error() {
        let mut calls = 0;
        let result = collect_pages(|_| {
            calls += 1;
            let outcome = if calls == 1 {
                Ok(page(&["a.zip"], Some("p2")))
            } else {
                Err(GcpError::MissingToken("expired".to_string()))
            };
            async move { outcome }
        })
        .await;

        assert!(matches!(result, Err(GcpError::MissingToken(_))));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_object_list_page_token() {
        let list: ObjectList = serde_json::from_str(
            r#"{
                "kind": "storage#objects",
                "nextPageToken": "CgZzb3VyY2U=",
                "items": [{"name": "source.zip"}, {"name": "extra.zip"}]
            }"#,
        )
        .unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.next_page(), Some("CgZzb3VyY2U="));

        let last: ObjectList =
            serde_json::from_str(r#"{"items": [{"name": "a"}], "nextPageToken": ""}"#).unwrap();
        assert_eq!(last.next_page(), None);
    }
}
