//! Object storage for enhanced images.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::google_auth::AccessTokenSource;
use crate::upstream::UpstreamError;

const SERVICE: &str = "gcs";

/// Cache header applied to every stored object. Objects are immutable.
pub const CACHE_CONTROL: &str = "public, max-age=31536000";

/// Stores bytes and returns a publicly readable URL.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write `data` at `path` and make it public.
    async fn put_public(
        &self,
        path: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<String, UpstreamError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata<'a> {
    name: &'a str,
    content_type: &'a str,
    cache_control: &'a str,
}

/// Google Cloud Storage bucket.
pub struct GcsStorage {
    client: Client,
    tokens: Arc<dyn AccessTokenSource>,
    bucket: String,
    api_url: String,
    public_url: String,
}

impl GcsStorage {
    /// JSON API root.
    pub const API_URL: &'static str = "https://storage.googleapis.com";

    /// Create a client for `bucket`.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Configuration` if the HTTP client cannot be built.
    pub fn new(
        tokens: Arc<dyn AccessTokenSource>,
        bucket: impl Into<String>,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| UpstreamError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            tokens,
            bucket: bucket.into(),
            api_url: Self::API_URL.to_string(),
            public_url: Self::API_URL.to_string(),
        })
    }

    /// Send uploads to a different API root (emulators, mocks).
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Public URL of an object.
    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.public_url, self.bucket, path)
    }
}

/// Build a `multipart/related` body: JSON metadata then the media bytes.
fn multipart_body(boundary: &str, metadata: &[u8], content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + data.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[async_trait]
impl ObjectStorage for GcsStorage {
    async fn put_public(
        &self,
        path: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<String, UpstreamError> {
        let metadata = serde_json::to_vec(&ObjectMetadata {
            name: path,
            content_type,
            cache_control: CACHE_CONTROL,
        })
        .map_err(|e| UpstreamError::InvalidResponse {
            service: SERVICE,
            message: e.to_string(),
        })?;

        let boundary = format!("jarvas-{}", ulid::Ulid::new());
        let body = multipart_body(&boundary, &metadata, content_type, &data);
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(format!(
                "{}/upload/storage/v1/b/{}/o",
                self.api_url, self.bucket
            ))
            .query(&[("uploadType", "multipart"), ("predefinedAcl", "publicRead")])
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::from_response(SERVICE, response).await);
        }

        tracing::debug!(bucket = %self.bucket, path, bytes = data.len(), "Object stored");
        Ok(self.public_url(path))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::google_auth::StaticTokenSource;

    fn storage(server: &MockServer) -> GcsStorage {
        GcsStorage::new(Arc::new(StaticTokenSource("ya29.test".into())), "jarvas-media")
            .unwrap()
            .with_api_url(server.uri())
    }

    #[test]
    fn multipart_layout() {
        let body = multipart_body("b", br#"{"name":"x"}"#, "image/png", b"PNG");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--b\r\nContent-Type: application/json"));
        assert!(text.contains("Content-Type: image/png\r\n\r\nPNG\r\n--b--"));
    }

    #[tokio::test]
    async fn uploads_and_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/storage/v1/b/jarvas-media/o"))
            .and(query_param("uploadType", "multipart"))
            .and(query_param("predefinedAcl", "publicRead"))
            .and(body_string_contains("\"name\":\"enhanced/u1/abc.png\""))
            .and(body_string_contains("\"cacheControl\":\"public, max-age=31536000\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "enhanced/u1/abc.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = storage(&server)
            .put_public("enhanced/u1/abc.png", "image/png", vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(
            url,
            "https://storage.googleapis.com/jarvas-media/enhanced/u1/abc.png"
        );
    }

    #[tokio::test]
    async fn upload_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = storage(&server)
            .put_public("enhanced/guest/x.png", "image/png", vec![0])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 403, .. }));
    }
}
