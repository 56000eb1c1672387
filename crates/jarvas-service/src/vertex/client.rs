//! Vertex AI client for the image model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;

use super::types::{
    Blob, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, ImageConfig,
    Part,
};
use super::{EnhanceJob, ImageModel, InlineImage};
use crate::google_auth::AccessTokenSource;
use crate::upstream::UpstreamError;

const SERVICE: &str = "vertex";

/// Output resolution requested from the model.
const IMAGE_SIZE: &str = "2K";

/// Image model served by Vertex AI.
pub struct VertexImageModel {
    client: Client,
    tokens: Arc<dyn AccessTokenSource>,
    base_url: String,
    project_id: String,
    location: String,
    model: String,
}

impl VertexImageModel {
    /// Create a client for `model` in `project_id` at `location`.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Configuration` if the HTTP client cannot be built.
    pub fn new(
        tokens: Arc<dyn AccessTokenSource>,
        project_id: impl Into<String>,
        location: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, UpstreamError> {
        let location = location.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(110))
            .build()
            .map_err(|e| UpstreamError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            tokens,
            base_url: endpoint_for(&location),
            project_id: project_id.into(),
            location,
            model: model.into(),
        })
    }

    /// Send requests to a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.base_url, self.project_id, self.location, self.model
        )
    }
}

/// The `global` location has no regional prefix.
fn endpoint_for(location: &str) -> String {
    if location == "global" {
        "https://aiplatform.googleapis.com".to_string()
    } else {
        format!("https://{location}-aiplatform.googleapis.com")
    }
}

#[async_trait]
impl ImageModel for VertexImageModel {
    async fn enhance(&self, job: &EnhanceJob) -> Result<InlineImage, UpstreamError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part {
                        text: Some(job.prompt()),
                        inline_data: None,
                    },
                    Part {
                        text: None,
                        inline_data: Some(Blob {
                            mime_type: job.image.mime_type.clone(),
                            data: STANDARD.encode(&job.image.data),
                        }),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: ImageConfig {
                    aspect_ratio: job.aspect_ratio.clone(),
                    image_size: IMAGE_SIZE.to_string(),
                },
            },
        };

        let token = self.tokens.access_token().await?;

        tracing::debug!(
            model = %self.model,
            sector = %job.sector,
            aspect_ratio = %job.aspect_ratio,
            input_bytes = job.image.data.len(),
            "Calling image model"
        );

        let response = self
            .client
            .post(self.url())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::from_response(SERVICE, response).await);
        }

        let body: GenerateContentResponse = response.json().await?;
        let blob = body.first_inline_image().ok_or(UpstreamError::NoImage)?;
        let data = STANDARD
            .decode(&blob.data)
            .map_err(|e| UpstreamError::InvalidResponse {
                service: SERVICE,
                message: e.to_string(),
            })?;

        tracing::debug!(output_bytes = data.len(), "Image model returned an image");

        Ok(InlineImage {
            mime_type: blob.mime_type.clone(),
            data,
        })
    }
}
