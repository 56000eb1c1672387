//! Vertex AI `generateContent` wire types.

use serde::{Deserialize, Serialize};

/// Request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns; a single user turn here.
    pub contents: Vec<Content>,
    /// Output settings.
    pub generation_config: GenerationConfig,
}

/// One conversation turn.
#[derive(Debug, Serialize, Deserialize)]
pub struct Content {
    /// `user` or `model`.
    #[serde(default)]
    pub role: Option<String>,
    /// Text and media parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A text or inline-media part.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64 media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

/// Base64-encoded media.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    /// MIME type.
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

/// Output settings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Requested modalities.
    pub response_modalities: Vec<String>,
    /// Image output settings.
    pub image_config: ImageConfig,
}

/// Image output settings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    /// e.g. `3:4`.
    pub aspect_ratio: String,
    /// e.g. `2K`.
    pub image_size: String,
}

/// Response body.
#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    /// Generated candidates.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// A generated candidate.
#[derive(Debug, Deserialize)]
pub struct Candidate {
    /// Candidate content; absent when blocked.
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// First inline media part across all candidates.
    #[must_use]
    pub fn first_inline_image(&self) -> Option<&Blob> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.inline_data.as_ref())
    }
}
