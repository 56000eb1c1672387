//! Image enhancement model.
//!
//! [`ImageModel`] is the seam the enhance handler talks to; [`VertexImageModel`]
//! implements it against the Vertex AI `generateContent` endpoint.

pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::upstream::UpstreamError;

pub use client::VertexImageModel;

/// Default style hint when the caller sends none.
pub const DEFAULT_STYLE: &str = "realistic";

/// Default output aspect ratio when the caller sends none.
pub const DEFAULT_ASPECT_RATIO: &str = "3:4";

/// Raw image bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Decoded bytes.
    pub data: Vec<u8>,
}

/// One enhancement job.
#[derive(Debug, Clone)]
pub struct EnhanceJob {
    /// Source photo.
    pub image: InlineImage,
    /// Category chosen by the user; selects the prompt.
    pub sector: String,
    /// Style hint.
    pub style: String,
    /// Requested output aspect ratio.
    pub aspect_ratio: String,
}

impl EnhanceJob {
    /// Instruction sent alongside the source photo.
    #[must_use]
    pub fn prompt(&self) -> String {
        sector_prompt(&self.sector)
    }
}

/// Produces an enhanced version of a photo.
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Run the job and return the generated image.
    async fn enhance(&self, job: &EnhanceJob) -> Result<InlineImage, UpstreamError>;
}

fn sector_prompt(sector: &str) -> String {
    match sector {
        "restaurant" => "Turn this photo in a professional shot of the exact same food. \
                         Michelin-level photograph."
            .to_string(),
        "food" => "Turn this photo in a professional shot of the exact same food. \
                   You can change the layout. Michelin-level photography."
            .to_string(),
        "architecture" | "real_estate" | "product" => {
            "Improve this image as if it had been taken by a professional photographer. \
             Keep the subject consistent but you may change the composition of the image."
                .to_string()
        }
        "portrait" | "fashion" => "Turn this photo into a professional portrait/fashion shot. \
                                   Flattering lighting, skin texture enhancement while keeping \
                                   it natural. High-end magazine look."
            .to_string(),
        "landscape" => "Enhance this landscape photo to look like a National Geographic shot. \
                        Improve dynamic range, vibrance and clarity."
            .to_string(),
        "studio_selfie" => "A professional, high-resolution profile photo, maintaining the exact \
                            facial structure, identity, and key features of the person in the \
                            input image. The subject is framed from the chest up, with ample \
                            headroom. The person looks directly at the camera. They are styled \
                            for a professional photo studio shoot. Also upscale the quality of \
                            the image."
            .to_string(),
        other => format!(
            "Enhance this {other} photo. Make it look professional, high resolution, perfect \
             lighting. Fix any imperfections. Keep the original composition but improve \
             aesthetics."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sectors_share_prompts() {
        assert_eq!(sector_prompt("architecture"), sector_prompt("product"));
        assert_eq!(sector_prompt("portrait"), sector_prompt("fashion"));
        assert!(sector_prompt("landscape").contains("National Geographic"));
    }

    #[test]
    fn unknown_sector_is_named_in_prompt() {
        assert!(sector_prompt("automotive").starts_with("Enhance this automotive photo."));
    }
}
