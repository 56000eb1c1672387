//! Photo enhancement handler.
//!
//! Signed-in callers pay for each enhancement: credits are reserved before the
//! model runs and refunded if anything after the reservation fails or the
//! request is abandoned. Output is always stored as PNG. Anonymous callers get
//! a watermarked trial and never touch the ledger.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use jarvas_core::{Generation, GenerationId, UserId};
use jarvas_store::Store;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::state::AppState;
use crate::vertex::{EnhanceJob, InlineImage, DEFAULT_ASPECT_RATIO, DEFAULT_STYLE};
use crate::watermark::to_png;

/// Storage folder for anonymous output.
const GUEST_FOLDER: &str = "guest";

/// Everything is stored as PNG.
const PNG_MIME: &str = "image/png";

/// Enhance request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceBody {
    /// Source photo as a `data:<mime>;base64,<payload>` URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Category; selects the prompt.
    #[serde(default)]
    pub sector: Option<String>,
    /// Style hint.
    #[serde(default)]
    pub style: Option<String>,
    /// Output aspect ratio.
    #[serde(default)]
    pub aspect_ratio: Option<String>,
}

/// Enhance response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceResponse {
    /// Public URL of the enhanced image.
    pub enhanced_url: String,
    /// Whether this was an unpaid, watermarked trial.
    pub is_trial: bool,
}

/// Enhance a photo.
pub async fn enhance(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Json(body): Json<EnhanceBody>,
) -> Result<Json<EnhanceResponse>, ApiError> {
    let job = build_job(body)?;
    let id = GenerationId::generate();
    let is_trial = user.is_none();

    let enhanced_url = match user {
        Some(user) => enhance_paid(&state, &user, &job, id).await?,
        None => enhance_trial(&state, &job, id).await?,
    };

    Ok(Json(EnhanceResponse {
        enhanced_url,
        is_trial,
    }))
}

fn build_job(body: EnhanceBody) -> Result<EnhanceJob, ApiError> {
    let (Some(image), Some(sector)) = (
        body.image.filter(|i| !i.is_empty()),
        body.sector.filter(|s| !s.trim().is_empty()),
    ) else {
        return Err(ApiError::BadRequest("Missing image or sector".into()));
    };

    Ok(EnhanceJob {
        image: parse_data_url(&image)?,
        sector,
        style: body
            .style
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_STYLE.to_string()),
        aspect_ratio: body
            .aspect_ratio
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_ASPECT_RATIO.to_string()),
    })
}

/// Decode a `data:image/<type>;base64,<payload>` URL.
fn parse_data_url(url: &str) -> Result<InlineImage, ApiError> {
    let invalid = || ApiError::BadRequest("image must be a base64 data URL".into());

    let rest = url.strip_prefix("data:").ok_or_else(invalid)?;
    let (meta, payload) = rest.split_once(',').ok_or_else(invalid)?;
    let mime_type = meta.strip_suffix(";base64").ok_or_else(invalid)?;
    if !mime_type.starts_with("image/") {
        return Err(ApiError::BadRequest(format!(
            "unsupported media type: {mime_type}"
        )));
    }

    let data = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
    if data.is_empty() {
        return Err(invalid());
    }

    Ok(InlineImage {
        mime_type: mime_type.to_string(),
        data,
    })
}

fn object_path(folder: &str, id: GenerationId) -> String {
    format!("enhanced/{folder}/{id}.png")
}

async fn enhance_paid(
    state: &AppState,
    user: &AuthUser,
    job: &EnhanceJob,
    id: GenerationId,
) -> Result<String, ApiError> {
    // Refunds on drop, so a timed-out or abandoned request gives the credits back.
    let charge = state
        .ledger
        .reserve_guarded(&user.user_id, state.config.enhance_cost)?;

    match run_paid(state, &user.user_id, job, id).await {
        Ok(url) => {
            let balance = charge.commit();
            tracing::info!(
                user_id = %user.user_id,
                generation_id = %id,
                balance,
                "Enhancement completed"
            );
            Ok(url)
        }
        Err(err) => {
            tracing::warn!(
                user_id = %user.user_id,
                generation_id = %id,
                error = %err,
                "Enhancement failed, refunding reservation"
            );
            if let Err(refund_err) = charge.refund() {
                tracing::error!(
                    user_id = %user.user_id,
                    error = %refund_err,
                    "Failed to refund reservation"
                );
            }
            Err(err)
        }
    }
}

async fn run_paid(
    state: &AppState,
    user_id: &UserId,
    job: &EnhanceJob,
    id: GenerationId,
) -> Result<String, ApiError> {
    let output = state.model.enhance(job).await?;
    let png = into_png(output).await?;
    let url = state
        .storage
        .put_public(&object_path(user_id.as_str(), id), PNG_MIME, png)
        .await?;

    state.store.put_generation(&Generation {
        id,
        user_id: user_id.clone(),
        image_url: url.clone(),
        sector: job.sector.clone(),
        style: job.style.clone(),
        created_at: Utc::now(),
    })?;

    Ok(url)
}

/// Model output re-encoded as PNG; PNG output passes through untouched.
async fn into_png(image: InlineImage) -> Result<Vec<u8>, ApiError> {
    if image.mime_type == PNG_MIME {
        return Ok(image.data);
    }

    tokio::task::spawn_blocking(move || to_png(&image.data))
        .await
        .map_err(|e| ApiError::Internal(format!("re-encode task failed: {e}")))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn enhance_trial(
    state: &AppState,
    job: &EnhanceJob,
    id: GenerationId,
) -> Result<String, ApiError> {
    let output = state.model.enhance(job).await?;

    let watermark = state.watermark.clone();
    let marked = tokio::task::spawn_blocking(move || watermark.apply(&output.data))
        .await
        .map_err(|e| ApiError::Internal(format!("watermark task failed: {e}")))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let url = state
        .storage
        .put_public(&object_path(GUEST_FOLDER, id), PNG_MIME, marked)
        .await?;

    tracing::info!(generation_id = %id, sector = %job.sector, "Trial enhancement completed");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_urls() {
        let image = parse_data_url("data:image/jpeg;base64,AQID").unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.data, vec![1, 2, 3]);
    }

    #[test]
    fn rejects_malformed_data_urls() {
        for url in [
            "AQID",
            "data:image/jpeg,AQID",
            "data:image/jpeg;base64",
            "data:text/plain;base64,AQID",
            "data:image/png;base64,!!!",
            "data:image/png;base64,",
        ] {
            assert!(
                matches!(parse_data_url(url), Err(ApiError::BadRequest(_))),
                "accepted {url}"
            );
        }
    }

    #[test]
    fn defaults_style_and_aspect_ratio() {
        let job = build_job(EnhanceBody {
            image: Some("data:image/png;base64,AQID".into()),
            sector: Some("food".into()),
            style: None,
            aspect_ratio: Some(String::new()),
        })
        .unwrap();
        assert_eq!(job.style, "realistic");
        assert_eq!(job.aspect_ratio, "3:4");
    }

    #[test]
    fn requires_image_and_sector() {
        let missing_sector = EnhanceBody {
            image: Some("data:image/png;base64,AQID".into()),
            sector: Some("  ".into()),
            style: None,
            aspect_ratio: None,
        };
        assert!(matches!(
            build_job(missing_sector),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn paths_are_per_owner() {
        let id = GenerationId::generate();
        assert_eq!(object_path("guest", id), format!("enhanced/guest/{id}.png"));
    }
}
