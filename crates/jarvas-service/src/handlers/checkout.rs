//! Credit pack catalogue and Stripe Checkout handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use jarvas_core::{find_by_price_id, CreditPack};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::{CheckoutRequest, StripeError};

/// Pack catalogue response.
#[derive(Debug, Serialize)]
pub struct PacksResponse {
    /// Packs on offer.
    pub packs: Vec<CreditPack>,
}

/// Checkout request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    /// Stripe price id of the chosen pack.
    #[serde(default)]
    pub price_id: Option<String>,
    /// Credits the client expects to receive.
    #[serde(default)]
    pub credits: Option<i64>,
}

/// Checkout response.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Stripe-hosted payment page.
    pub url: String,
}

/// List the credit packs on offer.
pub async fn list_packs(State(state): State<Arc<AppState>>) -> Json<PacksResponse> {
    Json(PacksResponse {
        packs: state.packs.clone(),
    })
}

/// Open a Checkout session for a credit pack.
///
/// The credited amount comes from the catalogue, never from the client; a
/// request whose `credits` disagrees with the pack is rejected.
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let price_id = body
        .price_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing priceId".into()))?;

    let credits = body.credits.unwrap_or(0);
    if credits <= 0 {
        return Err(ApiError::BadRequest("credits must be positive".into()));
    }

    let pack = find_by_price_id(&state.packs, price_id)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown priceId: {price_id}")))?;
    if pack.credits != credits {
        return Err(ApiError::BadRequest(format!(
            "priceId {price_id} grants {} credits, not {credits}",
            pack.credits
        )));
    }

    let stripe = state
        .stripe
        .as_ref()
        .ok_or_else(|| ApiError::Internal("Stripe not configured".into()))?;

    let success_url = state.config.checkout_success_url();
    let cancel_url = state.config.checkout_cancel_url();
    let session = stripe
        .create_checkout_session(&CheckoutRequest {
            user_id: &user.user_id,
            price_id: &pack.price_id,
            credits: pack.credits,
            success_url: &success_url,
            cancel_url: &cancel_url,
        })
        .await
        .map_err(stripe_error)?;

    tracing::info!(
        user_id = %user.user_id,
        session_id = %session.id,
        price_id = %pack.price_id,
        credits = pack.credits,
        "Checkout session created"
    );

    let url = session
        .url
        .ok_or_else(|| stripe_error(StripeError::MissingUrl(session.id.clone())))?;
    Ok(Json(CheckoutResponse { url }))
}

fn stripe_error(err: StripeError) -> ApiError {
    ApiError::Upstream(err.to_string())
}
