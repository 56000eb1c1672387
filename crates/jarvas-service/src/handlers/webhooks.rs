//! Stripe webhook handler: verified, idempotent credit fulfillment.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use jarvas_core::UserId;
use jarvas_store::CreditOutcome;

use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::{verify_signature, CheckoutSession, WebhookEvent, CHECKOUT_SESSION_COMPLETED};

/// Header carrying the Stripe signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was accepted.
    pub received: bool,
}

/// Handle Stripe webhooks.
///
/// The signature is checked against the exact bytes received, before the
/// payload is parsed. Errors after verification return 5xx so Stripe retries;
/// retries are safe because crediting is keyed by the event id.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::Internal("webhook secret not configured".into()))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::SignatureInvalid("missing signature header".into()))?;

    verify_signature(
        &body,
        signature,
        secret,
        state.config.webhook_tolerance(),
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Invalid Stripe webhook signature");
        ApiError::SignatureInvalid(e.to_string())
    })?;

    let event: WebhookEvent =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received Stripe webhook"
    );

    if event.event_type == CHECKOUT_SESSION_COMPLETED {
        handle_checkout_completed(&state, &event)?;
    } else {
        tracing::debug!(event_type = %event.event_type, "Unhandled Stripe event");
    }

    Ok(Json(WebhookResponse { received: true }))
}

/// Credit the buyer named in the session metadata.
///
/// Sessions that cannot be attributed are acknowledged without effect:
/// redelivery would not fix them.
fn handle_checkout_completed(state: &AppState, event: &WebhookEvent) -> Result<(), ApiError> {
    let session: CheckoutSession = serde_json::from_value(event.data.object.clone())
        .map_err(|e| ApiError::BadRequest(format!("invalid checkout session: {e}")))?;

    if !session.is_paid() {
        tracing::info!(
            session_id = %session.id,
            payment_status = ?session.payment_status,
            "Checkout session not paid yet, skipping"
        );
        return Ok(());
    }

    let Some(user_id) = session
        .metadata
        .get("uid")
        .and_then(|uid| UserId::new(uid.trim()).ok())
    else {
        tracing::warn!(session_id = %session.id, "Checkout session without uid metadata");
        return Ok(());
    };

    let credits = session
        .metadata
        .get("credits")
        .and_then(|c| c.trim().parse::<i64>().ok())
        .unwrap_or(0);
    if credits <= 0 {
        tracing::warn!(
            session_id = %session.id,
            user_id = %user_id,
            credits = ?session.metadata.get("credits"),
            "Checkout session without a positive credits amount"
        );
        return Ok(());
    }

    tracing::info!(
        user_id = %user_id,
        session_id = %session.id,
        event_id = %event.id,
        credits,
        "Processing checkout completion"
    );

    match state.ledger.credit_for_event(&user_id, credits, &event.id)? {
        CreditOutcome::Applied { balance } => {
            tracing::info!(user_id = %user_id, credits, balance, "Checkout fulfilled");
        }
        CreditOutcome::Duplicate => {
            tracing::info!(event_id = %event.id, "Duplicate delivery acknowledged");
        }
    }

    Ok(())
}
