//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{checkout, enhance, health, users, webhooks};
use crate::state::AppState;

/// Maximum concurrent enhancement requests. Each one holds an image in memory
/// and waits on the model for up to a couple of minutes.
const ENHANCE_MAX_CONCURRENT_REQUESTS: usize = 16;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /v1/credits/packs` - Credit pack catalogue
///
/// ## Users (Firebase ID token)
/// - `POST /v1/users/init` - Create account on first sign-in
/// - `GET /v1/users/history` - Recent generations
/// - `GET /v1/credits/balance` - Current balance
/// - `POST /v1/checkout` - Open a Stripe Checkout session
///
/// ## Enhancement (optional ID token; anonymous callers get a trial)
/// - `POST /v1/enhance`
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/stripe` - Stripe webhooks
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    // Enhancement is the expensive path; it gets its own, tighter limit.
    let enhance_routes = Router::new()
        .route("/enhance", post(enhance::enhance))
        .layer(ConcurrencyLimitLayer::new(ENHANCE_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .route("/users/init", post(users::init_user))
        .route("/users/history", get(users::get_history))
        .route("/credits/balance", get(users::get_balance))
        .route("/credits/packs", get(checkout::list_packs))
        .route("/checkout", post(checkout::create_checkout))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        .merge(enhance_routes);

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - controlled by the processor)
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
