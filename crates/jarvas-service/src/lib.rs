//! Jarvas HTTP API service.
//!
//! This crate provides the HTTP API for the jarvas photo enhancement app:
//!
//! - Account initialisation, balance and generation history
//! - Paid and trial photo enhancement
//! - Credit pack checkout through Stripe
//! - Stripe webhook fulfillment
//!
//! # Authentication
//!
//! End-user requests carry a Firebase ID token as a bearer token. The
//! enhancement route also accepts anonymous callers, who get a watermarked
//! trial. Webhooks are authenticated by their Stripe signature.
//!
//! # Collaborators
//!
//! Identity, inference, object storage and watermarking sit behind traits
//! ([`IdentityVerifier`], [`ImageModel`], [`ObjectStorage`], [`Watermarker`])
//! handed to [`AppState::new`], so tests run the full router against fakes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers must be async for axum

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gcs;
pub mod google_auth;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod stripe;
pub mod upstream;
pub mod vertex;
pub mod watermark;

pub use auth::{AuthError, FirebaseVerifier, IdentityVerifier, VerifiedIdentity};
pub use config::ServiceConfig;
pub use error::ApiError;
pub use gcs::{GcsStorage, ObjectStorage};
pub use google_auth::{AccessTokenSource, ServiceAccountTokenSource, StaticTokenSource};
pub use routes::create_router;
pub use state::{AppState, Collaborators};
pub use stripe::{StripeClient, StripeError};
pub use upstream::UpstreamError;
pub use vertex::{EnhanceJob, ImageModel, InlineImage, VertexImageModel};
pub use watermark::{BandWatermark, WatermarkError, Watermarker};
