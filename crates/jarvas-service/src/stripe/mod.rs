//! Stripe integration for credit-pack checkout and payment webhooks.
//!
//! Checkout sessions carry `{uid, credits}` metadata, which Stripe echoes back
//! in the `checkout.session.completed` event used for fulfillment.

pub mod client;
pub mod types;
pub mod webhook;

pub use client::{CheckoutRequest, StripeClient, StripeError};
pub use types::{CheckoutSession, WebhookEvent, WebhookEventData, CHECKOUT_SESSION_COMPLETED};
pub use webhook::{signature_header, verify_signature, SignatureError};
