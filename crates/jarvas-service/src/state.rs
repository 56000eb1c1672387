//! Application state.

use std::sync::Arc;

use jarvas_core::CreditPack;
use jarvas_store::{Ledger, Store};

use crate::auth::IdentityVerifier;
use crate::config::ServiceConfig;
use crate::gcs::ObjectStorage;
use crate::stripe::StripeClient;
use crate::vertex::ImageModel;
use crate::watermark::Watermarker;

/// External collaborators, constructed once at startup.
#[derive(Clone)]
pub struct Collaborators {
    /// Bearer-token verification.
    pub identity: Arc<dyn IdentityVerifier>,
    /// Image enhancement model.
    pub model: Arc<dyn ImageModel>,
    /// Output storage.
    pub storage: Arc<dyn ObjectStorage>,
    /// Trial watermarking.
    pub watermark: Arc<dyn Watermarker>,
    /// Stripe client for checkout (optional).
    pub stripe: Option<Arc<StripeClient>>,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// The credit ledger over `store`.
    pub ledger: Ledger,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Credit packs offered at checkout.
    pub packs: Vec<CreditPack>,

    /// Bearer-token verification.
    pub identity: Arc<dyn IdentityVerifier>,

    /// Image enhancement model.
    pub model: Arc<dyn ImageModel>,

    /// Output storage.
    pub storage: Arc<dyn ObjectStorage>,

    /// Trial watermarking.
    pub watermark: Arc<dyn Watermarker>,

    /// Stripe client for payments (optional).
    pub stripe: Option<Arc<StripeClient>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new<S: Store + 'static>(
        store: Arc<S>,
        config: ServiceConfig,
        collaborators: Collaborators,
    ) -> Self {
        let ledger = Ledger::new(store.clone()).with_default_credits(config.default_credits);

        if collaborators.stripe.is_none() {
            tracing::warn!("Stripe not configured - checkout will not be available");
        }
        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("Stripe webhook secret not configured - webhooks will be rejected");
        }

        Self {
            store,
            ledger,
            packs: config.credit_packs.clone(),
            config,
            identity: collaborators.identity,
            model: collaborators.model,
            storage: collaborators.storage,
            watermark: collaborators.watermark,
            stripe: collaborators.stripe,
        }
    }

    /// Check if Stripe is configured.
    #[must_use]
    pub fn has_stripe(&self) -> bool {
        self.stripe.is_some()
    }
}
