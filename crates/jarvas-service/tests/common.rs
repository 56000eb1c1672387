//! Common test utilities for jarvas integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use jarvas_core::{Generation, Profile, UserId};
use jarvas_service::stripe::signature_header;
use jarvas_service::{
    create_router, AppState, AuthError, BandWatermark, Collaborators, EnhanceJob,
    IdentityVerifier, ImageModel, InlineImage, ObjectStorage, ServiceConfig, StripeClient,
    UpstreamError, VerifiedIdentity,
};
use jarvas_store::{
    Ledger, MemoryStore, Store, StoreError, TransactionBody, Transactor,
};

/// Webhook signing secret configured in the harness.
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Accepts `test-token:<uid>` bearer tokens.
pub struct FakeVerifier;

#[async_trait]
impl IdentityVerifier for FakeVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let uid = token
            .strip_prefix("test-token:")
            .ok_or(AuthError::InvalidToken)?;
        let user_id = UserId::new(uid).map_err(|_| AuthError::InvalidToken)?;
        Ok(VerifiedIdentity {
            profile: Profile {
                email: format!("{uid}@example.com"),
                display_name: format!("User {uid}"),
                photo_url: String::new(),
            },
            user_id,
        })
    }
}

/// Returns a solid-colour PNG (or JPEG), optionally after a delay, or fails
/// on demand.
#[derive(Default)]
pub struct FakeModel {
    pub fail: AtomicBool,
    pub jpeg: AtomicBool,
    pub delay_ms: AtomicU64,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageModel for FakeModel {
    async fn enhance(&self, _job: &EnhanceJob) -> Result<InlineImage, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::NoImage);
        }
        if self.jpeg.load(Ordering::SeqCst) {
            return Ok(InlineImage {
                mime_type: "image/jpeg".into(),
                data: solid_jpeg(32, 32),
            });
        }
        Ok(InlineImage {
            mime_type: "image/png".into(),
            data: solid_png(32, 32),
        })
    }
}

/// A `MemoryStore` whose transactions can be made to fail.
#[derive(Default)]
pub struct SwitchableStore {
    pub inner: MemoryStore,
    pub fail_transactions: AtomicBool,
}

impl Transactor for SwitchableStore {
    fn run_transaction_dyn(&self, body: &mut TransactionBody<'_>) -> jarvas_store::Result<()> {
        if self.fail_transactions.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".into()));
        }
        self.inner.run_transaction_dyn(body)
    }
}

impl Store for SwitchableStore {
    fn put_generation(&self, generation: &Generation) -> jarvas_store::Result<()> {
        self.inner.put_generation(generation)
    }

    fn list_generations(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> jarvas_store::Result<Vec<Generation>> {
        self.inner.list_generations(user_id, limit)
    }
}

/// Records uploads in memory, or fails on demand.
#[derive(Default)]
pub struct FakeStorage {
    pub fail: AtomicBool,
    pub objects: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl FakeStorage {
    pub fn paths(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _, _)| path.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_public(
        &self,
        path: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<String, UpstreamError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status {
                service: "gcs",
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .push((path.to_string(), content_type.to_string(), data));
        Ok(format!("https://storage.test/{path}"))
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Ledger over the same store the server uses.
    pub ledger: Ledger,
    /// The backing store.
    pub store: Arc<SwitchableStore>,
    /// Fake image model.
    pub model: Arc<FakeModel>,
    /// Fake object storage.
    pub storage: Arc<FakeStorage>,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
}

impl TestHarness {
    /// Create a new test harness with a fresh in-memory store and no Stripe client.
    pub fn new() -> Self {
        Self::build(test_config(), None)
    }

    /// Create a harness whose Stripe client talks to `stripe_url`.
    pub fn with_stripe(stripe_url: &str) -> Self {
        Self::with_stripe_and_config(stripe_url, test_config())
    }

    /// Create a harness with a Stripe client and a custom configuration.
    pub fn with_stripe_and_config(stripe_url: &str, config: ServiceConfig) -> Self {
        let stripe = StripeClient::new("sk_test_xxx")
            .expect("Failed to create Stripe client")
            .with_base_url(stripe_url);
        Self::build(config, Some(Arc::new(stripe)))
    }

    /// Create a harness with a custom configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        Self::build(config, None)
    }

    fn build(config: ServiceConfig, stripe: Option<Arc<StripeClient>>) -> Self {
        let store = Arc::new(SwitchableStore::default());
        let model = Arc::new(FakeModel::default());
        let storage = Arc::new(FakeStorage::default());

        let collaborators = Collaborators {
            identity: Arc::new(FakeVerifier),
            model: model.clone(),
            storage: storage.clone(),
            watermark: Arc::new(BandWatermark::default()),
            stripe,
        };

        let state = AppState::new(store.clone(), config, collaborators);
        let ledger = state.ledger.clone();
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            ledger,
            store,
            model,
            storage,
            test_user_id: UserId::new("user-test-1").expect("valid user id"),
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.test_user_id)
    }

    /// Authorization header for an arbitrary user.
    pub fn auth_header_for(user_id: &str) -> String {
        format!("Bearer test-token:{user_id}")
    }

    /// Set the test user's balance directly through the ledger.
    pub fn fund(&self, credits: i64) {
        self.ledger
            .credit(&self.test_user_id, credits)
            .expect("Failed to fund test account");
    }

    /// The test user's current balance.
    pub fn balance(&self) -> i64 {
        self.ledger
            .get_balance(&self.test_user_id)
            .expect("Failed to read balance")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration used by the harness.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        frontend_url: "http://localhost:3000".into(),
        ..ServiceConfig::default()
    }
}

/// A solid-colour PNG.
pub fn solid_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("Failed to encode PNG");
    out
}

/// A solid-colour JPEG.
pub fn solid_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
        .expect("Failed to encode JPEG");
    out
}

/// `solid_png` as a data URL.
pub fn png_data_url() -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(solid_png(8, 8)))
}

/// A `checkout.session.completed` event body.
pub fn checkout_completed_event(event_id: &str, uid: &str, credits: &str) -> String {
    serde_json::json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created": 1_700_000_000,
        "data": {
            "object": {
                "id": format!("cs_{event_id}"),
                "object": "checkout.session",
                "mode": "payment",
                "payment_status": "paid",
                "metadata": { "uid": uid, "credits": credits }
            }
        }
    })
    .to_string()
}

/// A valid signature header for `payload`, timestamped now.
pub fn sign(payload: &str) -> String {
    signature_header(
        WEBHOOK_SECRET,
        chrono::Utc::now().timestamp(),
        payload.as_bytes(),
    )
}
