//! Service configuration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use jarvas_core::{default_packs, CreditPack};
use serde::Deserialize;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/jarvas").
    pub data_dir: String,

    /// Firebase project id; issuer and audience of ID tokens, and the Google
    /// Cloud project used for inference.
    pub firebase_project_id: Option<String>,

    /// Service-account email used to mint Google access tokens.
    pub firebase_client_email: Option<String>,

    /// Service-account PEM private key (`\n` escapes are expanded).
    pub firebase_private_key: Option<String>,

    /// Cloud Storage bucket for enhanced images.
    pub storage_bucket: Option<String>,

    /// Vertex AI location (default: "global").
    pub vertex_location: String,

    /// Vertex AI image model (default: "gemini-3-pro-image-preview").
    pub vertex_image_model: String,

    /// Stripe secret API key (optional).
    pub stripe_secret_key: Option<String>,

    /// Stripe webhook signing secret (optional).
    pub stripe_webhook_secret: Option<String>,

    /// Accepted webhook timestamp skew in seconds (default: 300).
    pub stripe_webhook_tolerance_seconds: u64,

    /// Frontend URL for checkout redirects.
    pub frontend_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes. Uploads arrive base64-encoded.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Balance given to accounts on first initialisation.
    pub default_credits: i64,

    /// Credits charged per authenticated enhancement.
    pub enhance_cost: i64,

    /// Credit packs offered at checkout, each tied to a Stripe price id.
    pub credit_packs: Vec<CreditPack>,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    secret_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let (stripe_secret_key, stripe_webhook_secret) = load_stripe_secrets();

        Self {
            listen_addr: env_or("LISTEN_ADDR", defaults.listen_addr),
            data_dir: env_or("DATA_DIR", defaults.data_dir),
            firebase_project_id: env_opt("FIREBASE_PROJECT_ID"),
            firebase_client_email: env_opt("FIREBASE_CLIENT_EMAIL"),
            firebase_private_key: env_opt("FIREBASE_PRIVATE_KEY")
                .map(|key| key.replace("\\n", "\n")),
            storage_bucket: env_opt("STORAGE_BUCKET"),
            vertex_location: env_or("VERTEX_LOCATION", defaults.vertex_location),
            vertex_image_model: env_or("VERTEX_IMAGE_MODEL", defaults.vertex_image_model),
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_webhook_tolerance_seconds: env_parse(
                "STRIPE_WEBHOOK_TOLERANCE_SECONDS",
                defaults.stripe_webhook_tolerance_seconds,
            ),
            frontend_url: env_or("FRONTEND_URL", defaults.frontend_url),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES", defaults.max_body_bytes),
            request_timeout_seconds: env_parse(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
            default_credits: env_parse("DEFAULT_CREDITS", defaults.default_credits),
            enhance_cost: env_parse("ENHANCE_COST", defaults.enhance_cost),
            credit_packs: resolve_credit_packs(env_opt("CREDIT_PACKS").as_deref(), |credits| {
                env_opt(&format!("STRIPE_PRICE_{credits}"))
            }),
        }
    }

    /// Webhook timestamp tolerance.
    #[must_use]
    pub fn webhook_tolerance(&self) -> Duration {
        Duration::from_secs(self.stripe_webhook_tolerance_seconds)
    }

    /// Checkout success redirect.
    #[must_use]
    pub fn checkout_success_url(&self) -> String {
        format!("{}/app?success=1", self.frontend_url.trim_end_matches('/'))
    }

    /// Checkout cancel redirect.
    #[must_use]
    pub fn checkout_cancel_url(&self) -> String {
        format!(
            "{}/app/credits?canceled=1",
            self.frontend_url.trim_end_matches('/')
        )
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/jarvas".into(),
            firebase_project_id: None,
            firebase_client_email: None,
            firebase_private_key: None,
            storage_bucket: None,
            vertex_location: "global".into(),
            vertex_image_model: "gemini-3-pro-image-preview".into(),
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_webhook_tolerance_seconds: 300,
            frontend_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 16 * 1024 * 1024,
            request_timeout_seconds: 120,
            default_credits: jarvas_core::DEFAULT_SIGNUP_CREDITS,
            enhance_cost: 1,
            credit_packs: default_packs(),
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(name: &str, default: String) -> String {
    env_opt(name).unwrap_or(default)
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    match env_opt(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(name, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

/// Build the pack catalogue.
///
/// A JSON array in `CREDIT_PACKS` replaces the default catalogue outright.
/// Otherwise the default packs are kept and each one's price id can be set
/// with `STRIPE_PRICE_<credits>`.
fn resolve_credit_packs(
    packs_json: Option<&str>,
    price_override: impl Fn(i64) -> Option<String>,
) -> Vec<CreditPack> {
    if let Some(raw) = packs_json {
        match serde_json::from_str::<Vec<CreditPack>>(raw) {
            Ok(packs) if !packs.is_empty() && packs.iter().all(|p| p.credits > 0) => {
                return packs;
            }
            Ok(_) => {
                tracing::warn!("CREDIT_PACKS must list packs with positive credits, using defaults");
            }
            Err(e) => tracing::warn!(error = %e, "Invalid CREDIT_PACKS, using defaults"),
        }
    }

    default_packs()
        .into_iter()
        .map(|mut pack| {
            if let Some(price_id) = price_override(pack.credits) {
                pack.price_id = price_id;
            }
            pack
        })
        .collect()
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [".secrets/stripe.json", "../.secrets/stripe.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (Some(secrets.secret_key), secrets.webhook_secret);
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        env_opt("STRIPE_SECRET_KEY"),
        env_opt("STRIPE_WEBHOOK_SECRET"),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.default_credits, 1);
        assert_eq!(config.enhance_cost, 1);
        assert_eq!(config.webhook_tolerance(), Duration::from_secs(300));
        assert_eq!(config.vertex_location, "global");
    }

    #[test]
    fn checkout_redirects() {
        let config = ServiceConfig {
            frontend_url: "https://jarvas.app/".into(),
            ..ServiceConfig::default()
        };
        assert_eq!(config.checkout_success_url(), "https://jarvas.app/app?success=1");
        assert_eq!(
            config.checkout_cancel_url(),
            "https://jarvas.app/app/credits?canceled=1"
        );
    }

    #[test]
    fn secrets_file_parses() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stripe.json");
        std::fs::write(&path, r#"{"secret_key":"sk_test_1","webhook_secret":"whsec_1"}"#)
            .unwrap();

        let secrets: StripeSecrets = load_secrets_file(path.to_str().unwrap()).unwrap();
        assert_eq!(secrets.secret_key, "sk_test_1");
        assert_eq!(secrets.webhook_secret.as_deref(), Some("whsec_1"));
    }

    #[test]
    fn missing_secrets_file_is_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stripe.json");

        let err = load_secrets_file::<StripeSecrets>(path.to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn packs_default_without_overrides() {
        assert_eq!(resolve_credit_packs(None, |_| None), default_packs());
    }

    #[test]
    fn pack_price_ids_can_be_overridden_individually() {
        let packs = resolve_credit_packs(None, |credits| {
            (credits == 60).then(|| "price_1NxLive60".to_string())
        });

        assert_eq!(packs.len(), 3);
        assert_eq!(packs[0].price_id, "price_25");
        assert_eq!(packs[1].price_id, "price_1NxLive60");
        assert_eq!(packs[1].credits, 60);
    }

    #[test]
    fn packs_json_replaces_catalogue() {
        let json = r#"[{"id":"starter","label":"Starter","credits":10,"priceId":"price_1Nstarter","price":"4.99 €"}]"#;
        let packs = resolve_credit_packs(Some(json), |_| Some("ignored".into()));

        assert_eq!(packs.len(), 1);
        assert_eq!(packs[0].price_id, "price_1Nstarter");
        assert_eq!(packs[0].credits, 10);
    }

    #[test]
    fn invalid_packs_json_falls_back_to_defaults() {
        for json in [
            "not json",
            "[]",
            r#"[{"id":"x","label":"x","credits":0,"priceId":"p","price":"0"}]"#,
        ] {
            assert_eq!(
                resolve_credit_packs(Some(json), |_| None),
                default_packs(),
                "{json}"
            );
        }
    }
}
