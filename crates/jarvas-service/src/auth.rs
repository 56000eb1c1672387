//! Authentication: identity-token verification and request extractors.
//!
//! This module provides:
//! - `IdentityVerifier` - the seam used to turn a bearer token into a user
//! - `FirebaseVerifier` - RS256 verification of Firebase ID tokens
//! - `AuthUser` - extractor for routes that require a signed-in user
//! - `MaybeAuthUser` - extractor for routes that also serve anonymous trials

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use jarvas_core::{Profile, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// How long to cache JWKS keys before refreshing.
const JWKS_CACHE_DURATION: Duration = Duration::from_secs(3600);

/// Timeout for JWKS fetch requests.
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Google's public keys for Firebase ID tokens, in JWK form.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Why a token was not accepted.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token is malformed, expired, or signed by an unknown key.
    #[error("invalid token")]
    InvalidToken,

    /// The signing keys could not be retrieved.
    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(String),
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Stable user id (token subject).
    pub user_id: UserId,
    /// Profile claims carried by the token.
    pub profile: Profile,
}

/// Turns a bearer token into a verified identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token` and return the identity it asserts.
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}

/// Firebase ID token claims.
#[derive(Debug, Clone, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Single JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kty: String,
    kid: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

/// JWKS response structure.
#[derive(Debug, Clone, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

struct JwksCache {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

impl JwksCache {
    fn is_fresh(&self) -> bool {
        self.fetched_at
            .is_some_and(|at| at.elapsed() < JWKS_CACHE_DURATION)
    }
}

/// Verifies Firebase ID tokens against Google's published signing keys.
///
/// Keys are cached per instance and refreshed hourly, or sooner when a token
/// names a key id the cache does not know.
pub struct FirebaseVerifier {
    client: reqwest::Client,
    project_id: String,
    jwks_url: String,
    cache: RwLock<JwksCache>,
}

impl FirebaseVerifier {
    /// Create a verifier for tokens issued to `project_id`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyFetch` if the HTTP client cannot be built.
    pub fn new(project_id: impl Into<String>) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(JWKS_FETCH_TIMEOUT)
            .build()
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        Ok(Self {
            client,
            project_id: project_id.into(),
            jwks_url: FIREBASE_JWKS_URL.to_string(),
            cache: RwLock::new(JwksCache {
                keys: HashMap::new(),
                fetched_at: None,
            }),
        })
    }

    /// Fetch keys from a different JWKS endpoint.
    #[must_use]
    pub fn with_jwks_url(mut self, jwks_url: impl Into<String>) -> Self {
        self.jwks_url = jwks_url.into();
        self
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.cache.read().await;
            if cache.is_fresh() {
                if let Some(key) = cache.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        let jwks = self.fetch_jwks().await?;

        let mut cache = self.cache.write().await;
        cache.keys = jwks
            .keys
            .iter()
            .filter_map(|jwk| Some((jwk.kid.clone()?, jwk_to_decoding_key(jwk)?)))
            .collect();
        cache.fetched_at = Some(Instant::now());

        cache.keys.get(kid).cloned().ok_or(AuthError::InvalidToken)
    }

    async fn fetch_jwks(&self) -> Result<Jwks, AuthError> {
        tracing::debug!(url = %self.jwks_url, "Fetching JWKS");

        let response = self.client.get(&self.jwks_url).send().await.map_err(|e| {
            tracing::error!(error = %e, url = %self.jwks_url, "Failed to fetch JWKS");
            AuthError::KeyFetch(e.to_string())
        })?;

        if !response.status().is_success() {
            tracing::error!(
                status = %response.status(),
                url = %self.jwks_url,
                "JWKS fetch returned non-success status"
            );
            return Err(AuthError::KeyFetch(format!("HTTP {}", response.status())));
        }

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        tracing::info!(keys_count = jwks.keys.len(), "JWKS fetched successfully");
        Ok(jwks)
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode JWT header");
            AuthError::InvalidToken
        })?;
        let kid = header.kid.ok_or(AuthError::InvalidToken)?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!(
            "https://securetoken.google.com/{}",
            self.project_id
        )]);

        let claims = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "JWT validation failed");
                AuthError::InvalidToken
            })?
            .claims;

        let user_id = UserId::new(claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(VerifiedIdentity {
            user_id,
            profile: Profile {
                email: claims.email.unwrap_or_default(),
                display_name: claims.name.unwrap_or_default(),
                photo_url: claims.picture.unwrap_or_default(),
            },
        })
    }
}

fn jwk_to_decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
    if jwk.kty != "RSA" {
        tracing::debug!(kty = %jwk.kty, "Skipping non-RSA JWK");
        return None;
    }
    DecodingKey::from_rsa_components(jwk.n.as_ref()?, jwk.e.as_ref()?).ok()
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// A signed-in user. Rejects the request with 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
    /// Profile claims from the token.
    pub profile: Profile,
}

impl From<VerifiedIdentity> for AuthUser {
    fn from(identity: VerifiedIdentity) -> Self {
        Self {
            user_id: identity.user_id,
            profile: identity.profile,
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;

            match state.identity.verify(token).await {
                Ok(identity) => Ok(identity.into()),
                Err(AuthError::InvalidToken) => Err(ApiError::Unauthorized),
                Err(e @ AuthError::KeyFetch(_)) => Err(ApiError::Upstream(e.to_string())),
            }
        })
    }
}

/// The caller if a valid token was presented, `None` otherwise.
///
/// An invalid or unverifiable token degrades to anonymous instead of failing
/// the request.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let Some(token) = bearer_token(parts) else {
                return Ok(Self(None));
            };

            match state.identity.verify(token).await {
                Ok(identity) => Ok(Self(Some(identity.into()))),
                Err(e) => {
                    tracing::debug!(error = %e, "Token rejected, treating caller as anonymous");
                    Ok(Self(None))
                }
            }
        })
    }
}
