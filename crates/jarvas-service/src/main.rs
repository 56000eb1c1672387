//! Jarvas Service - HTTP API for photo enhancement and credits.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jarvas_service::{
    create_router, AccessTokenSource, AppState, BandWatermark, Collaborators, FirebaseVerifier,
    GcsStorage, ServiceAccountTokenSource, ServiceConfig, StripeClient, VertexImageModel,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,jarvas=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Jarvas Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        project_id = ?config.firebase_project_id,
        vertex_model = %config.vertex_image_model,
        stripe_configured = config.stripe_secret_key.is_some(),
        webhook_configured = config.stripe_webhook_secret.is_some(),
        credit_packs = config.credit_packs.len(),
        "Service configuration loaded"
    );

    let collaborators = build_collaborators(&config)?;

    #[cfg(feature = "rocksdb-backend")]
    let store = {
        tracing::info!(path = %config.data_dir, "Opening RocksDB store");
        Arc::new(jarvas_store::RocksStore::open(&config.data_dir)?)
    };
    #[cfg(not(feature = "rocksdb-backend"))]
    let store = {
        tracing::warn!("Built without rocksdb-backend - state is kept in memory only");
        Arc::new(jarvas_store::MemoryStore::new())
    };

    let state = AppState::new(store, config.clone(), collaborators);

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn required<'a>(value: Option<&'a String>, name: &str) -> Result<&'a str, String> {
    value
        .map(String::as_str)
        .ok_or_else(|| format!("{name} must be set"))
}

fn build_collaborators(config: &ServiceConfig) -> Result<Collaborators, Box<dyn std::error::Error>> {
    let project_id = required(config.firebase_project_id.as_ref(), "FIREBASE_PROJECT_ID")?;
    let client_email = required(config.firebase_client_email.as_ref(), "FIREBASE_CLIENT_EMAIL")?;
    let private_key = required(config.firebase_private_key.as_ref(), "FIREBASE_PRIVATE_KEY")?;

    let tokens: Arc<dyn AccessTokenSource> =
        Arc::new(ServiceAccountTokenSource::new(client_email, private_key)?);

    let bucket = config
        .storage_bucket
        .clone()
        .unwrap_or_else(|| format!("{project_id}.appspot.com"));
    tracing::info!(bucket = %bucket, "Using Cloud Storage bucket");

    let stripe = match config.stripe_secret_key.as_deref().map(StripeClient::new) {
        Some(Ok(client)) => {
            tracing::info!("Stripe integration enabled");
            Some(Arc::new(client))
        }
        Some(Err(e)) => {
            tracing::error!(error = %e, "Failed to create Stripe client");
            None
        }
        None => None,
    };

    Ok(Collaborators {
        identity: Arc::new(FirebaseVerifier::new(project_id)?),
        model: Arc::new(VertexImageModel::new(
            tokens.clone(),
            project_id,
            config.vertex_location.clone(),
            config.vertex_image_model.clone(),
        )?),
        storage: Arc::new(GcsStorage::new(tokens, bucket)?),
        watermark: Arc::new(BandWatermark::default()),
        stripe,
    })
}
