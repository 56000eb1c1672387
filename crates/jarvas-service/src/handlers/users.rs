//! Account initialisation, balance and history handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use jarvas_core::{Generation, HISTORY_PAGE_SIZE};
use jarvas_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    /// Current balance.
    pub credits: i64,
}

/// Generation history response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Newest first.
    pub generations: Vec<Generation>,
}

/// Create the caller's account on first sign-in.
///
/// New accounts start with the configured default balance; existing accounts
/// are returned unchanged.
pub async fn init_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<CreditsResponse>, ApiError> {
    let account = state.ledger.ensure_account(&user.user_id, &user.profile)?;
    Ok(Json(CreditsResponse {
        credits: account.credits,
    }))
}

/// Get the caller's balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<CreditsResponse>, ApiError> {
    let credits = state.ledger.get_balance(&user.user_id)?;
    Ok(Json(CreditsResponse { credits }))
}

/// List the caller's most recent generations.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<HistoryResponse>, ApiError> {
    let generations = state
        .store
        .list_generations(&user.user_id, HISTORY_PAGE_SIZE)?;
    Ok(Json(HistoryResponse { generations }))
}
