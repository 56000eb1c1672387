//! Generation history and fulfillment records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GenerationId, UserId};

/// Number of history entries returned to the client.
pub const HISTORY_PAGE_SIZE: usize = 50;

/// One successful enhancement performed by an authenticated account.
///
/// Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    /// Generation id (also the request id).
    pub id: GenerationId,
    /// Owning account.
    #[serde(rename = "uid")]
    pub user_id: UserId,
    /// Public URL of the stored output.
    pub image_url: String,
    /// Category chosen by the user.
    pub sector: String,
    /// Style hint chosen by the user.
    pub style: String,
    /// When the generation was recorded.
    pub created_at: DateTime<Utc>,
}

/// A payment-processor event that has already been applied to the ledger.
///
/// Written in the same transaction as the balance update it guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedEvent {
    /// The processor's event id.
    pub event_id: String,
    /// Account that was credited.
    #[serde(rename = "uid")]
    pub user_id: UserId,
    /// Credits applied.
    pub credits: i64,
    /// When the event was applied.
    pub processed_at: DateTime<Utc>,
}

impl ProcessedEvent {
    /// Record that `event_id` credited `credits` to `user_id` now.
    #[must_use]
    pub fn new(event_id: impl Into<String>, user_id: UserId, credits: i64) -> Self {
        Self {
            event_id: event_id.into(),
            user_id,
            credits,
            processed_at: Utc::now(),
        }
    }
}
