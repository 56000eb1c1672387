//! Account types for jarvas.
//!
//! An account is created lazily the first time an authenticated user is seen and
//! is only ever mutated through the ledger afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Credits granted to a freshly created account.
pub const DEFAULT_SIGNUP_CREDITS: i64 = 1;

/// Profile fields copied from the identity token on first sight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Email address, empty when the provider does not share it.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Avatar URL.
    pub photo_url: String,
}

/// The persisted per-user record holding the credit balance.
///
/// Serialized with the document field names used by the web client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// The identity provider's user id.
    #[serde(rename = "uid")]
    pub user_id: UserId,

    /// Current credit balance. Never negative.
    pub credits: i64,

    /// Email address.
    #[serde(default)]
    pub email: String,

    /// Display name.
    #[serde(default)]
    pub display_name: String,

    /// Avatar URL.
    #[serde(default, rename = "photoURL")]
    pub photo_url: String,

    /// When the account was first seen.
    pub created_at: DateTime<Utc>,

    /// When the balance last changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create an account with the given opening balance and profile.
    #[must_use]
    pub fn new(user_id: UserId, credits: i64, profile: Profile) -> Self {
        Self {
            user_id,
            credits,
            email: profile.email,
            display_name: profile.display_name,
            photo_url: profile.photo_url,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Create an account with no profile data, as done when a payment arrives
    /// for a user that was never initialised.
    #[must_use]
    pub fn bare(user_id: UserId) -> Self {
        Self::new(user_id, 0, Profile::default())
    }

    /// Check if the account can cover `cost`.
    #[must_use]
    pub fn has_sufficient_credits(&self, cost: i64) -> bool {
        self.credits >= cost
    }
}
