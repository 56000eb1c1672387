//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Account documents, keyed by `user_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Generation history, keyed by `user_prefix || generation_id` (ULID).
    pub const GENERATIONS: &str = "generations";

    /// Payment events already applied to the ledger, keyed by `event_id`.
    pub const PROCESSED_EVENTS: &str = "processed_events";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::ACCOUNTS, cf::GENERATIONS, cf::PROCESSED_EVENTS]
}
