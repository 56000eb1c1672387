//! Error types for jarvas storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The transaction kept conflicting with concurrent writers.
    #[error("transaction aborted after {attempts} conflicting attempts")]
    Conflict {
        /// Number of attempts made.
        attempts: u32,
    },

    /// Insufficient credits for deduction. Aborts the enclosing transaction.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },
}
