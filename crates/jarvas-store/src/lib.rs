//! Storage layer and credit ledger for jarvas.
//!
//! This crate provides persistence for accounts, processed payment events and
//! generation history, plus the [`Ledger`] that owns every balance mutation.
//!
//! # Architecture
//!
//! Backends implement [`Transactor`], an optimistic read-modify-write
//! capability that retries on write conflict, and [`Store`], which adds the
//! non-transactional generation history. Two backends are provided:
//!
//! - [`MemoryStore`]: versioned in-process documents, used by tests and local runs
//! - `RocksStore` (feature `rocksdb-backend`): `RocksDB` optimistic transactions
//!   with column families `accounts`, `generations`, `processed_events`
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use jarvas_core::UserId;
//! use jarvas_store::{Ledger, MemoryStore};
//!
//! let ledger = Ledger::new(Arc::new(MemoryStore::new()));
//! let user_id = UserId::new("u1").unwrap();
//!
//! ledger.credit(&user_id, 5).unwrap();
//! assert_eq!(ledger.debit(&user_id, 2).unwrap(), 3);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod ledger;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;
pub mod transaction;

pub use error::{Result, StoreError};
pub use ledger::{CreditOutcome, Ledger, LedgerError, Reservation, ReservationGuard};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;
pub use transaction::{Transaction, TransactionBody, Transactor, TransactorExt, DEFAULT_MAX_ATTEMPTS};

use jarvas_core::{Generation, UserId};

/// The storage trait: transactional documents plus generation history.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Transactor {
    /// Record a completed generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_generation(&self, generation: &Generation) -> Result<()>;

    /// List a user's generations, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_generations(&self, user_id: &UserId, limit: usize) -> Result<Vec<Generation>>;
}
