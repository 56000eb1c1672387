//! The transaction capability the ledger is built on.
//!
//! A `Transactor` runs a closure against a `Transaction` handle and commits its
//! buffered writes atomically. When the commit loses a race with a concurrent
//! writer the closure is run again from scratch against fresh reads, up to a
//! bounded number of attempts. Errors returned by the closure abort the
//! transaction without retrying and without writing anything.

use jarvas_core::{Account, ProcessedEvent, UserId};

use crate::error::{Result, StoreError};

/// Default number of attempts before giving up on a conflicting transaction.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Read/write access to documents inside one transaction attempt.
///
/// Reads observe the committed state at the time of the read plus this
/// transaction's own writes. Writes become visible to others only on commit.
pub trait Transaction {
    /// Read an account document.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&mut self, user_id: &UserId) -> Result<Option<Account>>;

    /// Buffer an account write (create or replace).
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or buffered.
    fn put_account(&mut self, account: &Account) -> Result<()>;

    /// Read a processed-event record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_processed_event(&mut self, event_id: &str) -> Result<Option<ProcessedEvent>>;

    /// Buffer a processed-event write.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or buffered.
    fn put_processed_event(&mut self, event: &ProcessedEvent) -> Result<()>;
}

/// Closure type accepted by [`Transactor::run_transaction_dyn`].
pub type TransactionBody<'a> = dyn FnMut(&mut dyn Transaction) -> Result<()> + 'a;

/// A storage backend able to run optimistic read-modify-write transactions.
pub trait Transactor: Send + Sync {
    /// Run `body` until it commits, it fails, or attempts are exhausted.
    ///
    /// Prefer [`TransactorExt::run_transaction`], which also carries a value
    /// out of the closure.
    ///
    /// # Errors
    ///
    /// Returns the closure's error unchanged, or `StoreError::Conflict` when
    /// every attempt lost to a concurrent writer.
    fn run_transaction_dyn(&self, body: &mut TransactionBody<'_>) -> Result<()>;
}

/// Typed convenience wrapper over [`Transactor`].
pub trait TransactorExt: Transactor {
    /// Run `body` transactionally and return the value of the committed attempt.
    ///
    /// # Errors
    ///
    /// See [`Transactor::run_transaction_dyn`].
    fn run_transaction<T, F>(&self, mut body: F) -> Result<T>
    where
        F: FnMut(&mut dyn Transaction) -> Result<T>,
    {
        let mut output = None;
        self.run_transaction_dyn(&mut |tx: &mut dyn Transaction| {
            output = Some(body(tx)?);
            Ok(())
        })?;
        output.ok_or_else(|| StoreError::Database("transaction committed without output".into()))
    }
}

impl<S: Transactor + ?Sized> TransactorExt for S {}
