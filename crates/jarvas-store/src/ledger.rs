//! The credit ledger.
//!
//! Owns every mutation of `Account::credits`. Each operation is a single
//! read-modify-write transaction on one account document, so concurrent debits
//! and credits on the same account are serialized by the storage layer and the
//! balance can never be driven below zero.

use std::sync::Arc;

use chrono::Utc;
use jarvas_core::{Account, ProcessedEvent, Profile, UserId, DEFAULT_SIGNUP_CREDITS};

use crate::error::StoreError;
use crate::transaction::{Transaction, Transactor, TransactorExt};

/// Errors returned by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The account cannot cover the requested cost.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Balance at the time of the check.
        balance: i64,
        /// Amount requested.
        required: i64,
    },

    /// A negative cost or amount was supplied.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// The storage layer failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientCredits { balance, required } => {
                Self::InsufficientCredits { balance, required }
            }
            other => Self::Store(other),
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Outcome of crediting on behalf of a payment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Credits were applied; carries the new balance.
    Applied {
        /// Balance after the credit.
        balance: i64,
    },
    /// The event had already been applied; nothing changed.
    Duplicate,
}

/// Credits taken up front for a piece of paid work.
///
/// Hand it back to [`Ledger::refund`] if the work fails.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a reservation must be kept or refunded"]
pub struct Reservation {
    /// Account the credits were taken from.
    pub user_id: UserId,
    /// Credits taken.
    pub amount: i64,
    /// Balance right after the reservation.
    pub balance_after: i64,
}

/// A reservation that is refunded when dropped unless committed.
///
/// Holding one across an `.await` makes the refund survive cancellation: if
/// the future is dropped (request timeout, client disconnect) the credits go
/// back to the account.
#[must_use = "dropping the guard refunds the reservation"]
pub struct ReservationGuard {
    ledger: Ledger,
    balance_after: i64,
    reservation: Option<Reservation>,
}

impl ReservationGuard {
    /// Balance right after the reservation.
    #[must_use]
    pub fn balance_after(&self) -> i64 {
        self.balance_after
    }

    /// Keep the credits; the paid work succeeded. Returns the balance after
    /// the reservation.
    pub fn commit(mut self) -> i64 {
        self.reservation = None;
        self.balance_after
    }

    /// Return the credits now; returns the new balance.
    ///
    /// # Errors
    ///
    /// Same as [`Ledger::refund`].
    pub fn refund(mut self) -> Result<i64> {
        match self.reservation.take() {
            Some(reservation) => self.ledger.refund(reservation),
            None => Ok(self.balance_after),
        }
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        let Some(reservation) = self.reservation.take() else {
            return;
        };
        tracing::warn!(
            user_id = %reservation.user_id,
            amount = reservation.amount,
            "Reservation abandoned, refunding"
        );
        if let Err(e) = self.ledger.refund(reservation) {
            tracing::error!(error = %e, "Failed to refund abandoned reservation");
        }
    }
}

/// The credit ledger.
#[derive(Clone)]
pub struct Ledger {
    transactor: Arc<dyn Transactor>,
    default_credits: i64,
}

impl Ledger {
    /// Create a ledger over the given transaction capability.
    #[must_use]
    pub fn new(transactor: Arc<dyn Transactor>) -> Self {
        Self {
            transactor,
            default_credits: DEFAULT_SIGNUP_CREDITS,
        }
    }

    /// Override the balance given to newly initialised accounts.
    #[must_use]
    pub fn with_default_credits(mut self, default_credits: i64) -> Self {
        self.default_credits = default_credits.max(0);
        self
    }

    /// Balance given to newly initialised accounts.
    #[must_use]
    pub fn default_credits(&self) -> i64 {
        self.default_credits
    }

    /// Current balance; 0 when the account does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the read fails.
    pub fn get_balance(&self, user_id: &UserId) -> Result<i64> {
        let balance = self
            .transactor
            .run_transaction(|tx| current_balance(tx, user_id))?;
        Ok(balance)
    }

    /// Whether the balance covers `cost`.
    ///
    /// This is a point-in-time check; it does not hold the credits.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the read fails.
    pub fn has_sufficient(&self, user_id: &UserId, cost: i64) -> Result<bool> {
        Ok(self.get_balance(user_id)? >= cost)
    }

    /// Atomically take `cost` credits; returns the new balance.
    ///
    /// # Errors
    ///
    /// - `InsufficientCredits` if the balance is below `cost` (nothing written).
    /// - `InvalidAmount` if `cost` is negative.
    /// - `Store` on storage failure or exhausted conflict retries.
    pub fn debit(&self, user_id: &UserId, cost: i64) -> Result<i64> {
        if cost < 0 {
            return Err(LedgerError::InvalidAmount(cost));
        }

        let balance = self.transactor.run_transaction(|tx| {
            let Some(mut account) = tx.get_account(user_id)? else {
                if cost == 0 {
                    return Ok(0);
                }
                return Err(StoreError::InsufficientCredits {
                    balance: 0,
                    required: cost,
                });
            };

            if account.credits < cost {
                return Err(StoreError::InsufficientCredits {
                    balance: account.credits,
                    required: cost,
                });
            }
            if cost == 0 {
                return Ok(account.credits);
            }

            account.credits -= cost;
            account.updated_at = Some(Utc::now());
            tx.put_account(&account)?;
            Ok(account.credits)
        })?;

        tracing::debug!(user_id = %user_id, cost, balance, "Credits debited");
        Ok(balance)
    }

    /// Atomically add `amount` credits, creating the account if needed;
    /// returns the new balance.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is negative.
    /// - `Store` on storage failure or exhausted conflict retries.
    pub fn credit(&self, user_id: &UserId, amount: i64) -> Result<i64> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let balance = self
            .transactor
            .run_transaction(|tx| apply_credit(tx, user_id, amount))?;

        tracing::debug!(user_id = %user_id, amount, balance, "Credits added");
        Ok(balance)
    }

    /// Credit on behalf of a payment event, at most once per `event_id`.
    ///
    /// The dedupe record and the balance update commit together, so a
    /// redelivered event can never be applied twice.
    ///
    /// # Errors
    ///
    /// Same as [`Ledger::credit`].
    pub fn credit_for_event(
        &self,
        user_id: &UserId,
        amount: i64,
        event_id: &str,
    ) -> Result<CreditOutcome> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let outcome = self.transactor.run_transaction(|tx| {
            if tx.get_processed_event(event_id)?.is_some() {
                return Ok(CreditOutcome::Duplicate);
            }

            let balance = apply_credit(tx, user_id, amount)?;
            tx.put_processed_event(&ProcessedEvent::new(event_id, user_id.clone(), amount))?;
            Ok(CreditOutcome::Applied { balance })
        })?;

        match outcome {
            CreditOutcome::Applied { balance } => tracing::info!(
                user_id = %user_id,
                event_id,
                amount,
                balance,
                "Credits added for payment event"
            ),
            CreditOutcome::Duplicate => tracing::info!(
                user_id = %user_id,
                event_id,
                "Payment event already applied, skipping"
            ),
        }

        Ok(outcome)
    }

    /// Take `cost` credits before doing paid work.
    ///
    /// # Errors
    ///
    /// Same as [`Ledger::debit`].
    pub fn reserve(&self, user_id: &UserId, cost: i64) -> Result<Reservation> {
        let balance_after = self.debit(user_id, cost)?;
        Ok(Reservation {
            user_id: user_id.clone(),
            amount: cost,
            balance_after,
        })
    }

    /// Like [`Ledger::reserve`], but the credits come back automatically
    /// unless [`ReservationGuard::commit`] is called.
    ///
    /// # Errors
    ///
    /// Same as [`Ledger::debit`].
    pub fn reserve_guarded(&self, user_id: &UserId, cost: i64) -> Result<ReservationGuard> {
        let reservation = self.reserve(user_id, cost)?;
        Ok(ReservationGuard {
            ledger: self.clone(),
            balance_after: reservation.balance_after,
            reservation: Some(reservation),
        })
    }

    /// Return a reservation's credits after the work failed; returns the new balance.
    ///
    /// # Errors
    ///
    /// Same as [`Ledger::credit`].
    pub fn refund(&self, reservation: Reservation) -> Result<i64> {
        let balance = self.credit(&reservation.user_id, reservation.amount)?;
        tracing::info!(
            user_id = %reservation.user_id,
            amount = reservation.amount,
            balance,
            "Reservation refunded"
        );
        Ok(balance)
    }

    /// Create the account with the default balance if it does not exist yet.
    ///
    /// Returns the stored account either way; an existing account is never
    /// modified.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    pub fn ensure_account(&self, user_id: &UserId, profile: &Profile) -> Result<Account> {
        let (account, created) = self.transactor.run_transaction(|tx| {
            if let Some(existing) = tx.get_account(user_id)? {
                return Ok((existing, false));
            }
            let account = Account::new(user_id.clone(), self.default_credits, profile.clone());
            tx.put_account(&account)?;
            Ok((account, true))
        })?;

        if created {
            tracing::info!(
                user_id = %user_id,
                credits = account.credits,
                "Account created"
            );
        }

        Ok(account)
    }
}

fn current_balance(tx: &mut dyn Transaction, user_id: &UserId) -> crate::Result<i64> {
    Ok(tx.get_account(user_id)?.map_or(0, |a| a.credits))
}

fn apply_credit(tx: &mut dyn Transaction, user_id: &UserId, amount: i64) -> crate::Result<i64> {
    let mut account = tx
        .get_account(user_id)?
        .unwrap_or_else(|| Account::bare(user_id.clone()));

    account.credits = account
        .credits
        .checked_add(amount)
        .ok_or_else(|| StoreError::Database(format!("credit overflow for {user_id}")))?;
    account.updated_at = Some(Utc::now());
    tx.put_account(&account)?;
    Ok(account.credits)
}
