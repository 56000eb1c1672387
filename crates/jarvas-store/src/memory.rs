//! In-process storage with optimistic concurrency.
//!
//! Every document carries a version stamped from a store-wide clock. A
//! transaction remembers the version of each document it read (0 for "absent")
//! and, at commit, fails if any of them moved. This mirrors the behaviour of
//! the managed document database the service runs against in production and
//! lets the ledger's retry path be exercised in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use jarvas_core::{Account, Generation, GenerationId, ProcessedEvent, UserId};

use crate::error::{Result, StoreError};
use crate::transaction::{Transaction, TransactionBody, Transactor, DEFAULT_MAX_ATTEMPTS};
use crate::Store;

#[derive(Debug, Clone)]
struct Versioned<T> {
    version: u64,
    value: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DocKey {
    Account(UserId),
    Event(String),
}

#[derive(Debug, Default)]
struct Inner {
    clock: u64,
    accounts: HashMap<UserId, Versioned<Account>>,
    events: HashMap<String, Versioned<ProcessedEvent>>,
    generations: HashMap<UserId, BTreeMap<GenerationId, Generation>>,
}

impl Inner {
    fn version_of(&self, key: &DocKey) -> u64 {
        match key {
            DocKey::Account(id) => self.accounts.get(id).map_or(0, |v| v.version),
            DocKey::Event(id) => self.events.get(id).map_or(0, |v| v.version),
        }
    }
}

/// In-memory storage implementation.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    max_attempts: u32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override how many times a conflicting transaction is attempted.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    reads: HashMap<DocKey, u64>,
    account_writes: HashMap<UserId, Account>,
    event_writes: HashMap<String, ProcessedEvent>,
}

impl<'a> MemoryTransaction<'a> {
    fn new(store: &'a MemoryStore) -> Self {
        Self {
            store,
            reads: HashMap::new(),
            account_writes: HashMap::new(),
            event_writes: HashMap::new(),
        }
    }

    /// Apply buffered writes if nothing we read has changed.
    ///
    /// Returns `false` on conflict.
    fn commit(self) -> Result<bool> {
        let mut inner = self.store.lock()?;

        if self
            .reads
            .iter()
            .any(|(key, seen)| inner.version_of(key) != *seen)
        {
            return Ok(false);
        }

        for (user_id, account) in self.account_writes {
            inner.clock += 1;
            let version = inner.clock;
            inner.accounts.insert(
                user_id,
                Versioned {
                    version,
                    value: account,
                },
            );
        }
        for (event_id, event) in self.event_writes {
            inner.clock += 1;
            let version = inner.clock;
            inner.events.insert(
                event_id,
                Versioned {
                    version,
                    value: event,
                },
            );
        }

        Ok(true)
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn get_account(&mut self, user_id: &UserId) -> Result<Option<Account>> {
        if let Some(pending) = self.account_writes.get(user_id) {
            return Ok(Some(pending.clone()));
        }

        let inner = self.store.lock()?;
        let current = inner.accounts.get(user_id);
        self.reads
            .entry(DocKey::Account(user_id.clone()))
            .or_insert_with(|| current.map_or(0, |v| v.version));

        Ok(current.map(|v| v.value.clone()))
    }

    fn put_account(&mut self, account: &Account) -> Result<()> {
        self.account_writes
            .insert(account.user_id.clone(), account.clone());
        Ok(())
    }

    fn get_processed_event(&mut self, event_id: &str) -> Result<Option<ProcessedEvent>> {
        if let Some(pending) = self.event_writes.get(event_id) {
            return Ok(Some(pending.clone()));
        }

        let inner = self.store.lock()?;
        let current = inner.events.get(event_id);
        self.reads
            .entry(DocKey::Event(event_id.to_string()))
            .or_insert_with(|| current.map_or(0, |v| v.version));

        Ok(current.map(|v| v.value.clone()))
    }

    fn put_processed_event(&mut self, event: &ProcessedEvent) -> Result<()> {
        self.event_writes
            .insert(event.event_id.clone(), event.clone());
        Ok(())
    }
}

impl Transactor for MemoryStore {
    fn run_transaction_dyn(&self, body: &mut TransactionBody<'_>) -> Result<()> {
        for attempt in 1..=self.max_attempts {
            let mut tx = MemoryTransaction::new(self);
            body(&mut tx)?;

            if tx.commit()? {
                return Ok(());
            }

            tracing::debug!(attempt, "Transaction conflict, retrying");
        }

        tracing::warn!(attempts = self.max_attempts, "Transaction retries exhausted");
        Err(StoreError::Conflict {
            attempts: self.max_attempts,
        })
    }
}

impl Store for MemoryStore {
    fn put_generation(&self, generation: &Generation) -> Result<()> {
        let mut inner = self.lock()?;
        inner
            .generations
            .entry(generation.user_id.clone())
            .or_default()
            .insert(generation.id, generation.clone());
        Ok(())
    }

    fn list_generations(&self, user_id: &UserId, limit: usize) -> Result<Vec<Generation>> {
        let inner = self.lock()?;
        Ok(inner
            .generations
            .get(user_id)
            .map(|by_id| by_id.values().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
