//! `RocksDB` storage implementation.
//!
//! Uses an `OptimisticTransactionDB`: reads inside a transaction are tracked
//! with `get_for_update`, and a commit that races a concurrent writer fails
//! with `Busy`/`TryAgain`, which we retry.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, ErrorKind, IteratorMode, MultiThreaded,
    OptimisticTransactionDB, Options,
};

use jarvas_core::{Account, Generation, ProcessedEvent, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::transaction::{Transaction, TransactionBody, Transactor, DEFAULT_MAX_ATTEMPTS};
use crate::Store;

type Db = OptimisticTransactionDB<MultiThreaded>;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<Db>,
    max_attempts: u32,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Override how many times a conflicting transaction is attempted.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

struct RocksTransaction<'a> {
    store: &'a RocksStore,
    txn: rocksdb::Transaction<'a, Db>,
}

impl RocksTransaction<'_> {
    fn get_tracked<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.store.cf(cf_name)?;
        self.txn
            .get_for_update_cf(&cf, key, true)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| RocksStore::deserialize(&data))
            .transpose()
    }

    fn put<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.store.cf(cf_name)?;
        let value = RocksStore::serialize(value)?;
        self.txn
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl Transaction for RocksTransaction<'_> {
    fn get_account(&mut self, user_id: &UserId) -> Result<Option<Account>> {
        self.get_tracked(cf::ACCOUNTS, &keys::account_key(user_id))
    }

    fn put_account(&mut self, account: &Account) -> Result<()> {
        self.put(cf::ACCOUNTS, &keys::account_key(&account.user_id), account)
    }

    fn get_processed_event(&mut self, event_id: &str) -> Result<Option<ProcessedEvent>> {
        self.get_tracked(cf::PROCESSED_EVENTS, &keys::processed_event_key(event_id))
    }

    fn put_processed_event(&mut self, event: &ProcessedEvent) -> Result<()> {
        self.put(
            cf::PROCESSED_EVENTS,
            &keys::processed_event_key(&event.event_id),
            event,
        )
    }
}

impl Transactor for RocksStore {
    fn run_transaction_dyn(&self, body: &mut TransactionBody<'_>) -> Result<()> {
        for attempt in 1..=self.max_attempts {
            let mut tx = RocksTransaction {
                store: self,
                txn: self.db.transaction(),
            };

            // Dropping the transaction without commit rolls it back.
            body(&mut tx)?;

            match tx.txn.commit() {
                Ok(()) => return Ok(()),
                Err(e) if matches!(e.kind(), ErrorKind::Busy | ErrorKind::TryAgain) => {
                    tracing::debug!(attempt, error = %e, "Transaction conflict, retrying");
                }
                Err(e) => return Err(StoreError::Database(e.to_string())),
            }
        }

        tracing::warn!(attempts = self.max_attempts, "Transaction retries exhausted");
        Err(StoreError::Conflict {
            attempts: self.max_attempts,
        })
    }
}

impl Store for RocksStore {
    fn put_generation(&self, generation: &Generation) -> Result<()> {
        let cf = self.cf(cf::GENERATIONS)?;
        let key = keys::generation_key(&generation.user_id, &generation.id);
        let value = Self::serialize(generation)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_generations(&self, user_id: &UserId, limit: usize) -> Result<Vec<Generation>> {
        let cf = self.cf(cf::GENERATIONS)?;
        let prefix = keys::user_prefix(user_id);
        let end = keys::user_generations_end(user_id);

        // ULID suffixes are time-ordered, so walking back from the end of the
        // user's range yields newest first.
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&end, Direction::Reverse));

        let mut generations = Vec::new();
        for item in iter {
            if generations.len() >= limit {
                break;
            }

            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }

            generations.push(Self::deserialize(&value)?);
        }

        Ok(generations)
    }
}
