//! Ordered key/value storage traits
//!
//! Hexad reads and writes an ordered byte-keyed store through three small
//! traits:
//!
//! - [`KvSnapshot`]: an immutable read view. `seek` positions at the first
//!   key at or after a target, which is all the query engine needs to drive
//!   contiguous range scans.
//! - [`KvTransaction`]: a read-your-writes write batch, used by ingest.
//! - [`KvStore`]: the engine handle that opens snapshots and transactions.
//!
//! ## Implementations
//!
//! - [`MemoryStore`]: copy-on-commit `BTreeMap`, giving real snapshot
//!   isolation. Used by unit tests and in-memory deployments.
//! - `RedbStore` (feature `redb`): a single-table redb database for
//!   persistent deployments.
//!
//! The traits are synchronous: the store is embedded, and traversal of
//! resident data should not pay an async seam.

use crate::error::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// Immutable read view of the store
pub trait KvSnapshot: Send {
    /// Point lookup
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// First key at or after `target`, or `None` if the keyspace is
    /// exhausted. Returns the key only; use [`get`](Self::get) for values.
    fn seek(&self, target: &[u8]) -> Result<Option<Vec<u8>>>;
}

/// Read-your-writes transaction
pub trait KvTransaction: KvSnapshot {
    /// Stage a write
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Atomically apply all staged writes
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Storage engine handle
pub trait KvStore: Send + Sync {
    /// Open a read snapshot
    fn snapshot(&self) -> Result<Box<dyn KvSnapshot + '_>>;

    /// Begin a write transaction
    fn begin(&self) -> Result<Box<dyn KvTransaction + '_>>;
}

// ============================================================================
// MemoryStore
// ============================================================================

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory store with copy-on-commit snapshots
///
/// Snapshots clone an `Arc` of the current map; commits build the next map
/// and swap it in, so open snapshots are never perturbed by later writes.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Arc<Map>>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently committed
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the store has no committed keys
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn snapshot(&self) -> Result<Box<dyn KvSnapshot + '_>> {
        Ok(Box::new(MemorySnapshot {
            data: Arc::clone(&self.data.read()),
        }))
    }

    fn begin(&self) -> Result<Box<dyn KvTransaction + '_>> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            base: Arc::clone(&self.data.read()),
            pending: BTreeMap::new(),
        }))
    }
}

/// Snapshot over a frozen map
#[derive(Debug)]
pub struct MemorySnapshot {
    data: Arc<Map>,
}

impl KvSnapshot for MemorySnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn seek(&self, target: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .data
            .range::<[u8], _>((Bound::Included(target), Bound::Unbounded))
            .next()
            .map(|(k, _)| k.clone()))
    }
}

/// Write batch over a frozen base map
#[derive(Debug)]
pub struct MemoryTransaction {
    store: MemoryStore,
    base: Arc<Map>,
    pending: Map,
}

impl KvSnapshot for MemoryTransaction {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.pending.get(key) {
            return Ok(Some(value.clone()));
        }
        Ok(self.base.get(key).cloned())
    }

    fn seek(&self, target: &[u8]) -> Result<Option<Vec<u8>>> {
        let bounds = (Bound::Included(target), Bound::Unbounded);
        let staged = self.pending.range::<[u8], _>(bounds).next().map(|(k, _)| k);
        let committed = self.base.range::<[u8], _>(bounds).next().map(|(k, _)| k);
        Ok(match (staged, committed) {
            (Some(s), Some(c)) => Some(if s <= c { s.clone() } else { c.clone() }),
            (Some(s), None) => Some(s.clone()),
            (None, Some(c)) => Some(c.clone()),
            (None, None) => None,
        })
    }
}

impl KvTransaction for MemoryTransaction {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.pending.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let mut guard = self.store.data.write();
        let mut next = (**guard).clone();
        next.extend(self.pending);
        *guard = Arc::new(next);
        Ok(())
    }
}

// ============================================================================
// RedbStore (feature `redb`)
// ============================================================================

#[cfg(feature = "redb")]
mod redb_store {
    use super::*;
    use redb::{Database, ReadableTable, TableDefinition};
    use std::path::Path;

    const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("hexad");

    fn backend_err(e: impl std::fmt::Display) -> Error {
        Error::storage(e.to_string())
    }

    /// Persistent store backed by a single redb table
    pub struct RedbStore {
        db: Database,
    }

    impl std::fmt::Debug for RedbStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RedbStore").finish_non_exhaustive()
        }
    }

    impl RedbStore {
        /// Open (or create) a database file
        pub fn open(path: impl AsRef<Path>) -> Result<Self> {
            let db = Database::create(path).map_err(backend_err)?;
            // Make sure the table exists so read snapshots never fail on a
            // fresh database.
            let txn = db.begin_write().map_err(backend_err)?;
            txn.open_table(TABLE).map_err(backend_err)?;
            txn.commit().map_err(backend_err)?;
            Ok(Self { db })
        }
    }

    impl KvStore for RedbStore {
        fn snapshot(&self) -> Result<Box<dyn KvSnapshot + '_>> {
            let txn = self.db.begin_read().map_err(backend_err)?;
            Ok(Box::new(RedbSnapshot { txn }))
        }

        fn begin(&self) -> Result<Box<dyn KvTransaction + '_>> {
            let txn = self.db.begin_write().map_err(backend_err)?;
            Ok(Box::new(RedbTransaction { txn }))
        }
    }

    /// Read snapshot over a redb read transaction
    pub struct RedbSnapshot {
        txn: redb::ReadTransaction,
    }

    impl KvSnapshot for RedbSnapshot {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            let table = self.txn.open_table(TABLE).map_err(backend_err)?;
            let found = table.get(key).map_err(backend_err)?;
            Ok(found.map(|guard| guard.value().to_vec()))
        }

        fn seek(&self, target: &[u8]) -> Result<Option<Vec<u8>>> {
            let table = self.txn.open_table(TABLE).map_err(backend_err)?;
            let mut range = table
                .range::<&[u8]>((Bound::Included(target), Bound::Unbounded))
                .map_err(backend_err)?;
            match range.next() {
                Some(entry) => {
                    let (key, _) = entry.map_err(backend_err)?;
                    Ok(Some(key.value().to_vec()))
                }
                None => Ok(None),
            }
        }
    }

    /// Write transaction; the table is opened per operation so the
    /// transaction object stays free of self-borrows
    pub struct RedbTransaction {
        txn: redb::WriteTransaction,
    }

    impl KvSnapshot for RedbTransaction {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            let table = self.txn.open_table(TABLE).map_err(backend_err)?;
            let found = table.get(key).map_err(backend_err)?;
            Ok(found.map(|guard| guard.value().to_vec()))
        }

        fn seek(&self, target: &[u8]) -> Result<Option<Vec<u8>>> {
            let table = self.txn.open_table(TABLE).map_err(backend_err)?;
            let mut range = table
                .range::<&[u8]>((Bound::Included(target), Bound::Unbounded))
                .map_err(backend_err)?;
            match range.next() {
                Some(entry) => {
                    let (key, _) = entry.map_err(backend_err)?;
                    Ok(Some(key.value().to_vec()))
                }
                None => Ok(None),
            }
        }
    }

    impl KvTransaction for RedbTransaction {
        fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
            let mut table = self.txn.open_table(TABLE).map_err(backend_err)?;
            table.insert(key, value).map_err(backend_err)?;
            Ok(())
        }

        fn commit(self: Box<Self>) -> Result<()> {
            self.txn.commit().map_err(backend_err)
        }
    }
}

#[cfg(feature = "redb")]
pub use redb_store::RedbStore;
