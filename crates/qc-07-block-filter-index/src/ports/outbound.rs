//! Outbound Ports (Driven Ports)
//!
//! Dependencies the filter index needs from the host: a key-value store for
//! persistence and the chain engine's block data.

use shared_types::{Block, Hash};

use crate::error::{DataError, KVStoreError};

/// Abstract interface for key-value database operations.
///
/// Production: `RocksDbStore` (`adapters::storage::rocksdb`, feature `rocksdb`)
/// Testing: `InMemoryKVStore` (`adapters::storage::memory`)
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch are applied, or NONE are.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// All pairs whose key starts with `prefix`.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Block data provider (Driven Port)
///
/// Supplies full block contents for heights the chain tracker has to index
/// without a block in hand: catch-up after restart, backfill of a newly
/// registered filter type, connects replayed from a resync.
pub trait BlockSource: Send + Sync {
    /// Fetch a block by hash. `Ok(None)` if the source does not know it.
    fn block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, DataError>;
}

impl<T: BlockSource + ?Sized> BlockSource for std::sync::Arc<T> {
    fn block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, DataError> {
        (**self).block_by_hash(hash)
    }
}
