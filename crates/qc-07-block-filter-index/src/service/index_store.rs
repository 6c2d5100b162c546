//! # Filter Index Store
//!
//! Persistent mapping from (filter type, block hash) to encoded filter, plus
//! the best fully indexed block per filter type.
//!
//! ## Key Layout
//!
//! | Key                         | Value                      |
//! |-----------------------------|----------------------------|
//! | `b'f' \| type \| block_hash` | `StoredFilter` (bincode)   |
//! | `b'B' \| type`              | `IndexTip` (bincode)       |
//!
//! Every mutation that touches both an entry and the best height goes out in
//! one atomic batch, and all access is serialized through one `RwLock`, so a
//! reader never sees an entry without its best height or the reverse.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{BlockRef, Hash};
use tracing::debug;

use crate::domain::{FilterType, IndexTip};
use crate::error::IndexStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};

const FILTER_PREFIX: u8 = b'f';
const TIP_PREFIX: u8 = b'B';

/// Stored value of one filter entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFilter {
    /// Height of the block when it was indexed
    pub height: u64,
    /// Encoded filter
    pub filter: Vec<u8>,
}

fn filter_prefix(filter_type: FilterType) -> [u8; 2] {
    [FILTER_PREFIX, filter_type.as_u8()]
}

fn filter_key(filter_type: FilterType, block_hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + 32);
    key.extend_from_slice(&filter_prefix(filter_type));
    key.extend_from_slice(block_hash);
    key
}

fn tip_key(filter_type: FilterType) -> [u8; 2] {
    [TIP_PREFIX, filter_type.as_u8()]
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, IndexStoreError> {
    bincode::serialize(value).map_err(|e| IndexStoreError::Serialization(e.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, IndexStoreError> {
    bincode::deserialize(bytes).map_err(|e| IndexStoreError::Serialization(e.to_string()))
}

/// Filter index persistence over a `KeyValueStore`.
pub struct FilterIndexStore<S: KeyValueStore> {
    kv: RwLock<S>,
}

impl<S: KeyValueStore> FilterIndexStore<S> {
    pub fn new(kv: S) -> Self {
        Self {
            kv: RwLock::new(kv),
        }
    }

    /// Upsert one entry without touching the best height.
    pub fn put(
        &self,
        filter_type: FilterType,
        block_hash: &Hash,
        height: u64,
        filter: &[u8],
    ) -> Result<(), IndexStoreError> {
        let value = encode(&StoredFilter {
            height,
            filter: filter.to_vec(),
        })?;
        self.kv
            .write()
            .put(&filter_key(filter_type, block_hash), &value)?;
        Ok(())
    }

    pub fn get(
        &self,
        filter_type: FilterType,
        block_hash: &Hash,
    ) -> Result<Option<Vec<u8>>, IndexStoreError> {
        Ok(self
            .get_entry(filter_type, block_hash)?
            .map(|entry| entry.filter))
    }

    pub fn get_entry(
        &self,
        filter_type: FilterType,
        block_hash: &Hash,
    ) -> Result<Option<StoredFilter>, IndexStoreError> {
        let raw = self.kv.read().get(&filter_key(filter_type, block_hash))?;
        raw.map(|bytes| decode(&bytes)).transpose()
    }

    /// Delete one entry. Idempotent.
    pub fn remove(&self, filter_type: FilterType, block_hash: &Hash) -> Result<(), IndexStoreError> {
        self.kv.write().delete(&filter_key(filter_type, block_hash))?;
        Ok(())
    }

    pub fn contains(
        &self,
        filter_type: FilterType,
        block_hash: &Hash,
    ) -> Result<bool, IndexStoreError> {
        Ok(self.kv.read().exists(&filter_key(filter_type, block_hash))?)
    }

    /// Best fully indexed height, `None` if nothing is indexed.
    pub fn get_best_height(&self, filter_type: FilterType) -> Result<Option<u64>, IndexStoreError> {
        Ok(self.get_index_tip(filter_type)?.map(|tip| tip.height))
    }

    pub fn get_index_tip(
        &self,
        filter_type: FilterType,
    ) -> Result<Option<IndexTip>, IndexStoreError> {
        let raw = self.kv.read().get(&tip_key(filter_type))?;
        raw.map(|bytes| decode(&bytes)).transpose()
    }

    /// Overwrite the best height. `None` clears it.
    pub fn set_best_height(
        &self,
        filter_type: FilterType,
        tip: Option<IndexTip>,
    ) -> Result<(), IndexStoreError> {
        let mut kv = self.kv.write();
        match tip {
            Some(tip) => kv.put(&tip_key(filter_type), &encode(&tip)?)?,
            None => kv.delete(&tip_key(filter_type))?,
        }
        Ok(())
    }

    /// Write the entry for `block` and advance the best height to it, atomically.
    pub fn commit_block(
        &self,
        filter_type: FilterType,
        block: BlockRef,
        filter: &[u8],
    ) -> Result<(), IndexStoreError> {
        let entry = encode(&StoredFilter {
            height: block.height,
            filter: filter.to_vec(),
        })?;
        let tip = encode(&IndexTip::from(block))?;

        self.kv.write().atomic_batch_write(vec![
            BatchOperation::put(filter_key(filter_type, &block.hash), entry),
            BatchOperation::put(tip_key(filter_type).to_vec(), tip),
        ])?;

        debug!(filter_type = %filter_type, block = %block, filter_len = filter.len(), "Committed filter");
        Ok(())
    }

    /// Remove the entry for `block` and, if the best tip is that block, lower
    /// the best height to its parent (or clear it at genesis), atomically.
    ///
    /// A best tip on any other block is left alone: below `block` it is still
    /// valid, and at or above it it is stale and must be rewound by the
    /// tracker, which also prunes the entries above the fork point.
    ///
    /// Returns the best tip after the batch.
    pub fn retire_block(
        &self,
        filter_type: FilterType,
        block: BlockRef,
        parent_hash: Hash,
    ) -> Result<Option<IndexTip>, IndexStoreError> {
        let mut kv = self.kv.write();

        let current: Option<IndexTip> = kv
            .get(&tip_key(filter_type))?
            .map(|bytes| decode(&bytes))
            .transpose()?;

        let mut operations = vec![BatchOperation::delete(filter_key(filter_type, &block.hash))];
        let new_tip = match current {
            Some(tip) if tip.hash == block.hash => {
                let lowered = block
                    .height
                    .checked_sub(1)
                    .map(|height| IndexTip::new(height, parent_hash));
                operations.push(match lowered {
                    Some(tip) => BatchOperation::put(tip_key(filter_type).to_vec(), encode(&tip)?),
                    None => BatchOperation::delete(tip_key(filter_type).to_vec()),
                });
                lowered
            }
            other => other,
        };

        kv.atomic_batch_write(operations)?;

        debug!(filter_type = %filter_type, block = %block, "Retired filter");
        Ok(new_tip)
    }

    /// Hash and height of every stored entry of `filter_type`.
    pub fn entries(&self, filter_type: FilterType) -> Result<Vec<(Hash, u64)>, IndexStoreError> {
        let scanned = self.kv.read().prefix_scan(&filter_prefix(filter_type))?;

        scanned
            .into_iter()
            .map(|(key, value)| {
                let hash: Hash = key
                    .get(2..)
                    .and_then(|rest| rest.try_into().ok())
                    .ok_or_else(|| {
                        IndexStoreError::Serialization(format!(
                            "filter key of length {} is not type + block hash",
                            key.len()
                        ))
                    })?;
                let entry: StoredFilter = decode(&value)?;
                Ok((hash, entry.height))
            })
            .collect()
    }
}
