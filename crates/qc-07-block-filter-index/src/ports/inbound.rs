//! Inbound Ports (Driving Ports)
//!
//! The API that callers use to read from the filter index.

use shared_types::Hash;

use crate::domain::IndexStatus;
use crate::error::QueryError;

/// Primary block filter API (Driving Port)
pub trait BlockFilterApi: Send + Sync {
    /// Get the encoded filter of a block.
    ///
    /// # Arguments
    /// * `block_hash` - Hash of a block on the active chain
    /// * `filter_type` - Raw filter type selector as received from the caller
    ///
    /// # Errors
    /// Checked in this order:
    /// 1. `BlockNotFound` if the hash is not on the active chain
    /// 2. `InvalidFilterType` if the selector names no enabled filter type
    /// 3. `FilterNotFound` if the block is not indexed for that type yet
    fn get_block_filter(&self, block_hash: &Hash, filter_type: i64)
        -> Result<Vec<u8>, QueryError>;

    /// Per-type indexing progress and the active chain tip.
    fn index_status(&self) -> IndexStatus;
}
