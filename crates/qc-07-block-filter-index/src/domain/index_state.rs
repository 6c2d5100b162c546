//! Per-type indexing progress

use serde::{Deserialize, Serialize};
use shared_types::{BlockRef, Hash};

use super::filter_type::FilterType;

/// Best fully indexed block for one filter type.
///
/// Every block from genesis through `height` on the active chain has a
/// stored filter of that type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTip {
    pub height: u64,
    pub hash: Hash,
}

impl IndexTip {
    pub fn new(height: u64, hash: Hash) -> Self {
        Self { height, hash }
    }

    pub fn block_ref(&self) -> BlockRef {
        BlockRef::new(self.hash, self.height)
    }
}

impl From<BlockRef> for IndexTip {
    fn from(block_ref: BlockRef) -> Self {
        Self::new(block_ref.height, block_ref.hash)
    }
}

/// Lifecycle of one filter type in the chain tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerState {
    /// Nothing indexed yet and no chain seen
    Uninitialized,
    /// Best indexed height equals the chain tip
    Synced,
    /// Below the chain tip (catching up or stalled on a failure)
    Behind,
    /// Best indexed block is no longer on the active chain. A disconnect that
    /// retires cleanly goes straight to `Synced`, so this only shows while a
    /// failed retire waits to be rewound.
    Reorging,
}

/// Diagnostic view of one filter type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeStatus {
    pub filter_type: FilterType,
    pub state: TrackerState,
    pub best_height: Option<u64>,
}

/// Diagnostic view of the whole index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Active chain tip
    pub tip: Option<BlockRef>,
    pub types: Vec<TypeStatus>,
}

impl IndexStatus {
    pub fn type_status(&self, filter_type: FilterType) -> Option<&TypeStatus> {
        self.types.iter().find(|s| s.filter_type == filter_type)
    }
}
