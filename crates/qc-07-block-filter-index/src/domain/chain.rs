//! Active chain snapshots
//!
//! A `ChainSnapshot` is an immutable view of the active chain: block hashes
//! by height from genesis to tip, plus the reverse lookup. Chain events
//! produce new snapshots instead of mutating a shared one, so a query that
//! borrowed a snapshot resolves every hash against one consistent chain.

use shared_types::{Block, BlockRef, Hash};
use std::collections::HashMap;

use crate::error::ChainError;

/// Immutable view of the active chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainSnapshot {
    /// Block hash at each height, genesis first
    hashes: Vec<Hash>,
    /// Reverse lookup, hash to height
    heights: HashMap<Hash, u64>,
}

/// Blocks that leave and join the active chain when moving between two
/// snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainDiff {
    /// Blocks no longer active, tip first
    pub disconnected: Vec<BlockRef>,
    /// Blocks newly active, ascending height
    pub connected: Vec<BlockRef>,
}

impl ChainDiff {
    pub fn is_empty(&self) -> bool {
        self.disconnected.is_empty() && self.connected.is_empty()
    }
}

impl ChainSnapshot {
    /// Empty chain (no genesis yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from hashes ordered by height, genesis first.
    pub fn from_hashes(hashes: Vec<Hash>) -> Self {
        let heights = hashes
            .iter()
            .enumerate()
            .map(|(height, hash)| (*hash, height as u64))
            .collect();
        Self { hashes, heights }
    }

    pub fn tip(&self) -> Option<BlockRef> {
        let hash = self.hashes.last()?;
        Some(BlockRef::new(*hash, self.hashes.len() as u64 - 1))
    }

    /// Height of the tip, `None` for an empty chain.
    pub fn height(&self) -> Option<u64> {
        self.tip().map(|tip| tip.height)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn hash_at(&self, height: u64) -> Option<Hash> {
        usize::try_from(height)
            .ok()
            .and_then(|h| self.hashes.get(h))
            .copied()
    }

    /// Height of `hash` if it is on this chain.
    pub fn resolve(&self, hash: &Hash) -> Option<u64> {
        self.heights.get(hash).copied()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.heights.contains_key(hash)
    }

    pub fn block_ref_at(&self, height: u64) -> Option<BlockRef> {
        self.hash_at(height).map(|hash| BlockRef::new(hash, height))
    }

    /// Snapshot with `block` appended as the new tip.
    ///
    /// The block must sit at `tip + 1` and name the tip as its parent.
    pub fn extend(&self, block: &Block) -> Result<Self, ChainError> {
        let expected = self.hashes.len() as u64;
        if block.height() != expected {
            return Err(ChainError::NonContiguous {
                expected,
                got: block.height(),
            });
        }

        let block_hash = block.hash();
        if let Some(tip_hash) = self.hashes.last() {
            if block.header.parent_hash != *tip_hash {
                return Err(ChainError::ParentMismatch {
                    block_hash,
                    tip_hash: *tip_hash,
                });
            }
        }

        let mut next = self.clone();
        next.hashes.push(block_hash);
        next.heights.insert(block_hash, expected);
        Ok(next)
    }

    /// Snapshot with the tip removed. `block_hash` must be the current tip.
    pub fn without_tip(&self, block_hash: &Hash) -> Result<Self, ChainError> {
        let tip_hash = self.hashes.last().ok_or(ChainError::Empty)?;
        if tip_hash != block_hash {
            return Err(ChainError::NotTip {
                block_hash: *block_hash,
            });
        }

        let mut next = self.clone();
        next.hashes.pop();
        next.heights.remove(block_hash);
        Ok(next)
    }

    /// Highest height at which both chains hold the same block.
    pub fn fork_point(&self, other: &ChainSnapshot) -> Option<u64> {
        let common = self.hashes.len().min(other.hashes.len());
        (0..common)
            .rev()
            .find(|&h| self.hashes[h] == other.hashes[h])
            .map(|h| h as u64)
    }

    /// Blocks to disconnect from `self` and connect from `other` to move
    /// the active chain from `self` to `other`.
    pub fn diff(&self, other: &ChainSnapshot) -> ChainDiff {
        let first_divergent = self.fork_point(other).map_or(0, |h| h as usize + 1);

        let disconnected = (first_divergent..self.hashes.len())
            .rev()
            .map(|h| BlockRef::new(self.hashes[h], h as u64))
            .collect();
        let connected = (first_divergent..other.hashes.len())
            .map(|h| BlockRef::new(other.hashes[h], h as u64))
            .collect();

        ChainDiff {
            disconnected,
            connected,
        }
    }
}
