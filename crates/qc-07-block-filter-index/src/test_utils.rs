//! Test fixtures: well-formed chains and an in-memory block source.
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests under `tests/`.

use parking_lot::RwLock;
use shared_types::{Block, BlockHeader, Hash, OutPoint, Transaction, TxInput, TxOutput, ZERO_HASH};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::ChainSnapshot;
use crate::error::DataError;
use crate::ports::outbound::BlockSource;

/// Build a well-formed block: coinbase first, one spend of a synthetic
/// outpoint, merkle root filled in. `tag` distinguishes competing branches.
pub fn make_block(height: u64, parent_hash: Hash, tag: u8) -> Block {
    let h = height.to_le_bytes();

    let coinbase = Transaction {
        version: 1,
        inputs: vec![TxInput {
            prev_out: OutPoint::null(),
            script_sig: [&h[..], &[tag]].concat(),
            witness: vec![],
        }],
        outputs: vec![TxOutput {
            value: 50,
            script_pubkey: vec![0x51, tag, h[0], h[1]],
        }],
        lock_time: 0,
    };

    let mut prev_txid = [0u8; 32];
    prev_txid[..8].copy_from_slice(&h);
    prev_txid[31] = tag;
    let spend = Transaction {
        version: 2,
        inputs: vec![TxInput {
            prev_out: OutPoint {
                txid: prev_txid,
                vout: 0,
            },
            script_sig: vec![0x47, tag, h[0], h[1]],
            witness: vec![vec![0x02, tag, h[0]], vec![]],
        }],
        outputs: vec![TxOutput {
            value: 10,
            script_pubkey: vec![0x00, 0x14, tag, h[0], h[1]],
        }],
        lock_time: 0,
    };

    let mut block = Block {
        header: BlockHeader {
            version: 1,
            height,
            parent_hash,
            merkle_root: ZERO_HASH,
            timestamp: 1_700_000_000 + height * 600,
            nonce: u64::from(tag),
        },
        transactions: vec![coinbase, spend],
    };
    block.header.merkle_root = block.compute_merkle_root();
    block
}

/// A linked chain of well-formed blocks, genesis first.
#[derive(Clone, Debug)]
pub struct TestChain {
    blocks: Vec<Arc<Block>>,
}

impl TestChain {
    /// Chain of `len` blocks (heights `0..len`).
    pub fn new(len: u64) -> Self {
        let mut chain = Self { blocks: Vec::new() };
        chain.extend(len, 0);
        chain
    }

    /// Append `count` blocks built with `tag`.
    pub fn extend(&mut self, count: u64, tag: u8) -> &mut Self {
        for _ in 0..count {
            let height = self.blocks.len() as u64;
            let parent = self.blocks.last().map_or(ZERO_HASH, |b| b.hash());
            self.blocks.push(Arc::new(make_block(height, parent, tag)));
        }
        self
    }

    /// Competing chain sharing blocks `0..=fork_height`, then `new_blocks`
    /// blocks built with `tag`.
    pub fn fork(&self, fork_height: u64, new_blocks: u64, tag: u8) -> Self {
        let mut forked = Self {
            blocks: self.blocks[..=fork_height as usize].to_vec(),
        };
        forked.extend(new_blocks, tag);
        forked
    }

    pub fn block(&self, height: u64) -> Arc<Block> {
        Arc::clone(&self.blocks[height as usize])
    }

    pub fn hash(&self, height: u64) -> Hash {
        self.blocks[height as usize].hash()
    }

    pub fn tip(&self) -> Arc<Block> {
        Arc::clone(&self.blocks[self.blocks.len() - 1])
    }

    pub fn len(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> impl Iterator<Item = Arc<Block>> + '_ {
        self.blocks.iter().cloned()
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot::from_hashes(self.blocks.iter().map(|b| b.hash()).collect())
    }
}

/// In-memory `BlockSource` with injectable failures.
#[derive(Clone, Default)]
pub struct MockBlockSource {
    blocks: Arc<RwLock<HashMap<Hash, Block>>>,
    corrupted: Arc<RwLock<HashSet<Hash>>>,
    unavailable: Arc<AtomicBool>,
}

impl MockBlockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(chain: &TestChain) -> Self {
        let source = Self::new();
        source.add_chain(chain);
        source
    }

    pub fn add_chain(&self, chain: &TestChain) {
        let mut blocks = self.blocks.write();
        for block in chain.blocks() {
            blocks.insert(block.hash(), (*block).clone());
        }
    }

    /// Every lookup fails with `DataError::Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Serve `hash` with its transactions stripped, so the codec rejects it.
    pub fn corrupt(&self, hash: Hash) {
        self.corrupted.write().insert(hash);
    }

    pub fn repair(&self, hash: &Hash) {
        self.corrupted.write().remove(hash);
    }
}

impl BlockSource for MockBlockSource {
    fn block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, DataError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DataError::Unavailable("mock source offline".to_string()));
        }

        let mut block = self.blocks.read().get(hash).cloned();
        if self.corrupted.read().contains(hash) {
            if let Some(block) = block.as_mut() {
                block.transactions.clear();
            }
        }
        Ok(block)
    }
}

/// Lowercase hex of a hash, as a caller would send it.
pub fn hash_hex(hash: &Hash) -> String {
    hex::encode(hash)
}
