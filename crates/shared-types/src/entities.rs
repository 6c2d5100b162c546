//! # Core Chain Entities
//!
//! Blocks, transactions, and block identities shared by the chain engine
//! and the subsystems that consume its output.
//!
//! ## Identity
//!
//! - Transaction ids and block hashes are double SHA-256 over a canonical
//!   little-endian encoding of the fields.
//! - A `BlockRef` pairs a block hash with its height on a particular chain;
//!   the same hash can be active in one chain snapshot and orphaned in another.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// A 32-byte hash (double SHA-256).
pub type Hash = [u8; 32];

/// The all-zero hash, used as the parent of the genesis block.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Output index marking the null outpoint spent by coinbase inputs.
pub const NULL_OUTPUT_INDEX: u32 = u32::MAX;

/// Compute double SHA-256 of the given data.
pub fn sha256d(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Identity of a block: its hash and its height in a specific chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    /// Block hash (the caller-facing identifier).
    pub hash: Hash,
    /// Height of the block in the chain it was taken from.
    pub height: u64,
}

impl BlockRef {
    pub fn new(hash: Hash, height: u64) -> Self {
        Self { hash, height }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", short_hex(&self.hash), self.height)
    }
}

/// First 8 bytes of a hash as lowercase hex, for log output.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..8])
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// Reference to a specific output of a previous transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Id of the transaction holding the output.
    pub txid: Hash,
    /// Index of the output within that transaction.
    pub vout: u32,
}

impl OutPoint {
    /// The outpoint spent by a coinbase input.
    pub const fn null() -> Self {
        Self {
            txid: ZERO_HASH,
            vout: NULL_OUTPUT_INDEX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid == ZERO_HASH && self.vout == NULL_OUTPUT_INDEX
    }

    /// Canonical 36-byte serialization: txid followed by little-endian vout.
    pub fn to_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..32].copy_from_slice(&self.txid);
        out[32..].copy_from_slice(&self.vout.to_le_bytes());
        out
    }
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// The output being spent.
    pub prev_out: OutPoint,
    /// Unlocking script.
    pub script_sig: Vec<u8>,
    /// Witness stack items.
    pub witness: Vec<Vec<u8>>,
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount in base units.
    pub value: u64,
    /// Locking script.
    pub script_pubkey: Vec<u8>,
}

/// A transaction as included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Compute the transaction id.
    ///
    /// Witness data is not committed to, so the id is stable across
    /// witness malleation.
    pub fn txid(&self) -> Hash {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_len(&mut buf, self.inputs.len());
        for input in &self.inputs {
            buf.extend_from_slice(&input.prev_out.to_bytes());
            write_len(&mut buf, input.script_sig.len());
            buf.extend_from_slice(&input.script_sig);
        }
        write_len(&mut buf, self.outputs.len());
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            write_len(&mut buf, output.script_pubkey.len());
            buf.extend_from_slice(&output.script_pubkey);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        sha256d(&buf)
    }

    /// A coinbase has exactly one input, spending the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prev_out.is_null()
    }
}

fn write_len(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&(len as u64).to_le_bytes());
}

// =============================================================================
// BLOCKS
// =============================================================================

/// The header of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Protocol version for this block.
    pub version: u32,
    /// Block height in the chain.
    pub height: u64,
    /// Hash of the parent block.
    pub parent_hash: Hash,
    /// Merkle root of all transaction ids in the block.
    pub merkle_root: Hash,
    /// Unix timestamp when the block was produced.
    pub timestamp: u64,
    /// Nonce; lets two blocks at the same height differ.
    pub nonce: u64,
}

impl BlockHeader {
    /// Compute the block hash.
    pub fn hash(&self) -> Hash {
        let mut buf = Vec::with_capacity(92);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.parent_hash);
        buf.extend_from_slice(&self.merkle_root);
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        sha256d(&buf)
    }
}

/// A full block: header plus transactions, coinbase first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn block_ref(&self) -> BlockRef {
        BlockRef::new(self.hash(), self.header.height)
    }

    /// Merkle root over the transaction ids (odd levels duplicate the last node).
    pub fn compute_merkle_root(&self) -> Hash {
        let mut level: Vec<Hash> = self.transactions.iter().map(Transaction::txid).collect();
        if level.is_empty() {
            return ZERO_HASH;
        }
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| {
                    let right = pair.get(1).unwrap_or(&pair[0]);
                    let mut buf = [0u8; 64];
                    buf[..32].copy_from_slice(&pair[0]);
                    buf[32..].copy_from_slice(right);
                    sha256d(&buf)
                })
                .collect();
        }
        level[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coinbase(tag: u8) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                prev_out: OutPoint::null(),
                script_sig: vec![tag],
                witness: vec![],
            }],
            outputs: vec![TxOutput {
                value: 50,
                script_pubkey: vec![0x51, tag],
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn test_coinbase_detection() {
        assert!(coinbase(1).is_coinbase());

        let mut spend = coinbase(1);
        spend.inputs[0].prev_out = OutPoint {
            txid: [7; 32],
            vout: 0,
        };
        assert!(!spend.is_coinbase());
    }

    #[test]
    fn test_txid_ignores_witness() {
        let tx = coinbase(3);
        let mut witnessed = tx.clone();
        witnessed.inputs[0].witness = vec![vec![1, 2, 3]];
        assert_eq!(tx.txid(), witnessed.txid());
        assert_ne!(tx.txid(), coinbase(4).txid());
    }

    #[test]
    fn test_block_hash_commits_to_nonce() {
        let a = BlockHeader {
            nonce: 1,
            ..Default::default()
        };
        let b = BlockHeader {
            nonce: 2,
            ..Default::default()
        };
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_merkle_root_depends_on_transactions() {
        let one = Block {
            header: BlockHeader::default(),
            transactions: vec![coinbase(1)],
        };
        let three = Block {
            header: BlockHeader::default(),
            transactions: vec![coinbase(1), coinbase(2), coinbase(3)],
        };
        assert_eq!(one.compute_merkle_root(), coinbase(1).txid());
        assert_ne!(one.compute_merkle_root(), three.compute_merkle_root());
        assert_eq!(Block::default().compute_merkle_root(), ZERO_HASH);
    }

    #[test]
    fn test_outpoint_serialization() {
        let op = OutPoint {
            txid: [0xAB; 32],
            vout: 2,
        };
        let bytes = op.to_bytes();
        assert_eq!(&bytes[..32], &[0xAB; 32]);
        assert_eq!(&bytes[32..], &[2, 0, 0, 0]);
        assert!(OutPoint::null().is_null());
    }

    #[test]
    fn test_block_ref_display() {
        let r = BlockRef::new([0x0F; 32], 12);
        assert_eq!(r.to_string(), "0f0f0f0f0f0f0f0f@12");
    }

    #[test]
    fn test_short_hex_is_lowercase_prefix() {
        let mut hash = [0u8; 32];
        hash[..8].copy_from_slice(&[0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45, 0x67, 0x89]);
        hash[31] = 0xFF;
        assert_eq!(short_hex(&hash), "abcdef0123456789");
    }
}
