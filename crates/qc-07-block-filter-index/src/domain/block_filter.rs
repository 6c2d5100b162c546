//! Block-level compact filter
//!
//! Derives the element set of a block for a given filter type and encodes it
//! as a GCS filter keyed by the block hash. Output depends only on the
//! block's contents and the filter type.

use shared_types::{Block, Hash};

use super::filter_type::FilterType;
use super::gcs_filter::{ElementSet, GcsFilter};
use crate::error::CodecError;

/// Compact filter for a specific block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockFilter {
    /// Filter construction used
    pub filter_type: FilterType,
    /// Hash of the block (also the SipHash key)
    pub block_hash: Hash,
    /// The encoded set
    pub filter: GcsFilter,
}

impl BlockFilter {
    /// Build the filter of `filter_type` over `block`.
    pub fn new(filter_type: FilterType, block: &Block) -> Result<Self, CodecError> {
        let block_hash = block.hash();
        check_well_formed(block, &block_hash)?;

        let elements = match filter_type {
            FilterType::Basic => basic_elements(block),
            FilterType::Extended => extended_elements(block),
        };
        let filter = GcsFilter::build(&block_hash, filter_type.golomb_p(), &elements)?;

        Ok(Self {
            filter_type,
            block_hash,
            filter,
        })
    }

    /// Rebuild a filter from bytes previously produced by [`BlockFilter::new`].
    pub fn from_encoded(
        filter_type: FilterType,
        block_hash: Hash,
        encoded: Vec<u8>,
    ) -> Result<Self, CodecError> {
        let filter = GcsFilter::from_encoded(&block_hash, filter_type.golomb_p(), encoded)?;
        Ok(Self {
            filter_type,
            block_hash,
            filter,
        })
    }

    pub fn encoded(&self) -> &[u8] {
        self.filter.encoded()
    }

    pub fn into_encoded(self) -> Vec<u8> {
        self.filter.into_encoded()
    }

    /// Check if any of the given elements might be in this block
    pub fn might_contain_any(&self, elements: &ElementSet) -> bool {
        self.filter.match_any(elements)
    }
}

/// Compute the encoded filter bytes for `block`.
pub fn compute_filter(block: &Block, filter_type: FilterType) -> Result<Vec<u8>, CodecError> {
    BlockFilter::new(filter_type, block).map(BlockFilter::into_encoded)
}

fn check_well_formed(block: &Block, block_hash: &Hash) -> Result<(), CodecError> {
    let malformed = |reason| CodecError::MalformedBlock {
        block_hash: *block_hash,
        reason,
    };

    let first = block
        .transactions
        .first()
        .ok_or_else(|| malformed("no transactions"))?;
    if !first.is_coinbase() {
        return Err(malformed("first transaction is not a coinbase"));
    }
    if block.compute_merkle_root() != block.header.merkle_root {
        return Err(malformed("merkle root mismatch"));
    }
    Ok(())
}

/// Txids, spent outpoints, and output scripts.
fn basic_elements(block: &Block) -> ElementSet {
    let mut elements = ElementSet::new();

    for tx in &block.transactions {
        elements.insert(tx.txid().to_vec());

        if !tx.is_coinbase() {
            for input in &tx.inputs {
                elements.insert(input.prev_out.to_bytes().to_vec());
            }
        }

        for output in &tx.outputs {
            if !output.script_pubkey.is_empty() {
                elements.insert(output.script_pubkey.clone());
            }
        }
    }

    elements
}

/// Input scripts and witness items of non-coinbase inputs.
fn extended_elements(block: &Block) -> ElementSet {
    let mut elements = ElementSet::new();

    for tx in block.transactions.iter().filter(|tx| !tx.is_coinbase()) {
        for input in &tx.inputs {
            if !input.script_sig.is_empty() {
                elements.insert(input.script_sig.clone());
            }
            for item in input.witness.iter().filter(|item| !item.is_empty()) {
                elements.insert(item.clone());
            }
        }
    }

    elements
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BlockHeader, OutPoint, Transaction, TxInput, TxOutput};

    fn coinbase() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                prev_out: OutPoint::null(),
                script_sig: vec![0x03, 0x01, 0x02, 0x03],
                witness: vec![vec![0xCB; 32]],
            }],
            outputs: vec![TxOutput {
                value: 50,
                script_pubkey: vec![0x51, 0xAA],
            }],
            lock_time: 0,
        }
    }

    fn spend(prev: Hash) -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![TxInput {
                prev_out: OutPoint { txid: prev, vout: 0 },
                script_sig: vec![0x47, 0x30],
                witness: vec![vec![0x01, 0x02], vec![]],
            }],
            outputs: vec![
                TxOutput {
                    value: 10,
                    script_pubkey: vec![0x76, 0xA9, 0x14],
                },
                TxOutput {
                    value: 0,
                    script_pubkey: vec![],
                },
            ],
            lock_time: 0,
        }
    }

    fn block(transactions: Vec<Transaction>) -> Block {
        let mut block = Block {
            header: BlockHeader {
                version: 1,
                height: 7,
                parent_hash: [0x11; 32],
                ..Default::default()
            },
            transactions,
        };
        block.header.merkle_root = block.compute_merkle_root();
        block
    }

    #[test]
    fn test_basic_filter_matches_block_contents() {
        let spend = spend([0x22; 32]);
        let block = block(vec![coinbase(), spend.clone()]);
        let filter = BlockFilter::new(FilterType::Basic, &block).unwrap();

        let expected: ElementSet = [
            spend.txid().to_vec(),
            OutPoint {
                txid: [0x22; 32],
                vout: 0,
            }
            .to_bytes()
            .to_vec(),
            vec![0x76, 0xA9, 0x14],
            vec![0x51, 0xAA],
        ]
        .into_iter()
        .collect();

        assert_eq!(filter.filter.n(), 5);
        for element in &expected {
            assert!(filter.might_contain_any(&[element.clone()].into_iter().collect()));
        }
    }

    #[test]
    fn test_basic_skips_coinbase_prevout() {
        let block = block(vec![coinbase()]);
        let filter = BlockFilter::new(FilterType::Basic, &block).unwrap();

        // coinbase txid + coinbase output script
        assert_eq!(filter.filter.n(), 2);
    }

    #[test]
    fn test_extended_filter_elements() {
        let block = block(vec![coinbase(), spend([0x22; 32])]);
        let filter = BlockFilter::new(FilterType::Extended, &block).unwrap();

        // script_sig + one non-empty witness item; coinbase excluded
        assert_eq!(filter.filter.n(), 2);
        let query: ElementSet = [vec![0x47, 0x30]].into_iter().collect();
        assert!(filter.might_contain_any(&query));
    }

    #[test]
    fn test_extended_coinbase_only_is_empty() {
        let block = block(vec![coinbase()]);
        assert_eq!(
            compute_filter(&block, FilterType::Extended).unwrap(),
            vec![0x00]
        );
    }

    #[test]
    fn test_compute_filter_deterministic() {
        let block = block(vec![coinbase(), spend([0x22; 32])]);
        for filter_type in FilterType::ALL {
            let a = compute_filter(&block, filter_type).unwrap();
            let b = compute_filter(&block.clone(), filter_type).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_types_differ() {
        let block = block(vec![coinbase(), spend([0x22; 32])]);
        assert_ne!(
            compute_filter(&block, FilterType::Basic).unwrap(),
            compute_filter(&block, FilterType::Extended).unwrap()
        );
    }

    #[test]
    fn test_rejects_empty_block() {
        let block = block(vec![]);
        assert!(matches!(
            compute_filter(&block, FilterType::Basic),
            Err(CodecError::MalformedBlock {
                reason: "no transactions",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_missing_coinbase() {
        let block = block(vec![spend([0x22; 32])]);
        assert!(matches!(
            compute_filter(&block, FilterType::Basic),
            Err(CodecError::MalformedBlock { .. })
        ));
    }

    #[test]
    fn test_rejects_merkle_mismatch() {
        let mut block = block(vec![coinbase()]);
        block.header.merkle_root = [0xEE; 32];
        assert!(matches!(
            compute_filter(&block, FilterType::Extended),
            Err(CodecError::MalformedBlock {
                reason: "merkle root mismatch",
                ..
            })
        ));
    }

    #[test]
    fn test_from_encoded() {
        let block = block(vec![coinbase(), spend([0x22; 32])]);
        let built = BlockFilter::new(FilterType::Basic, &block).unwrap();
        let restored =
            BlockFilter::from_encoded(FilterType::Basic, block.hash(), built.encoded().to_vec())
                .unwrap();
        assert_eq!(built, restored);
    }
}
