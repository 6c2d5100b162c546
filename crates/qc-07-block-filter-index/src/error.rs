//! Error types for the Block Filter Index subsystem

use shared_types::{short_hex, Hash};
use thiserror::Error;

use crate::domain::FilterType;

/// Errors returned to query callers.
///
/// The `Display` text of `BlockNotFound` and `InvalidFilterType` is part of
/// the external RPC contract and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Block not found")]
    BlockNotFound,

    #[error("unknown filter_type")]
    InvalidFilterType(i64),

    /// The block is on the active chain but has no filter for this type.
    /// Transient while the index catches up; an indexing gap otherwise.
    #[error("Filter not found")]
    FilterNotFound {
        block_hash: Hash,
        filter_type: FilterType,
    },

    #[error("Index store error: {0}")]
    Storage(String),
}

/// Errors from the filter codec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Malformed block {}: {reason}", short_hex(.block_hash))]
    MalformedBlock {
        block_hash: Hash,
        reason: &'static str,
    },

    #[error("Too many filter elements: {count} (must be < 2^32)")]
    TooManyElements { count: u64 },

    #[error("Invalid filter encoding: {0}")]
    InvalidEncoding(String),
}

/// Errors from key-value store backends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
}

/// Errors from the index store layered over a key-value backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexStoreError {
    #[error(transparent)]
    Backend(#[from] KVStoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from the chain engine's block source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("Block not found: {}", short_hex(.hash))]
    BlockNotFound { hash: Hash },

    #[error("Block source unavailable: {0}")]
    Unavailable(String),
}

/// Errors applying a chain event to a chain snapshot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Block at height {got} does not extend tip (expected height {expected})")]
    NonContiguous { expected: u64, got: u64 },

    #[error("Block {} does not build on tip {}", short_hex(.block_hash), short_hex(.tip_hash))]
    ParentMismatch { block_hash: Hash, tip_hash: Hash },

    #[error("Block {} is not the chain tip", short_hex(.block_hash))]
    NotTip { block_hash: Hash },

    #[error("Chain is empty")]
    Empty,
}

/// Errors raised while the chain tracker indexes or retires blocks.
///
/// Contained within the tracker: logged, counted, and retried at the same
/// height. Never surfaced to query callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("Rejected chain event: {0}")]
    Chain(#[from] ChainError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Storage error: {0}")]
    Storage(#[from] IndexStoreError),

    #[error("Block data error: {0}")]
    Data(#[from] DataError),
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("At least one filter type must be enabled")]
    NoFilterTypes,

    #[error("Filter type {0} enabled more than once")]
    DuplicateFilterType(FilterType),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<IndexStoreError> for QueryError {
    fn from(err: IndexStoreError) -> Self {
        QueryError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_messages_are_stable() {
        assert_eq!(QueryError::BlockNotFound.to_string(), "Block not found");
        assert_eq!(
            QueryError::InvalidFilterType(-1).to_string(),
            "unknown filter_type"
        );
        assert_eq!(
            QueryError::InvalidFilterType(2).to_string(),
            "unknown filter_type"
        );
    }

    #[test]
    fn test_backend_error_conversion() {
        let kv_err = KVStoreError::IOError {
            message: "disk failure".to_string(),
        };
        let store_err: IndexStoreError = kv_err.into();
        let query_err: QueryError = store_err.into();

        match query_err {
            QueryError::Storage(message) => assert!(message.contains("disk failure")),
            other => panic!("Expected Storage, got {:?}", other),
        }
    }

    #[test]
    fn test_codec_error_shows_short_hash() {
        let err = CodecError::MalformedBlock {
            block_hash: [0xAB; 32],
            reason: "no transactions",
        };
        assert_eq!(
            err.to_string(),
            "Malformed block abababababababab: no transactions"
        );
    }
}
