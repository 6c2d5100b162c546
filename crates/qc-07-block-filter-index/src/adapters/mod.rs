//! Adapters Layer
//!
//! ## Adapters
//!
//! - `storage` - `KeyValueStore` backends (in-memory, RocksDB behind the
//!   `rocksdb` feature)
//! - `ChainEventListener` - Feeds chain engine events to the tracker
//! - `RpcHandler` - `getblockfilter` JSON boundary

pub mod chain_events;
pub mod rpc;
pub mod storage;

pub use chain_events::{event_channel, ChainEventListener};
pub use rpc::{RpcError, RpcHandler};
pub use storage::InMemoryKVStore;
