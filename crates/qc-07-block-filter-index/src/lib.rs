//! # QC-07 Block Filter Index
//!
//! Compact block filters for light clients: a Golomb-coded set (GCS) per
//! block and filter type, kept in step with the active chain and served by
//! block hash.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `GcsFilter`: Golomb-Rice coded set with SipHash-2-4 hashing
//!   - `BlockFilter` / `compute_filter`: Element extraction per filter type
//!   - `ChainSnapshot`: Immutable view of the active chain
//!   - `FilterIndexConfig`: Configuration with validation
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `BlockFilterApi`: Driving port (query API)
//!   - `BlockSource`: Driven port (full blocks from the chain engine)
//!   - `KeyValueStore`: Driven port (persistence)
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `FilterIndexStore`: Filter entries and best height per type
//!   - `ChainTracker`: Applies chain events, the only writer
//!   - `QueryService`: Implements `BlockFilterApi`
//!
//! - **Events Layer** (`events/`): Chain engine notifications
//!
//! - **Adapters Layer** (`adapters/`): External connections
//!   - `ChainEventListener`: Async event loop around the tracker
//!   - `RpcHandler`: `getblockfilter` JSON boundary
//!   - `InMemoryKVStore` / `RocksDbStore`: Storage backends
//!
//! ## Invariants
//!
//! - **Determinism**: A filter is a pure function of block content and
//!   filter type.
//! - **Contiguity**: Per type, indexed blocks form a prefix of the active
//!   chain with no gaps.
//! - **Atomic commit**: An entry and its best height are written together.
//! - **Orphan invisibility**: A block off the active chain is never served.
//!
//! ## Usage Example
//!
//! ```ignore
//! use qc_07_block_filter_index::{
//!     event_channel, ChainEventListener, ChainTracker, FilterIndexConfig,
//!     FilterIndexStore, IndexMetrics, InMemoryKVStore, QueryService, RpcHandler,
//! };
//! use std::sync::Arc;
//!
//! let config = FilterIndexConfig::default();
//! let store = Arc::new(FilterIndexStore::new(InMemoryKVStore::new()));
//! let metrics = Arc::new(IndexMetrics::new());
//!
//! let mut tracker = ChainTracker::new(store.clone(), block_source, &config, metrics.clone());
//! tracker.recover(active_chain)?;
//!
//! let service = QueryService::new(store, tracker.subscribe(), &config, metrics);
//! let rpc = RpcHandler::new(Arc::new(service));
//!
//! let (events_tx, events_rx) = event_channel(&config);
//! tokio::spawn(ChainEventListener::new(tracker, events_rx, &config, shutdown_rx).run());
//!
//! let reply = rpc.handle("getblockfilter", &serde_json::json!([block_hash_hex, 0]))?;
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports for convenience
pub use adapters::{event_channel, ChainEventListener, InMemoryKVStore, RpcError, RpcHandler};
pub use domain::{
    compute_filter, BlockFilter, ChainSnapshot, FilterIndexConfig, FilterIndexConfigBuilder,
    FilterType, GcsFilter, IndexStatus, IndexTip, TrackerState,
};
pub use error::{CodecError, ConfigError, DataError, QueryError, TrackerError};
pub use events::ChainEvent;
pub use metrics::{IndexMetrics, MetricsSnapshot};
pub use ports::{BlockFilterApi, BlockSource, KeyValueStore};
pub use service::{ChainTracker, FilterIndexStore, QueryService, TrackerChannels};

#[cfg(feature = "rocksdb")]
pub use adapters::storage::{RocksDbConfig, RocksDbStore};
