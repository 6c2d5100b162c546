//! Service Layer
//!
//! The index store, the chain tracker that writes it, and the query service
//! that reads it.

pub mod chain_tracker;
pub mod index_store;
pub mod query_service;

pub use chain_tracker::{ChainTracker, TrackerChannels};
pub use index_store::{FilterIndexStore, StoredFilter};
pub use query_service::QueryService;
