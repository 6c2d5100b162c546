//! Domain layer for the Block Filter Index
//!
//! Pure logic, no I/O: filter construction, chain snapshots, and
//! configuration.

pub mod block_filter;
pub mod chain;
pub mod config;
pub mod filter_type;
pub mod gcs_filter;
pub mod index_state;

pub use block_filter::{compute_filter, BlockFilter};
pub use chain::{ChainDiff, ChainSnapshot};
pub use config::{FilterIndexConfig, FilterIndexConfigBuilder};
pub use filter_type::{FilterType, UnknownFilterType, BASIC_FILTER_P, EXTENDED_FILTER_P};
pub use gcs_filter::{Element, ElementSet, GcsFilter, MAX_ELEMENTS};
pub use index_state::{IndexStatus, IndexTip, TrackerState, TypeStatus};
