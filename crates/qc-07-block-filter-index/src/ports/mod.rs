//! Ports layer - trait definitions for hexagonal architecture

pub mod inbound;
pub mod outbound;

pub use inbound::BlockFilterApi;
pub use outbound::{BatchOperation, BlockSource, KeyValueStore};
