//! Events Layer - chain notifications consumed by the filter index

use shared_types::{Block, BlockRef};
use std::fmt;
use std::sync::Arc;

use crate::domain::ChainSnapshot;

/// Notification from the chain engine.
///
/// Delivered in chain order on a single channel; the chain tracker applies
/// them one at a time.
#[derive(Clone, Debug)]
pub enum ChainEvent {
    /// A block was appended to the active chain tip.
    Extended(Arc<Block>),
    /// The tip block left the active chain.
    Disconnected(BlockRef),
    /// A block joined the active chain during a reorganization.
    Reconnected(Arc<Block>),
    /// The chain engine hands over its whole active chain, replacing the
    /// tracked one (startup, or after missed notifications).
    Resync(Arc<ChainSnapshot>),
}

impl ChainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChainEvent::Extended(_) => "extended",
            ChainEvent::Disconnected(_) => "disconnected",
            ChainEvent::Reconnected(_) => "reconnected",
            ChainEvent::Resync(_) => "resync",
        }
    }
}

impl fmt::Display for ChainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainEvent::Extended(block) | ChainEvent::Reconnected(block) => {
                write!(f, "{} {}", self.kind(), block.block_ref())
            }
            ChainEvent::Disconnected(block_ref) => write!(f, "{} {}", self.kind(), block_ref),
            ChainEvent::Resync(snapshot) => match snapshot.tip() {
                Some(tip) => write!(f, "{} to {}", self.kind(), tip),
                None => write!(f, "{} to empty chain", self.kind()),
            },
        }
    }
}
