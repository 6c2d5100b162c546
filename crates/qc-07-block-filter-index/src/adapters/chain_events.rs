//! Chain event listener
//!
//! Owns the chain tracker and feeds it from the chain engine's event
//! channel, strictly one event at a time. A retry tick re-attempts stalled
//! indexing when no events arrive.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::domain::FilterIndexConfig;
use crate::events::ChainEvent;
use crate::ports::outbound::{BlockSource, KeyValueStore};
use crate::service::chain_tracker::ChainTracker;

/// Bounded channel for chain events, sized from the config.
pub fn event_channel(
    config: &FilterIndexConfig,
) -> (mpsc::Sender<ChainEvent>, mpsc::Receiver<ChainEvent>) {
    mpsc::channel(config.event_channel_capacity)
}

/// Sequential consumer of chain events.
pub struct ChainEventListener<S: KeyValueStore, B: BlockSource> {
    tracker: ChainTracker<S, B>,
    events: mpsc::Receiver<ChainEvent>,
    retry_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<S: KeyValueStore, B: BlockSource> ChainEventListener<S, B> {
    pub fn new(
        tracker: ChainTracker<S, B>,
        events: mpsc::Receiver<ChainEvent>,
        config: &FilterIndexConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            tracker,
            events,
            retry_interval: config.retry_interval(),
            shutdown,
        }
    }

    /// Run until the event channel closes or shutdown is signalled.
    /// Returns the tracker so the caller can inspect or persist its state.
    pub async fn run(mut self) -> ChainTracker<S, B> {
        info!(retry_interval = ?self.retry_interval, "[qc-07] Filter index listener started");

        let mut retry = tokio::time::interval(self.retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        retry.tick().await;

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        let kind = event.kind();
                        if let Err(err) = self.tracker.handle_event(event) {
                            warn!(event = kind, error = %err, "Rejected chain event");
                        }
                    }
                    None => {
                        info!("[qc-07] Chain event channel closed, stopping");
                        break;
                    }
                },
                _ = retry.tick() => self.tracker.retry_pending(),
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("[qc-07] Shutdown signal received");
                        break;
                    }
                }
            }
        }

        self.tracker
    }
}
