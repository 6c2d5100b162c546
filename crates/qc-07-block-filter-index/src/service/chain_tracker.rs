//! # Chain Tracker
//!
//! Keeps the filter index in step with the active chain. The tracker is the
//! only writer to the index store and consumes chain events one at a time.
//!
//! ## Rules
//!
//! - Blocks are indexed per filter type in strictly ascending height, each
//!   with one atomic commit of entry plus best height. A type never skips a
//!   height, so coverage is always a contiguous prefix of the active chain.
//! - A disconnected tip is retired for every type before anything is
//!   indexed on the new branch.
//! - Codec, storage, and block source failures stop that type at the failing
//!   height. They are logged and counted, never surfaced to queries, and
//!   retried from the same height on every event and on the retry timer.
//!
//! ## Publication
//!
//! Each new active chain is published as an `Arc<ChainSnapshot>` on a watch
//! channel before any indexing for it starts. Per-type progress is published
//! as an `IndexStatus` after every event.

use shared_types::{short_hex, Block, BlockRef, Hash, ZERO_HASH};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::{
    compute_filter, ChainSnapshot, FilterIndexConfig, FilterType, IndexStatus, IndexTip,
    TrackerState, TypeStatus,
};
use crate::error::{ChainError, CodecError, DataError, TrackerError};
use crate::events::ChainEvent;
use crate::metrics::IndexMetrics;
use crate::ports::outbound::{BlockSource, KeyValueStore};
use crate::service::index_store::FilterIndexStore;

/// Read side of the tracker's published state.
#[derive(Clone)]
pub struct TrackerChannels {
    pub chain: watch::Receiver<Arc<ChainSnapshot>>,
    pub status: watch::Receiver<IndexStatus>,
}

/// Drives the index store from chain events.
pub struct ChainTracker<S: KeyValueStore, B: BlockSource> {
    store: Arc<FilterIndexStore<S>>,
    blocks: B,
    /// Best indexed block per registered type
    types: BTreeMap<FilterType, Option<IndexTip>>,
    chain: Arc<ChainSnapshot>,
    chain_tx: watch::Sender<Arc<ChainSnapshot>>,
    status_tx: watch::Sender<IndexStatus>,
    metrics: Arc<IndexMetrics>,
}

impl<S: KeyValueStore, B: BlockSource> ChainTracker<S, B> {
    /// Create a tracker for the filter types enabled in `config`.
    ///
    /// Call [`ChainTracker::recover`] before applying events so that the
    /// persisted progress is loaded.
    pub fn new(
        store: Arc<FilterIndexStore<S>>,
        blocks: B,
        config: &FilterIndexConfig,
        metrics: Arc<IndexMetrics>,
    ) -> Self {
        let chain = Arc::new(ChainSnapshot::new());
        let (chain_tx, _) = watch::channel(Arc::clone(&chain));
        let (status_tx, _) = watch::channel(IndexStatus {
            tip: None,
            types: Vec::new(),
        });

        let tracker = Self {
            store,
            blocks,
            types: config.filter_types.iter().map(|t| (*t, None)).collect(),
            chain,
            chain_tx,
            status_tx,
            metrics,
        };
        tracker.publish_status();
        tracker
    }

    pub fn subscribe(&self) -> TrackerChannels {
        TrackerChannels {
            chain: self.chain_tx.subscribe(),
            status: self.status_tx.subscribe(),
        }
    }

    pub fn chain(&self) -> Arc<ChainSnapshot> {
        Arc::clone(&self.chain)
    }

    pub fn best_tip(&self, filter_type: FilterType) -> Option<IndexTip> {
        self.types.get(&filter_type).copied().flatten()
    }

    pub fn state(&self, filter_type: FilterType) -> Option<TrackerState> {
        self.types
            .get(&filter_type)
            .map(|tip| derive_state(*tip, &self.chain))
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            tip: self.chain.tip(),
            types: self
                .types
                .iter()
                .map(|(filter_type, tip)| TypeStatus {
                    filter_type: *filter_type,
                    state: derive_state(*tip, &self.chain),
                    best_height: tip.map(|t| t.height),
                })
                .collect(),
        }
    }

    /// Startup: adopt the chain engine's active chain, load each type's
    /// persisted best block, repair any that left the active chain while
    /// the node was down, and catch up.
    pub fn recover(&mut self, chain: ChainSnapshot) -> Result<(), TrackerError> {
        self.set_chain(chain);

        for filter_type in self.type_list() {
            let tip = self.store.get_index_tip(filter_type)?;
            info!(
                filter_type = %filter_type,
                best_height = ?tip.map(|t| t.height),
                "Loaded persisted filter index tip"
            );
            self.types.insert(filter_type, tip);
        }

        self.retry_pending();
        Ok(())
    }

    /// Add a filter type at runtime. It is backfilled from its persisted
    /// best block (or genesis) through the regular catch-up path.
    pub fn register_type(&mut self, filter_type: FilterType) -> Result<(), TrackerError> {
        if self.types.contains_key(&filter_type) {
            return Ok(());
        }

        let tip = self.store.get_index_tip(filter_type)?;
        self.types.insert(filter_type, tip);
        info!(
            filter_type = %filter_type,
            from_height = tip.map_or(0, |t| t.height + 1),
            "Registered filter type, backfilling"
        );

        self.catch_up_contained(filter_type, None);
        self.publish_status();
        Ok(())
    }

    /// Apply one chain event, then retry any stalled type.
    ///
    /// An `Err` means the event itself was rejected (it does not fit the
    /// tracked chain) and nothing was applied. Indexing failures are
    /// contained and do not produce an `Err`.
    pub fn handle_event(&mut self, event: ChainEvent) -> Result<(), TrackerError> {
        debug!(event = %event, "Applying chain event");

        let result = match &event {
            ChainEvent::Extended(block) | ChainEvent::Reconnected(block) => self.connect(block),
            ChainEvent::Disconnected(block_ref) => self.disconnect(*block_ref),
            ChainEvent::Resync(snapshot) => self.resync(snapshot),
        };

        self.retry_pending();
        result
    }

    /// Retry every type that is not synced with the active chain.
    pub fn retry_pending(&mut self) {
        for filter_type in self.type_list() {
            if self.state(filter_type) != Some(TrackerState::Synced) {
                self.catch_up_contained(filter_type, None);
            }
        }
        self.publish_status();
    }

    fn connect(&mut self, block: &Block) -> Result<(), TrackerError> {
        let next = self.chain.extend(block)?;
        self.set_chain(next);

        for filter_type in self.type_list() {
            self.catch_up_contained(filter_type, Some(block));
        }
        Ok(())
    }

    fn disconnect(&mut self, block_ref: BlockRef) -> Result<(), TrackerError> {
        let next = self.chain.without_tip(&block_ref.hash)?;
        let retired = self.chain.tip().ok_or(ChainError::Empty)?;
        let parent_hash = next.tip().map_or(ZERO_HASH, |tip| tip.hash);
        self.set_chain(next);

        for filter_type in self.type_list() {
            match self.store.retire_block(filter_type, retired, parent_hash) {
                Ok(new_tip) => {
                    self.types.insert(filter_type, new_tip);
                    self.metrics.record_blocks_retired(1);
                }
                Err(err) => {
                    self.record_failure(filter_type, retired.height, &TrackerError::from(err))
                }
            }
        }

        info!(block = %retired, "Disconnected block from filter index");
        Ok(())
    }

    fn resync(&mut self, target: &ChainSnapshot) -> Result<(), TrackerError> {
        let diff = self.chain.diff(target);
        if diff.is_empty() {
            return Ok(());
        }

        info!(
            disconnect = diff.disconnected.len(),
            connect = diff.connected.len(),
            tip = ?target.tip().map(|t| t.to_string()),
            "Resyncing filter index to new active chain"
        );

        for block_ref in diff.disconnected {
            self.disconnect(block_ref)?;
        }

        // Connected blocks are indexed ascending by the catch-up below
        self.set_chain(target.clone());
        for filter_type in self.type_list() {
            self.catch_up_contained(filter_type, None);
        }
        Ok(())
    }

    fn catch_up_contained(&mut self, filter_type: FilterType, event_block: Option<&Block>) {
        if let Err(err) = self.catch_up(filter_type, event_block) {
            let height = self.next_height(filter_type);
            self.record_failure(filter_type, height, &err);
        }
    }

    /// Index every active block above the type's best height.
    fn catch_up(
        &mut self,
        filter_type: FilterType,
        event_block: Option<&Block>,
    ) -> Result<(), TrackerError> {
        self.reconcile(filter_type)?;

        let Some(chain_tip) = self.chain.tip() else {
            return Ok(());
        };

        loop {
            let next = self.next_height(filter_type);
            if next > chain_tip.height {
                return Ok(());
            }
            let Some(block_ref) = self.chain.block_ref_at(next) else {
                return Ok(());
            };
            self.index_block(filter_type, block_ref, event_block)?;
        }
    }

    fn index_block(
        &mut self,
        filter_type: FilterType,
        block_ref: BlockRef,
        event_block: Option<&Block>,
    ) -> Result<(), TrackerError> {
        let started = Instant::now();

        let fetched;
        let block = match event_block.filter(|b| b.hash() == block_ref.hash) {
            Some(block) => block,
            None => {
                fetched = self.fetch_block(&block_ref.hash)?;
                &fetched
            }
        };

        if block.height() != block_ref.height {
            return Err(CodecError::MalformedBlock {
                block_hash: block_ref.hash,
                reason: "header height does not match chain position",
            }
            .into());
        }

        let filter = compute_filter(block, filter_type)?;
        self.store.commit_block(filter_type, block_ref, &filter)?;
        self.types.insert(filter_type, Some(block_ref.into()));
        self.metrics.record_block_indexed(started.elapsed());

        debug!(
            filter_type = %filter_type,
            block = %block_ref,
            filter_len = filter.len(),
            "Indexed block"
        );
        Ok(())
    }

    /// If the type's best block is no longer on the active chain, rewind it
    /// to the highest active block that has a stored entry and drop entries
    /// of blocks that left the chain.
    fn reconcile(&mut self, filter_type: FilterType) -> Result<(), TrackerError> {
        let Some(stale) = self.best_tip(filter_type) else {
            return Ok(());
        };
        if self.chain.hash_at(stale.height) == Some(stale.hash) {
            return Ok(());
        }

        let mut resume = None;
        if let Some(top) = self.chain.height().map(|h| h.min(stale.height)) {
            for height in (0..=top).rev() {
                let Some(hash) = self.chain.hash_at(height) else {
                    continue;
                };
                if self.store.contains(filter_type, &hash)? {
                    resume = Some(IndexTip::new(height, hash));
                    break;
                }
            }
        }

        let mut pruned = 0u64;
        for (hash, _) in self.store.entries(filter_type)? {
            if !self.chain.contains(&hash) {
                self.store.remove(filter_type, &hash)?;
                pruned += 1;
            }
        }

        self.store.set_best_height(filter_type, resume)?;
        self.types.insert(filter_type, resume);
        self.metrics.record_blocks_retired(pruned);

        info!(
            filter_type = %filter_type,
            stale_height = stale.height,
            stale_hash = %short_hex(&stale.hash),
            resume_height = ?resume.map(|t| t.height),
            pruned,
            "Rewound filter index to active chain"
        );
        Ok(())
    }

    fn fetch_block(&self, hash: &Hash) -> Result<Block, DataError> {
        let block = self
            .blocks
            .block_by_hash(hash)?
            .ok_or(DataError::BlockNotFound { hash: *hash })?;

        if block.hash() != *hash {
            return Err(DataError::Unavailable(format!(
                "source returned block {} for {}",
                short_hex(&block.hash()),
                short_hex(hash)
            )));
        }
        Ok(block)
    }

    fn record_failure(&self, filter_type: FilterType, height: u64, err: &TrackerError) {
        match err {
            TrackerError::Codec(_) => self.metrics.record_codec_failure(),
            TrackerError::Storage(_) => self.metrics.record_storage_failure(),
            TrackerError::Data(_) => self.metrics.record_source_failure(),
            TrackerError::Chain(_) => {}
        }
        warn!(
            filter_type = %filter_type,
            height,
            error = %err,
            "Filter indexing stalled, will retry"
        );
    }

    fn next_height(&self, filter_type: FilterType) -> u64 {
        self.best_tip(filter_type).map_or(0, |tip| tip.height + 1)
    }

    fn type_list(&self) -> Vec<FilterType> {
        self.types.keys().copied().collect()
    }

    fn set_chain(&mut self, chain: ChainSnapshot) {
        self.chain = Arc::new(chain);
        self.chain_tx.send_replace(Arc::clone(&self.chain));
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.status());
    }
}

fn derive_state(tip: Option<IndexTip>, chain: &ChainSnapshot) -> TrackerState {
    match (tip, chain.tip()) {
        (None, None) => TrackerState::Uninitialized,
        (Some(tip), _) if chain.hash_at(tip.height) != Some(tip.hash) => TrackerState::Reorging,
        (Some(tip), Some(chain_tip)) if tip.height == chain_tip.height => TrackerState::Synced,
        _ => TrackerState::Behind,
    }
}
