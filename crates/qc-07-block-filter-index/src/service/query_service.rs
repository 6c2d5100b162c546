//! # Query Service
//!
//! Read-only point lookups of block filters.
//!
//! Arguments are validated before storage is touched, in a fixed order:
//! the block hash against the current chain snapshot, then the filter type
//! against the registered types. Only then is the index store (or the read
//! cache) consulted.

use lru::LruCache;
use parking_lot::Mutex;
use shared_types::{short_hex, Hash};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{FilterIndexConfig, FilterType, IndexStatus};
use crate::error::QueryError;
use crate::metrics::IndexMetrics;
use crate::ports::inbound::BlockFilterApi;
use crate::ports::outbound::KeyValueStore;
use crate::service::chain_tracker::TrackerChannels;
use crate::service::index_store::FilterIndexStore;

type CacheKey = (FilterType, Hash);

/// Serves `getblockfilter` lookups.
pub struct QueryService<S: KeyValueStore> {
    store: Arc<FilterIndexStore<S>>,
    channels: TrackerChannels,
    /// Encoded filters of indexed blocks. A filter is a pure function of its
    /// block, so an entry stays valid for as long as the block is active.
    cache: Option<Mutex<LruCache<CacheKey, Vec<u8>>>>,
    metrics: Arc<IndexMetrics>,
}

impl<S: KeyValueStore> QueryService<S> {
    pub fn new(
        store: Arc<FilterIndexStore<S>>,
        channels: TrackerChannels,
        config: &FilterIndexConfig,
        metrics: Arc<IndexMetrics>,
    ) -> Self {
        let cache = NonZeroUsize::new(config.query_cache_size).map(|cap| Mutex::new(LruCache::new(cap)));
        Self {
            store,
            channels,
            cache,
            metrics,
        }
    }

    fn lookup(&self, block_hash: &Hash, raw_type: i64) -> Result<(Vec<u8>, bool), QueryError> {
        // One snapshot per call; the tracker may publish a newer one meanwhile.
        let chain = Arc::clone(&*self.channels.chain.borrow());
        let height = chain.resolve(block_hash).ok_or(QueryError::BlockNotFound)?;

        let filter_type =
            FilterType::try_from(raw_type).map_err(|e| QueryError::InvalidFilterType(e.0))?;
        let best_height = self
            .channels
            .status
            .borrow()
            .type_status(filter_type)
            .map(|status| status.best_height)
            .ok_or(QueryError::InvalidFilterType(raw_type))?;

        let indexed = best_height.is_some_and(|best| height <= best);
        let key = (filter_type, *block_hash);

        if indexed {
            if let Some(cache) = &self.cache {
                if let Some(filter) = cache.lock().get(&key) {
                    return Ok((filter.clone(), true));
                }
            }
        }

        match self.store.get(filter_type, block_hash)? {
            Some(filter) => {
                if indexed {
                    if let Some(cache) = &self.cache {
                        cache.lock().put(key, filter.clone());
                    }
                }
                Ok((filter, false))
            }
            None => {
                if indexed {
                    warn!(
                        filter_type = %filter_type,
                        height,
                        block_hash = %short_hex(block_hash),
                        best_height = ?best_height,
                        "Filter missing below best indexed height"
                    );
                }
                Err(QueryError::FilterNotFound {
                    block_hash: *block_hash,
                    filter_type,
                })
            }
        }
    }
}

impl<S: KeyValueStore> BlockFilterApi for QueryService<S> {
    fn get_block_filter(&self, block_hash: &Hash, filter_type: i64) -> Result<Vec<u8>, QueryError> {
        let result = self.lookup(block_hash, filter_type);
        match &result {
            Ok((_, cache_hit)) => self.metrics.record_query(true, *cache_hit),
            Err(err) => {
                self.metrics.record_query(false, false);
                debug!(
                    block_hash = %short_hex(block_hash),
                    filter_type,
                    error = %err,
                    "Block filter query failed"
                );
            }
        }
        result.map(|(filter, _)| filter)
    }

    fn index_status(&self) -> IndexStatus {
        self.channels.status.borrow().clone()
    }
}
