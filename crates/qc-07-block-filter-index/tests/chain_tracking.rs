//! # Chain Tracking Integration Tests
//!
//! Reorganizations, restarts, and indexing failures as seen from the query
//! side.
//!
//! ## Test Categories
//!
//! 1. **Reorgs** - Event-driven and resync, through the async listener
//! 2. **Restart** - Persisted progress survives and is repaired
//! 3. **Failures** - Stalled types keep serving what they have

use qc_07_block_filter_index::test_utils::{MockBlockSource, TestChain};
use qc_07_block_filter_index::{
    compute_filter, event_channel, BlockFilterApi, ChainEvent, ChainEventListener, ChainSnapshot,
    ChainTracker, FilterIndexConfig, FilterIndexConfigBuilder, FilterIndexStore, FilterType,
    IndexMetrics, InMemoryKVStore, QueryError, QueryService, TrackerState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

// =============================================================================
// TEST HELPERS
// =============================================================================

type Store = Arc<FilterIndexStore<InMemoryKVStore>>;

fn new_store() -> Store {
    Arc::new(FilterIndexStore::new(InMemoryKVStore::new()))
}

fn new_tracker(
    store: &Store,
    source: MockBlockSource,
    config: &FilterIndexConfig,
    active: ChainSnapshot,
) -> ChainTracker<InMemoryKVStore, MockBlockSource> {
    let mut tracker = ChainTracker::new(
        Arc::clone(store),
        source,
        config,
        Arc::new(IndexMetrics::new()),
    );
    tracker.recover(active).unwrap();
    tracker
}

fn service_for(
    store: &Store,
    tracker: &ChainTracker<InMemoryKVStore, MockBlockSource>,
    config: &FilterIndexConfig,
) -> QueryService<InMemoryKVStore> {
    QueryService::new(
        Arc::clone(store),
        tracker.subscribe(),
        config,
        Arc::new(IndexMetrics::new()),
    )
}

fn assert_serves_chain(service: &QueryService<InMemoryKVStore>, chain: &TestChain) {
    for height in 0..chain.len() {
        for filter_type in FilterType::ALL {
            let filter = service
                .get_block_filter(&chain.hash(height), i64::from(filter_type.as_u8()))
                .unwrap();
            assert_eq!(
                filter,
                compute_filter(&chain.block(height), filter_type).unwrap()
            );
        }
    }
}

// =============================================================================
// REORGS
// =============================================================================

#[tokio::test]
async fn test_reorg_at_height_three_through_listener() {
    let config = FilterIndexConfig::default();
    let chain = TestChain::new(5);
    let fork = chain.fork(2, 3, 6);
    let store = new_store();
    let tracker = new_tracker(&store, MockBlockSource::new(), &config, ChainSnapshot::new());
    let service = service_for(&store, &tracker, &config);

    let (tx, rx) = event_channel(&config);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = tokio::spawn(ChainEventListener::new(tracker, rx, &config, shutdown_rx).run());

    for block in chain.blocks() {
        tx.send(ChainEvent::Extended(block)).await.unwrap();
    }
    for height in (3..5).rev() {
        tx.send(ChainEvent::Disconnected(chain.block(height).block_ref()))
            .await
            .unwrap();
    }
    for height in 3..6 {
        tx.send(ChainEvent::Reconnected(fork.block(height)))
            .await
            .unwrap();
    }
    drop(tx);
    let tracker = listener.await.unwrap();

    assert_eq!(tracker.chain().tip(), Some(fork.tip().block_ref()));
    assert_serves_chain(&service, &fork);
    for height in 3..5 {
        assert_eq!(
            service.get_block_filter(&chain.hash(height), 0),
            Err(QueryError::BlockNotFound)
        );
        assert!(!store.contains(FilterType::Basic, &chain.hash(height)).unwrap());
    }
}

#[test]
fn test_resync_to_longer_fork() {
    let config = FilterIndexConfig::default();
    let chain = TestChain::new(6);
    let fork = chain.fork(3, 4, 2);
    let source = MockBlockSource::with_chain(&fork);
    let store = new_store();
    let mut tracker = new_tracker(&store, source, &config, ChainSnapshot::new());
    let service = service_for(&store, &tracker, &config);

    for block in chain.blocks() {
        tracker.handle_event(ChainEvent::Extended(block)).unwrap();
    }
    tracker
        .handle_event(ChainEvent::Resync(Arc::new(fork.snapshot())))
        .unwrap();

    assert_serves_chain(&service, &fork);
    assert_eq!(
        service.get_block_filter(&chain.hash(5), 1),
        Err(QueryError::BlockNotFound)
    );
}

// =============================================================================
// RESTART
// =============================================================================

#[test]
fn test_restart_resumes_from_persisted_height() {
    let config = FilterIndexConfig::default();
    let mut chain = TestChain::new(4);
    let store = new_store();

    {
        let mut tracker = new_tracker(&store, MockBlockSource::new(), &config, ChainSnapshot::new());
        for block in chain.blocks() {
            tracker.handle_event(ChainEvent::Extended(block)).unwrap();
        }
    }

    // Chain grew by three blocks while the index was offline
    chain.extend(3, 0);
    let tracker = new_tracker(
        &store,
        MockBlockSource::with_chain(&chain),
        &config,
        chain.snapshot(),
    );

    for filter_type in FilterType::ALL {
        assert_eq!(store.get_best_height(filter_type).unwrap(), Some(6));
        assert_eq!(tracker.state(filter_type), Some(TrackerState::Synced));
    }
    assert_serves_chain(&service_for(&store, &tracker, &config), &chain);
}

#[test]
fn test_restart_after_offline_reorg() {
    let config = FilterIndexConfig::default();
    let chain = TestChain::new(6);
    let fork = chain.fork(1, 3, 5);
    let store = new_store();

    {
        let mut tracker = new_tracker(&store, MockBlockSource::new(), &config, ChainSnapshot::new());
        for block in chain.blocks() {
            tracker.handle_event(ChainEvent::Extended(block)).unwrap();
        }
    }

    let tracker = new_tracker(
        &store,
        MockBlockSource::with_chain(&fork),
        &config,
        fork.snapshot(),
    );

    for filter_type in FilterType::ALL {
        assert_eq!(store.get_best_height(filter_type).unwrap(), Some(4));
        let entries = store.entries(filter_type).unwrap();
        assert_eq!(entries.len(), 5);
        assert!(entries.iter().all(|(hash, _)| fork.snapshot().contains(hash)));
    }
    assert_serves_chain(&service_for(&store, &tracker, &config), &fork);
}

// =============================================================================
// FAILURES
// =============================================================================

#[test]
fn test_codec_failure_serves_prefix_then_recovers() {
    let config = FilterIndexConfig::default();
    let chain = TestChain::new(5);
    let source = MockBlockSource::with_chain(&chain);
    source.corrupt(chain.hash(3));
    let store = new_store();
    let mut tracker = new_tracker(&store, source.clone(), &config, ChainSnapshot::new());
    let service = service_for(&store, &tracker, &config);

    tracker
        .handle_event(ChainEvent::Resync(Arc::new(chain.snapshot())))
        .unwrap();

    assert!(service.get_block_filter(&chain.hash(2), 0).is_ok());
    for height in 3..5 {
        assert_eq!(
            service.get_block_filter(&chain.hash(height), 0),
            Err(QueryError::FilterNotFound {
                block_hash: chain.hash(height),
                filter_type: FilterType::Basic,
            })
        );
    }
    assert_eq!(tracker.state(FilterType::Basic), Some(TrackerState::Behind));

    source.repair(&chain.hash(3));
    tracker.retry_pending();

    assert_serves_chain(&service, &chain);
}

#[tokio::test]
async fn test_listener_retries_unavailable_source() {
    let config = FilterIndexConfigBuilder::new()
        .retry_interval(Duration::from_millis(10))
        .build()
        .unwrap();
    let chain = TestChain::new(4);
    let source = MockBlockSource::with_chain(&chain);
    source.set_unavailable(true);
    let store = new_store();
    let tracker = new_tracker(&store, source.clone(), &config, ChainSnapshot::new());
    let service = service_for(&store, &tracker, &config);

    let (tx, rx) = event_channel(&config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = tokio::spawn(ChainEventListener::new(tracker, rx, &config, shutdown_rx).run());

    tx.send(ChainEvent::Resync(Arc::new(chain.snapshot())))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(matches!(
        service.get_block_filter(&chain.hash(0), 0),
        Err(QueryError::FilterNotFound { .. })
    ));

    source.set_unavailable(false);
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();
    listener.await.unwrap();

    assert_serves_chain(&service, &chain);
}
