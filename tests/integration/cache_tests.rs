//! Store-level behavior tests: caching, concurrency, and pool recovery.
//!
//! These exercise the tile store through its public retrieval contract with
//! stub computers, verifying the properties the HTTP layer depends on:
//! repeated requests are served without recomputation, concurrent misses
//! agree on content, and a crashed worker does not take the service down.

use std::sync::Arc;

use rastile::raster::TileCoord;
use rastile::store::{
    ComputePool, CompressedTileCache, TileComputer, TileRequest, TileStore, WorkerPool,
};
use rastile::StoreError;

use super::test_utils::{CountingComputer, FlakyComputer};

fn make_store(computer: Arc<dyn TileComputer>, capacity: u64) -> TileStore {
    TileStore::new(
        Arc::new(CompressedTileCache::with_capacity(capacity, 9)),
        ComputePool::new(2, false),
        computer,
    )
}

fn make_request(name: &str, tile: Option<TileCoord>) -> TileRequest {
    let mut request = TileRequest::new(name, tile);
    request.size = (16, 16);
    request
}

// =============================================================================
// Caching Behavior
// =============================================================================

#[test]
fn test_identical_requests_compute_once() {
    let computer = Arc::new(CountingComputer::new(7.0));
    let store = make_store(Arc::clone(&computer) as Arc<dyn TileComputer>, 1 << 20);
    let request = make_request("a.tif", Some(TileCoord::new(3, 1, 2)));

    for _ in 0..5 {
        let tile = store.get_tile(request.clone()).unwrap();
        assert_eq!(tile.value_at(0), 7.0);
    }

    assert_eq!(computer.call_count(), 1);
    assert_eq!(store.cache_stats().entries, 1);
}

#[test]
fn test_distinct_coordinates_compute_separately() {
    let computer = Arc::new(CountingComputer::new(7.0));
    let store = make_store(Arc::clone(&computer) as Arc<dyn TileComputer>, 1 << 20);

    store
        .get_tile(make_request("a.tif", Some(TileCoord::new(1, 0, 0))))
        .unwrap();
    store
        .get_tile(make_request("a.tif", Some(TileCoord::new(1, 0, 1))))
        .unwrap();
    store.get_tile(make_request("a.tif", None)).unwrap();

    assert_eq!(computer.call_count(), 3);
    assert_eq!(store.cache_stats().entries, 3);
}

#[test]
fn test_resident_size_never_exceeds_capacity() {
    let computer = Arc::new(CountingComputer::new(7.0));
    // Room for only a handful of compressed 16x16 tiles
    let store = make_store(Arc::clone(&computer) as Arc<dyn TileComputer>, 256);

    for x in 0..20 {
        store
            .get_tile(make_request("a.tif", Some(TileCoord::new(5, x, 0))))
            .unwrap();
        let stats = store.cache_stats();
        assert!(
            stats.current_size_bytes <= stats.capacity_bytes,
            "resident {} exceeds capacity {}",
            stats.current_size_bytes,
            stats.capacity_bytes
        );
    }
}

#[test]
fn test_zero_capacity_cache_recomputes_every_request() {
    let computer = Arc::new(CountingComputer::new(7.0));
    let store = make_store(Arc::clone(&computer) as Arc<dyn TileComputer>, 0);
    let request = make_request("a.tif", None);

    store.get_tile(request.clone()).unwrap();
    store.get_tile(request).unwrap();

    assert_eq!(computer.call_count(), 2);
    assert_eq!(store.cache_stats().entries, 0);
}

// =============================================================================
// Concurrent Retrieval
// =============================================================================

#[tokio::test]
async fn test_concurrent_async_misses_agree_on_content() {
    let computer = Arc::new(CountingComputer::new(3.0));
    let store = Arc::new(make_store(
        Arc::clone(&computer) as Arc<dyn TileComputer>,
        1 << 20,
    ));
    let request = make_request("a.tif", Some(TileCoord::new(2, 1, 1)));

    // Submit both before either resolves, so both can miss
    let futures: Vec<_> = (0..4)
        .map(|_| store.lookup_or_submit(request.clone()).unwrap())
        .collect();

    let mut tiles = Vec::new();
    for future in futures {
        tiles.push(future.resolve().await.unwrap());
    }

    for tile in &tiles[1..] {
        assert_eq!(tile, &tiles[0]);
    }
    // Without in-flight coalescing anywhere from one to four computations ran
    let calls = computer.call_count();
    assert!((1..=4).contains(&calls), "got {} calls", calls);
}

#[tokio::test]
async fn test_hit_resolves_without_pool_interaction() {
    let computer = Arc::new(CountingComputer::new(3.0));
    let store = make_store(Arc::clone(&computer) as Arc<dyn TileComputer>, 1 << 20);
    let request = make_request("a.tif", None);

    store.lookup_or_submit(request.clone()).unwrap().resolve().await.unwrap();

    let hit = store.lookup_or_submit(request).unwrap();
    assert!(hit.is_ready());
    hit.resolve().await.unwrap();
    assert_eq!(computer.call_count(), 1);
}

// =============================================================================
// Pool Recovery
// =============================================================================

#[test]
fn test_worker_crash_recovers_on_next_request() {
    let computer = Arc::new(FlakyComputer::new());
    let store = make_store(Arc::clone(&computer) as Arc<dyn TileComputer>, 1 << 20);

    // First request dies with the worker
    let first = store.get_tile(make_request("a.tif", None));
    assert!(matches!(first, Err(StoreError::PoolBroken { .. })));

    // The pool restarts and the next request succeeds
    let second = store.get_tile(make_request("a.tif", None)).unwrap();
    assert_eq!(second.value_at(0), 1.0);
    assert_eq!(computer.call_count(), 2);
}

#[test]
fn test_unrecoverable_pool_propagates_instead_of_hanging() {
    // Every pool the factory produces rejects work
    let pool = ComputePool::with_factory(Arc::new(|| WorkerPool::new(0)));
    let store = TileStore::new(
        Arc::new(CompressedTileCache::with_capacity(1 << 20, 9)),
        pool,
        Arc::new(CountingComputer::new(1.0)),
    );

    let result = store.get_tile(make_request("a.tif", None));
    assert!(matches!(result, Err(StoreError::PoolBroken { .. })));
}

#[test]
fn test_shutdown_then_reuse_restarts_workers() {
    let computer = Arc::new(CountingComputer::new(5.0));
    let store = make_store(Arc::clone(&computer) as Arc<dyn TileComputer>, 1 << 20);

    store.get_tile(make_request("a.tif", None)).unwrap();
    store.shutdown();

    let tile = store
        .get_tile(make_request("b.tif", None))
        .unwrap();
    assert_eq!(tile.value_at(0), 5.0);
}
