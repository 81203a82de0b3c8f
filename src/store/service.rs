//! Tile store: cache lookup in front of pooled computation.
//!
//! [`TileStore`] is the single entry point for tile access. A request is
//! validated, normalized into a [`CacheKey`], and answered from the
//! compressed cache when possible. On a miss the computation is submitted
//! to the worker pool and the caller receives a [`TileFuture`]; the worker
//! inserts the finished tile into the cache before completing the future,
//! so a resumed waiter always finds its tile resident.
//!
//! Failed computations complete the future with the error and cache
//! nothing, so the next request for that key computes again.
//!
//! Duplicate in-flight requests are not coalesced. Two misses for the same
//! key both compute; the second insert replaces the first byte-for-byte
//! identical payload, which is cheaper than tracking in-flight work and
//! keeps this layer free of cross-request bookkeeping.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{ComputeError, StoreError};
use crate::raster::MaskedTile;
use crate::store::cache::{CacheStats, CompressedTileCache};
use crate::store::key::{CacheKey, TileRequest};
use crate::store::pool::ComputePool;

// =============================================================================
// Computer Seam
// =============================================================================

/// Produces tile content for a request. Implementations run on pool worker
/// threads and must be shareable across them.
pub trait TileComputer: Send + Sync {
    fn compute(&self, request: &TileRequest) -> Result<MaskedTile, ComputeError>;
}

// =============================================================================
// Tile Future
// =============================================================================

/// A tile that is either already resident or being computed.
pub enum TileFuture {
    /// Served from the cache
    Ready(MaskedTile),
    /// Scheduled on the worker pool
    Pending(oneshot::Receiver<Result<MaskedTile, StoreError>>),
}

impl TileFuture {
    /// Whether the tile was already resident when the request was made.
    pub fn is_ready(&self) -> bool {
        matches!(self, TileFuture::Ready(_))
    }

    /// Await the tile from an async context.
    pub async fn resolve(self) -> Result<MaskedTile, StoreError> {
        match self {
            TileFuture::Ready(tile) => Ok(tile),
            TileFuture::Pending(receiver) => match receiver.await {
                Ok(result) => result,
                Err(_) => Err(abandoned()),
            },
        }
    }

    /// Block until the tile is available.
    ///
    /// Must not be called from an async context; use [`TileFuture::resolve`]
    /// there instead.
    pub fn wait(self) -> Result<MaskedTile, StoreError> {
        match self {
            TileFuture::Ready(tile) => Ok(tile),
            TileFuture::Pending(receiver) => match receiver.blocking_recv() {
                Ok(result) => result,
                Err(_) => Err(abandoned()),
            },
        }
    }
}

/// The worker dropped the result channel without completing the tile.
fn abandoned() -> StoreError {
    StoreError::PoolBroken {
        message: "worker terminated before completing the tile".to_string(),
    }
}

// =============================================================================
// Tile Store
// =============================================================================

/// Cache-fronted tile access over a bounded compute pool.
pub struct TileStore {
    cache: Arc<CompressedTileCache>,
    pool: ComputePool,
    computer: Arc<dyn TileComputer>,
}

impl TileStore {
    pub fn new(
        cache: Arc<CompressedTileCache>,
        pool: ComputePool,
        computer: Arc<dyn TileComputer>,
    ) -> Self {
        Self {
            cache,
            pool,
            computer,
        }
    }

    /// Answer a request from the cache, or schedule its computation.
    ///
    /// Validation and submission failures surface here; a returned
    /// [`TileFuture`] always corresponds to an addressable tile.
    pub fn lookup_or_submit(&self, request: TileRequest) -> Result<TileFuture, StoreError> {
        request.validate()?;
        let key = CacheKey::for_request(&request);

        if let Some(tile) = self.cache.get(&key) {
            debug!(key = %key, "tile cache hit");
            return Ok(TileFuture::Ready(tile));
        }
        debug!(key = %key, "tile cache miss, scheduling computation");

        let (sender, receiver) = oneshot::channel();
        let cache = Arc::clone(&self.cache);
        let computer = Arc::clone(&self.computer);
        self.pool.submit(Box::new(move || {
            let result = computer.compute(&request).map_err(StoreError::from);
            if let Ok(tile) = &result {
                // Insert before completing so the waiter finds it resident;
                // an oversized tile is simply not cached.
                cache.put(key, tile);
            }
            let _ = sender.send(result);
        }))?;

        Ok(TileFuture::Pending(receiver))
    }

    /// Fetch a tile, blocking until it is computed if necessary.
    ///
    /// Must not be called from an async context.
    pub fn get_tile(&self, request: TileRequest) -> Result<MaskedTile, StoreError> {
        self.lookup_or_submit(request)?.wait()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Stop the compute workers. In-flight jobs finish first.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

// =============================================================================
// Tests
// =============================================================================
