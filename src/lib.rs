//! # rastile
//!
//! A raster tile server with a compressed LFU tile cache and a bounded
//! compute pool.
//!
//! This library provides the core functionality for serving XYZ raster tiles
//! computed on demand from local single-band raster datasets. Tile
//! computation is expensive (decode + resample), so results are deduplicated
//! behind a deterministic cache key and kept in a size-bounded, zlib-compressed
//! in-memory cache with least-frequently-used eviction.
//!
//! ## Features
//!
//! - **Deterministic cache keys**: every parameter affecting tile content is
//!   folded into a SHA-256 key, so equal requests share one cached result
//! - **Compressed LFU cache**: capacity is accounted in compressed bytes;
//!   frequently requested tiles stay resident while one-off reads age out
//! - **Bounded compute pool**: a fixed set of worker threads with
//!   restart-once recovery when a worker dies mid-tile
//! - **Dual retrieval contract**: blocking retrieval for synchronous callers,
//!   an awaitable future for the HTTP layer
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`store`] - Cache keys, compressed LFU cache, compute pool, tile store
//! - [`raster`] - Masked tiles, zoom-grid math, and the raster computer
//! - [`render`] - Contrast stretch and PNG encoding
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rastile::raster::RasterComputer;
//! use rastile::server::{create_router, RouterConfig};
//! use rastile::store::{ComputePool, CompressedTileCache, SourceResolver, TileStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = TileStore::new(
//!         Arc::new(CompressedTileCache::with_capacity(490 * 1024 * 1024, 9)),
//!         ComputePool::new(3, false),
//!         Arc::new(RasterComputer::new(16, 120_000_000)),
//!     );
//!     let resolver = SourceResolver::new("/data/rasters", ".tif", None, store);
//!     let router = create_router(resolver, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod raster;
pub mod render;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, ServeConfig};
pub use error::{CodecError, ComputeError, RenderError, StoreError};
pub use raster::{pixel_window, DType, MaskedTile, PixelWindow, RasterComputer, TileCoord};
pub use render::{encode_png, to_uint8};
pub use server::{
    create_router, health_handler, preview_handler, tile_handler, ApiError, AppState,
    ErrorResponse, HealthResponse, PreviewPathParams, RouterConfig, TilePathParams,
    TileQueryParams,
};
pub use store::{
    CacheKey, CacheStats, ComputePool, CompressedTileCache, SourceResolver, TileComputer,
    TileFuture, TileRequest, TileStore,
};
