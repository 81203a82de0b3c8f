//! Tile store layer.
//!
//! This module provides cached, concurrency-bounded access to computed
//! tiles. It sits between the HTTP layer and the raster computation:
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │ dataset keys + coordinates
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             SourceResolver              │
//! │        (keys → source file path)        │
//! └────────────────────┬────────────────────┘
//!                      │ TileRequest
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                TileStore                │
//! │  ┌────────────────────┐ ┌────────────┐  │
//! │  │ CompressedTileCache│ │ ComputePool│  │
//! │  │    (zlib, LFU)     │ │  (workers) │  │
//! │  └────────────────────┘ └────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ miss
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │         TileComputer (rasters)          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileStore`]: entry point; cache lookup, then pooled computation
//! - [`TileRequest`] / [`CacheKey`]: request normalization and identity
//! - [`CompressedTileCache`]: zlib-compressed cache, frequency eviction
//! - [`ComputePool`] / [`WorkerPool`]: bounded workers with restart-once recovery
//! - [`TileFuture`]: resolved on a hit, pending on a scheduled computation
//! - [`SourceResolver`]: dataset key pairs to source files
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use rastile::error::ComputeError;
//! use rastile::raster::{DType, MaskedTile, TileCoord};
//! use rastile::store::{ComputePool, CompressedTileCache, TileComputer, TileRequest, TileStore};
//!
//! struct Flat;
//!
//! impl TileComputer for Flat {
//!     fn compute(&self, request: &TileRequest) -> Result<MaskedTile, ComputeError> {
//!         let pixels = (request.size.0 * request.size.1) as usize;
//!         Ok(MaskedTile::from_samples(
//!             request.size.0,
//!             request.size.1,
//!             DType::U8,
//!             &vec![7.0; pixels],
//!             vec![0; pixels],
//!         )
//!         .unwrap())
//!     }
//! }
//!
//! let store = TileStore::new(
//!     Arc::new(CompressedTileCache::with_capacity(64 * 1024 * 1024, 9)),
//!     ComputePool::new(3, false),
//!     Arc::new(Flat),
//! );
//!
//! let mut request = TileRequest::new("demo.tif", Some(TileCoord::new(0, 0, 0)));
//! request.size = (8, 8);
//!
//! let tile = store.get_tile(request).unwrap();
//! assert_eq!(tile.value_at(0), 7.0);
//! ```

mod cache;
mod key;
mod pool;
mod resolver;
mod service;

pub use cache::{CacheStats, CompressedTileCache, DEFAULT_COMPRESSION_LEVEL};
pub use key::{CacheKey, TileRequest};
pub use pool::{ComputePool, Job, PoolFactory, WorkerPool};
pub use resolver::{SourceResolver, DATASET_KEY_COUNT};
pub use service::{TileComputer, TileFuture, TileStore};
