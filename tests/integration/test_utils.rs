//! Test utilities for integration tests.
//!
//! This module provides stub computers and helper functions for creating
//! temporary raster datasets and wiring up routers against them.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::Router;
use image::GrayImage;

use rastile::error::ComputeError;
use rastile::raster::{DType, MaskedTile, RasterComputer};
use rastile::server::{create_router, RouterConfig};
use rastile::store::{
    ComputePool, CompressedTileCache, SourceResolver, TileComputer, TileRequest, TileStore,
};

// =============================================================================
// Temporary Datasets
// =============================================================================

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// Create a fresh base-path directory for one test.
pub fn temp_base_path() -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "rastile-it-{}-{}",
        std::process::id(),
        NEXT_DIR.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write an 8-bit grayscale source for the dataset keys `(dataset, layer)`.
///
/// Pixel values follow `(x + y * width) % 256` so tile content is
/// position-dependent and assertable.
pub fn write_gradient_source(base_path: &PathBuf, dataset: &str, layer: &str, edge: u32) {
    let pixels: Vec<u8> = (0..edge * edge).map(|i| (i % 256) as u8).collect();
    write_source(base_path, dataset, layer, edge, pixels);
}

/// Write an 8-bit grayscale source with explicit pixel values.
pub fn write_source(base_path: &PathBuf, dataset: &str, layer: &str, edge: u32, pixels: Vec<u8>) {
    let path = base_path.join(format!("{}_{}.tif", dataset, layer));
    let buffer = GrayImage::from_raw(edge, edge, pixels).unwrap();
    buffer.save(&path).unwrap();
}

// =============================================================================
// Service Wiring
// =============================================================================

/// A resolver over a real [`RasterComputer`] rooted at `base_path`.
pub fn make_resolver(base_path: &PathBuf) -> SourceResolver {
    make_resolver_with_nodata(base_path, None)
}

pub fn make_resolver_with_nodata(base_path: &PathBuf, nodata: Option<String>) -> SourceResolver {
    let store = TileStore::new(
        Arc::new(CompressedTileCache::with_capacity(16 * 1024 * 1024, 6)),
        ComputePool::new(2, false),
        Arc::new(RasterComputer::new(4, 10_000_000)),
    );
    SourceResolver::new(base_path.clone(), ".tif", nodata, store)
}

/// A complete router over real raster files, tracing disabled.
pub fn make_router(base_path: &PathBuf) -> Router {
    create_router(make_resolver(base_path), RouterConfig::new().with_tracing(false))
}

// =============================================================================
// Stub Computers
// =============================================================================

/// Computer producing a constant-valued tile, counting invocations.
pub struct CountingComputer {
    calls: AtomicUsize,
    value: f64,
}

impl CountingComputer {
    pub fn new(value: f64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            value,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TileComputer for CountingComputer {
    fn compute(&self, request: &TileRequest) -> Result<MaskedTile, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(constant_tile(request, self.value))
    }
}

/// Computer that panics on its first invocation and succeeds afterwards.
pub struct FlakyComputer {
    failed: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyComputer {
    pub fn new() -> Self {
        Self {
            failed: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TileComputer for FlakyComputer {
    fn compute(&self, request: &TileRequest) -> Result<MaskedTile, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.failed.swap(true, Ordering::SeqCst) {
            panic!("simulated worker crash");
        }
        Ok(constant_tile(request, 1.0))
    }
}

fn constant_tile(request: &TileRequest, value: f64) -> MaskedTile {
    let pixels = (request.size.0 * request.size.1) as usize;
    MaskedTile::from_samples(
        request.size.0,
        request.size.1,
        DType::U8,
        &vec![value; pixels],
        vec![0; pixels],
    )
    .unwrap()
}

// =============================================================================
// Response Helpers
// =============================================================================

/// Whether the bytes start with the PNG signature.
pub fn is_valid_png(data: &[u8]) -> bool {
    data.len() > 8 && data[..4] == [0x89, b'P', b'N', b'G']
}

/// Decode a PNG response body into a grayscale-alpha image.
pub fn decode_png(data: &[u8]) -> image::GrayAlphaImage {
    image::load_from_memory(data).unwrap().to_luma_alpha8()
}
