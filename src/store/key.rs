//! Tile request normalization and cache keys.
//!
//! Every parameter that affects tile content is folded into a [`CacheKey`]:
//! a SHA-256 digest over a canonical byte encoding of the request. Requests
//! that normalize to the same key are interchangeable, and the digest is
//! treated as collision-free, so the key alone is tile identity everywhere
//! downstream (cache, in-flight work, logs).

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::config;
use crate::error::StoreError;
use crate::raster::TileCoord;

// =============================================================================
// Tile Request
// =============================================================================

/// A fully-specified tile computation.
///
/// `tile` is `None` for whole-dataset requests (previews), which resample
/// the entire source instead of one grid cell. `reader_options` carries
/// source-open parameters such as `nodata`; they participate in the cache
/// key because they change decoded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    /// Filesystem path of the source raster
    pub path: String,
    /// Grid cell to compute, or `None` for the whole dataset
    pub tile: Option<TileCoord>,
    /// Output size in pixels (width, height)
    pub size: (u32, u32),
    /// Forbid resampling from synthesizing values absent from the source
    pub preserve_values: bool,
    /// Reprojection interpolation recorded for the target grid
    pub reprojection_method: String,
    /// Resampling kernel: `average` or `nearest`
    pub resampling_method: String,
    /// Coordinate system tiles are served in
    pub target_crs: String,
    /// Source-open options, e.g. `nodata`
    pub reader_options: BTreeMap<String, String>,
}

impl TileRequest {
    /// A request for the given source and cell with default parameters.
    pub fn new(path: impl Into<String>, tile: Option<TileCoord>) -> Self {
        Self {
            path: path.into(),
            tile,
            size: (config::DEFAULT_TILE_SIZE, config::DEFAULT_TILE_SIZE),
            preserve_values: false,
            reprojection_method: config::DEFAULT_REPROJECTION_METHOD.to_string(),
            resampling_method: config::DEFAULT_RESAMPLING_METHOD.to_string(),
            target_crs: config::TARGET_CRS.to_string(),
            reader_options: BTreeMap::new(),
        }
    }

    /// Reject requests that cannot address a tile.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.path.is_empty() {
            return Err(StoreError::InvalidRequest {
                reason: "source path is empty".to_string(),
            });
        }
        if self.size.0 == 0 || self.size.1 == 0 {
            return Err(StoreError::InvalidRequest {
                reason: "tile size must be nonzero in both dimensions".to_string(),
            });
        }
        if let Some(coord) = &self.tile {
            if !coord.is_valid() {
                return Err(StoreError::InvalidRequest {
                    reason: format!("tile coordinate {} outside zoom grid", coord),
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Cache Key
// =============================================================================

/// SHA-256 digest identifying a normalized tile request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Derive the key for a request.
    ///
    /// Fields are hashed in a fixed order with length prefixes, so adjacent
    /// strings cannot alias and map entries hash in their sorted order.
    pub fn for_request(request: &TileRequest) -> Self {
        let mut hasher = Sha256::new();

        update_str(&mut hasher, &request.path);

        match &request.tile {
            None => hasher.update([0u8]),
            Some(coord) => {
                hasher.update([1u8]);
                hasher.update([coord.z]);
                hasher.update(coord.x.to_le_bytes());
                hasher.update(coord.y.to_le_bytes());
            }
        }

        hasher.update(request.size.0.to_le_bytes());
        hasher.update(request.size.1.to_le_bytes());
        hasher.update([request.preserve_values as u8]);

        update_str(&mut hasher, &request.reprojection_method);
        update_str(&mut hasher, &request.resampling_method);
        update_str(&mut hasher, &request.target_crs);

        hasher.update((request.reader_options.len() as u32).to_le_bytes());
        for (key, value) in &request.reader_options {
            update_str(&mut hasher, key);
            update_str(&mut hasher, value);
        }

        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u32).to_le_bytes());
    hasher.update(value.as_bytes());
}

// =============================================================================
// Tests
// =============================================================================
