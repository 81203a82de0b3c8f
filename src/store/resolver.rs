//! Dataset key resolution.
//!
//! Datasets are addressed by a pair of keys taken from the URL path. The
//! resolver maps a key pair onto a source file under the configured base
//! directory (`<base>/<key0>_<key1><extension>`) and owns the [`TileStore`]
//! that serves the resulting requests, so the HTTP layer never touches
//! filesystem paths directly.

use std::path::PathBuf;

use crate::error::StoreError;
use crate::raster::TileCoord;
use crate::store::key::TileRequest;
use crate::store::service::{TileFuture, TileStore};

/// Number of keys that address a dataset.
pub const DATASET_KEY_COUNT: usize = 2;

/// Maps dataset keys to raster sources and forwards requests to the store.
pub struct SourceResolver {
    base_path: PathBuf,
    extension: String,
    nodata: Option<String>,
    store: TileStore,
}

impl SourceResolver {
    /// Create a resolver rooted at `base_path`.
    ///
    /// `extension` is appended verbatim to resolved file names and should
    /// include its leading dot. A configured `nodata` value is injected
    /// into every request's reader options.
    pub fn new(
        base_path: impl Into<PathBuf>,
        extension: impl Into<String>,
        nodata: Option<String>,
        store: TileStore,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            extension: extension.into(),
            nodata,
            store,
        }
    }

    /// Build a request for the dataset addressed by `keys`.
    pub fn tile_request(
        &self,
        keys: &[&str],
        tile: Option<TileCoord>,
    ) -> Result<TileRequest, StoreError> {
        let path = self.resolve_path(keys)?;
        let mut request = TileRequest::new(path, tile);
        if let Some(nodata) = &self.nodata {
            request
                .reader_options
                .insert("nodata".to_string(), nodata.clone());
        }
        Ok(request)
    }

    /// Forwarded to [`TileStore::lookup_or_submit`].
    pub fn lookup_or_submit(&self, request: TileRequest) -> Result<TileFuture, StoreError> {
        self.store.lookup_or_submit(request)
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    /// Source file path for a key pair.
    pub fn resolve_path(&self, keys: &[&str]) -> Result<String, StoreError> {
        if keys.len() != DATASET_KEY_COUNT {
            return Err(StoreError::InvalidRequest {
                reason: format!(
                    "expected {} dataset keys, got {}",
                    DATASET_KEY_COUNT,
                    keys.len()
                ),
            });
        }
        for key in keys {
            validate_key(key)?;
        }

        let file_name = format!("{}_{}{}", keys[0], keys[1], self.extension);
        Ok(self.base_path.join(file_name).to_string_lossy().into_owned())
    }
}

/// Keys become file name fragments, so anything that could escape the base
/// directory is rejected up front.
fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
        return Err(StoreError::InvalidRequest {
            reason: format!("invalid dataset key {:?}", key),
        });
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
