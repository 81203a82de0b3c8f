//! Compressed in-memory tile cache.
//!
//! Serialized tiles are zlib-compressed before insertion and the budget is
//! accounted against compressed sizes, so the configured capacity bounds
//! actual memory use. Eviction removes the least-frequently-used entry
//! first, breaking ties by insertion order, which keeps hot tiles resident
//! while one-off requests age out quickly.
//!
//! A tile whose compressed form alone exceeds the capacity is rejected
//! rather than evicting the whole cache; callers treat a rejected insert
//! like any other miss on the next request.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Mutex;

use bytes::Bytes;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::{debug, error};

use crate::raster::MaskedTile;
use crate::store::key::CacheKey;

/// Default zlib level. Tiles compress once and are read many times, so the
/// slowest, densest setting pays for itself.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 9;

// =============================================================================
// Cache State
// =============================================================================

struct CacheEntry {
    payload: Bytes,
    frequency: u64,
    inserted: u64,
}

/// Bookkeeping behind the lock: entries, their total compressed size, and a
/// monotonic counter ordering insertions for eviction tie-breaks.
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    total: u64,
    seq: u64,
}

impl CacheState {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            total: 0,
            seq: 0,
        }
    }

    /// Insert a compressed payload, evicting as needed to stay within
    /// `capacity`. Returns false when the payload alone exceeds it.
    fn insert(&mut self, key: CacheKey, payload: Bytes, capacity: u64) -> bool {
        let size = payload.len() as u64;
        if size > capacity {
            return false;
        }

        if let Some(previous) = self.entries.remove(&key) {
            self.total -= previous.payload.len() as u64;
        }

        while self.total + size > capacity {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.frequency, entry.inserted))
                .map(|(victim, _)| *victim);
            let Some(victim) = victim else { break };

            if let Some(evicted) = self.entries.remove(&victim) {
                self.total -= evicted.payload.len() as u64;
                debug!(
                    key = %victim,
                    frequency = evicted.frequency,
                    size = evicted.payload.len(),
                    "evicted tile"
                );
            }
        }

        self.total += size;
        let inserted = self.seq;
        self.seq += 1;
        self.entries.insert(
            key,
            CacheEntry {
                payload,
                frequency: 0,
                inserted,
            },
        );
        true
    }

    /// Fetch a payload, counting the access.
    fn touch(&mut self, key: &CacheKey) -> Option<Bytes> {
        let entry = self.entries.get_mut(key)?;
        entry.frequency += 1;
        Some(entry.payload.clone())
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.remove(key) {
            self.total -= entry.payload.len() as u64;
        }
    }
}

// =============================================================================
// Compressed Tile Cache
// =============================================================================

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached tiles
    pub entries: usize,
    /// Total compressed bytes currently held
    pub current_size_bytes: u64,
    /// Configured capacity in bytes
    pub capacity_bytes: u64,
}

/// Thread-safe compressed tile cache with frequency-based eviction.
///
/// Compression and decompression run outside the lock; only map bookkeeping
/// is serialized, so worker threads and request handlers can share one cache
/// without queueing behind zlib.
pub struct CompressedTileCache {
    capacity: u64,
    level: Compression,
    state: Mutex<CacheState>,
}

impl CompressedTileCache {
    /// Create a cache bounded to `capacity_bytes` of compressed tiles.
    ///
    /// `level` is a zlib level and is clamped to the valid 0..=9 range.
    pub fn with_capacity(capacity_bytes: u64, level: u32) -> Self {
        Self {
            capacity: capacity_bytes,
            level: Compression::new(level.min(9)),
            state: Mutex::new(CacheState::new()),
        }
    }

    /// Look up a tile, counting the access for eviction purposes.
    ///
    /// An entry that fails to decompress or deserialize is dropped and
    /// reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<MaskedTile> {
        let payload = self.state.lock().unwrap().touch(key)?;

        match self.decompress(&payload) {
            Ok(tile) => Some(tile),
            Err(message) => {
                error!(key = %key, message, "corrupt cache entry, dropping");
                self.state.lock().unwrap().remove(key);
                None
            }
        }
    }

    /// Compress and insert a tile. Returns false when the tile is too large
    /// for the cache, which is logged and otherwise ignored.
    pub fn put(&self, key: CacheKey, tile: &MaskedTile) -> bool {
        let payload = match self.compress(&tile.to_bytes()) {
            Ok(compressed) => Bytes::from(compressed),
            Err(err) => {
                error!(key = %key, error = %err, "tile compression failed");
                return false;
            }
        };

        let size = payload.len();
        let admitted = self.state.lock().unwrap().insert(key, payload, self.capacity);
        if !admitted {
            debug!(
                key = %key,
                size,
                capacity = self.capacity,
                "tile exceeds cache capacity, not cached"
            );
        }
        admitted
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        CacheStats {
            entries: state.entries.len(),
            current_size_bytes: state.total,
            capacity_bytes: self.capacity,
        }
    }

    fn compress(&self, raw: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(raw)?;
        encoder.finish()
    }

    fn decompress(&self, payload: &[u8]) -> Result<MaskedTile, String> {
        let mut raw = Vec::new();
        ZlibDecoder::new(payload)
            .read_to_end(&mut raw)
            .map_err(|err| err.to_string())?;
        MaskedTile::from_bytes(&raw).map_err(|err| err.to_string())
    }

    #[cfg(test)]
    fn insert_raw(&self, key: CacheKey, payload: Bytes) -> bool {
        self.state.lock().unwrap().insert(key, payload, self.capacity)
    }

    #[cfg(test)]
    fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().unwrap().entries.contains_key(key)
    }
}

// =============================================================================
// Tests
// =============================================================================
