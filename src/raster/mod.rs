//! Raster decoding, grid addressing, and tile computation.
//!
//! This module turns source raster files into [`MaskedTile`] arrays: numeric
//! planes carrying a per-pixel validity mask, addressed on a power-of-two
//! tile grid.
//!
//! # Components
//!
//! - [`MaskedTile`]: a tile's samples plus validity mask, serializable for caching
//! - [`DType`]: element type of a tile (uint8, uint16, float32)
//! - [`TileCoord`]: position of a tile on the zoom grid
//! - [`pixel_window`]: maps a grid cell to its pixel rectangle in the source
//! - [`RasterComputer`]: decodes sources and resamples windows into tiles
//!
//! # Example
//!
//! ```
//! use rastile::raster::{DType, MaskedTile};
//!
//! let samples = [12.0, 40.0, 7.0, 0.0];
//! let tile = MaskedTile::from_samples(2, 2, DType::U8, &samples, vec![0, 0, 0, 1]).unwrap();
//!
//! let bytes = tile.to_bytes();
//! let restored = MaskedTile::from_bytes(&bytes).unwrap();
//! assert_eq!(restored, tile);
//! assert_eq!(restored.valid_count(), 3);
//! ```

mod computer;
mod grid;
mod masked;

pub use computer::RasterComputer;
pub use grid::{pixel_window, PixelWindow, TileCoord, MAX_ZOOM};
pub use masked::{DType, MaskedTile};
