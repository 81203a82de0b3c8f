//! Tile grid addressing.
//!
//! Tiles are addressed on a power-of-two grid: zoom level `z` divides the
//! source raster into `2^z x 2^z` cells. [`pixel_window`] maps a grid cell
//! to the half-open pixel rectangle it covers in the source, so that the
//! windows of all cells at one zoom level partition the raster exactly.

/// Maximum supported zoom level. `2^31` cells per axis already exceeds any
/// raster we can address with u32 pixel coordinates.
pub const MAX_ZOOM: u8 = 31;

// =============================================================================
// Tile Coordinate
// =============================================================================

/// Position of a tile on the zoom grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level (grid is `2^z` cells per axis)
    pub z: u8,
    /// Column index, west to east
    pub x: u32,
    /// Row index, north to south
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of cells per axis at this zoom level.
    pub fn grid_size(&self) -> u64 {
        1u64 << self.z
    }

    /// Whether the coordinate addresses a cell that exists on its grid.
    pub fn is_valid(&self) -> bool {
        self.z <= MAX_ZOOM && (self.x as u64) < self.grid_size() && (self.y as u64) < self.grid_size()
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

// =============================================================================
// Pixel Window
// =============================================================================

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)` in source coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub x0: u64,
    pub y0: u64,
    pub x1: u64,
    pub y1: u64,
}

impl PixelWindow {
    pub fn width(&self) -> u64 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u64 {
        self.y1.saturating_sub(self.y0)
    }

    /// True when the window covers no source pixels. Happens when the grid
    /// is finer than the raster, e.g. a 2x2 image at zoom 3.
    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }
}

/// Pixel window of a grid cell over a raster of the given dimensions.
///
/// Uses integer division so that adjacent cells share no pixels and the
/// cells at one zoom level cover the raster exactly.
pub fn pixel_window(coord: &TileCoord, raster_width: u32, raster_height: u32) -> PixelWindow {
    let n = coord.grid_size();
    let w = raster_width as u64;
    let h = raster_height as u64;
    let x = coord.x as u64;
    let y = coord.y as u64;

    PixelWindow {
        x0: x * w / n,
        y0: y * h / n,
        x1: (x + 1) * w / n,
        y1: (y + 1) * h / n,
    }
}

// =============================================================================
// Tests
// =============================================================================
