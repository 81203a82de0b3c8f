//! Masked tile arrays.
//!
//! A [`MaskedTile`] is the unit of value produced by the tile computer and
//! stored in the cache: a row-major plane of numeric samples plus a validity
//! mask marking missing or invalid cells. Samples are stored as little-endian
//! bytes so the whole tile can be serialized for cache storage without
//! reshaping.

use crate::error::CodecError;

/// Fixed header size of a serialized tile: width, height, dtype tag.
const TILE_HEADER_SIZE: usize = 9;

// =============================================================================
// Element Type
// =============================================================================

/// Element type of a tile's data plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    /// Unsigned 8-bit samples
    U8,
    /// Unsigned 16-bit samples
    U16,
    /// 32-bit floating point samples
    F32,
}

impl DType {
    /// Size of one sample in bytes.
    pub fn sample_size(self) -> usize {
        match self {
            DType::U8 => 1,
            DType::U16 => 2,
            DType::F32 => 4,
        }
    }

    fn tag(self) -> u8 {
        match self {
            DType::U8 => 1,
            DType::U16 => 2,
            DType::F32 => 3,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            1 => Ok(DType::U8),
            2 => Ok(DType::U16),
            3 => Ok(DType::F32),
            other => Err(CodecError::UnknownDtype(other)),
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DType::U8 => write!(f, "uint8"),
            DType::U16 => write!(f, "uint16"),
            DType::F32 => write!(f, "float32"),
        }
    }
}

// =============================================================================
// Masked Tile
// =============================================================================

/// A numeric tile with a per-pixel validity mask.
///
/// The data plane holds `width * height` samples in row-major order, encoded
/// as little-endian bytes of the element type. The mask holds one byte per
/// pixel; a nonzero byte marks the pixel as invalid (masked).
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedTile {
    width: u32,
    height: u32,
    dtype: DType,
    data: Vec<u8>,
    mask: Vec<u8>,
}

impl MaskedTile {
    /// Create a tile from raw planes, validating their lengths.
    pub fn new(
        width: u32,
        height: u32,
        dtype: DType,
        data: Vec<u8>,
        mask: Vec<u8>,
    ) -> Result<Self, CodecError> {
        let pixels = width as usize * height as usize;
        let expected_data = pixels * dtype.sample_size();
        if data.len() != expected_data {
            return Err(CodecError::LengthMismatch {
                expected: expected_data,
                actual: data.len(),
            });
        }
        if mask.len() != pixels {
            return Err(CodecError::LengthMismatch {
                expected: pixels,
                actual: mask.len(),
            });
        }
        Ok(Self {
            width,
            height,
            dtype,
            data,
            mask,
        })
    }

    /// Build a tile from f64 samples, encoding them into the element type.
    ///
    /// Integer types are rounded and clamped to their range; `F32` samples
    /// are narrowed. `samples` and `mask` must each hold one entry per pixel.
    pub fn from_samples(
        width: u32,
        height: u32,
        dtype: DType,
        samples: &[f64],
        mask: Vec<u8>,
    ) -> Result<Self, CodecError> {
        let pixels = width as usize * height as usize;
        if samples.len() != pixels {
            return Err(CodecError::LengthMismatch {
                expected: pixels,
                actual: samples.len(),
            });
        }

        let mut data = Vec::with_capacity(pixels * dtype.sample_size());
        match dtype {
            DType::U8 => {
                for &v in samples {
                    data.push(v.round().clamp(0.0, u8::MAX as f64) as u8);
                }
            }
            DType::U16 => {
                for &v in samples {
                    let s = v.round().clamp(0.0, u16::MAX as f64) as u16;
                    data.extend_from_slice(&s.to_le_bytes());
                }
            }
            DType::F32 => {
                for &v in samples {
                    data.extend_from_slice(&(v as f32).to_le_bytes());
                }
            }
        }

        Self::new(width, height, dtype, data, mask)
    }

    /// A tile of the given shape with every pixel masked.
    pub fn fully_masked(width: u32, height: u32, dtype: DType) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            dtype,
            data: vec![0u8; pixels * dtype.sample_size()],
            mask: vec![1u8; pixels],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of pixels in the tile.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Raw little-endian data plane.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Validity mask, one byte per pixel, nonzero = invalid.
    pub fn mask(&self) -> &[u8] {
        &self.mask
    }

    /// Whether the pixel at the given row-major index is masked.
    pub fn masked_at(&self, index: usize) -> bool {
        self.mask[index] != 0
    }

    /// Decode the sample at the given row-major index as f64.
    pub fn value_at(&self, index: usize) -> f64 {
        match self.dtype {
            DType::U8 => self.data[index] as f64,
            DType::U16 => {
                let off = index * 2;
                u16::from_le_bytes([self.data[off], self.data[off + 1]]) as f64
            }
            DType::F32 => {
                let off = index * 4;
                f32::from_le_bytes([
                    self.data[off],
                    self.data[off + 1],
                    self.data[off + 2],
                    self.data[off + 3],
                ]) as f64
            }
        }
    }

    /// Count of valid (unmasked) pixels.
    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m == 0).count()
    }

    /// Serialize to a self-describing byte buffer for cache storage.
    ///
    /// Layout: width (u32 LE), height (u32 LE), dtype tag (u8), mask plane,
    /// data plane.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TILE_HEADER_SIZE + self.mask.len() + self.data.len());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.push(self.dtype.tag());
        out.extend_from_slice(&self.mask);
        out.extend_from_slice(&self.data);
        out
    }

    /// Reconstruct a tile from the buffer produced by [`MaskedTile::to_bytes`].
    pub fn from_bytes(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < TILE_HEADER_SIZE {
            return Err(CodecError::Truncated {
                needed: TILE_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let width = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let height = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let dtype = DType::from_tag(buf[8])?;

        let pixels = width as usize * height as usize;
        let needed = TILE_HEADER_SIZE + pixels + pixels * dtype.sample_size();
        if buf.len() != needed {
            return Err(CodecError::Truncated {
                needed,
                actual: buf.len(),
            });
        }

        let mask = buf[TILE_HEADER_SIZE..TILE_HEADER_SIZE + pixels].to_vec();
        let data = buf[TILE_HEADER_SIZE + pixels..].to_vec();

        Self::new(width, height, dtype, data, mask)
    }
}

// =============================================================================
// Tests
// =============================================================================
