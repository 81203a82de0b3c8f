//! Tile rendering to PNG.
//!
//! Tiles carry numeric samples of whatever depth the source had; for
//! display they are contrast-stretched to 8 bits and encoded as
//! grayscale-alpha PNG, with the alpha channel carrying the validity mask
//! so missing data renders transparent.

use std::io::Cursor;

use bytes::Bytes;

use crate::error::RenderError;
use crate::raster::MaskedTile;

/// Linearly stretch tile values onto 0..=255.
///
/// `lower` maps to 0 and `upper` to 255; values outside the range clamp to
/// the ends, and masked pixels come out as 0. The bounds must satisfy
/// `lower < upper`.
pub fn to_uint8(tile: &MaskedTile, lower: f64, upper: f64) -> Result<Vec<u8>, RenderError> {
    if lower >= upper {
        return Err(RenderError::InvalidStretch { lower, upper });
    }

    let scale = 255.0 / (upper - lower);
    let mut out = Vec::with_capacity(tile.pixel_count());
    for index in 0..tile.pixel_count() {
        if tile.masked_at(index) {
            out.push(0);
        } else {
            let scaled = (tile.value_at(index) - lower) * scale;
            out.push(scaled.clamp(0.0, 255.0) as u8);
        }
    }
    Ok(out)
}

/// Render a tile as a grayscale-alpha PNG.
///
/// Valid pixels are opaque, masked pixels fully transparent.
pub fn encode_png(tile: &MaskedTile, lower: f64, upper: f64) -> Result<Bytes, RenderError> {
    let values = to_uint8(tile, lower, upper)?;

    let mut interleaved = Vec::with_capacity(values.len() * 2);
    for (index, value) in values.iter().enumerate() {
        interleaved.push(*value);
        interleaved.push(if tile.masked_at(index) { 0 } else { 255 });
    }

    let buffer = image::GrayAlphaImage::from_raw(tile.width(), tile.height(), interleaved)
        .ok_or_else(|| RenderError::Encode {
            message: "pixel buffer does not match tile dimensions".to_string(),
        })?;

    let mut out = Cursor::new(Vec::new());
    buffer
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|err| RenderError::Encode {
            message: err.to_string(),
        })?;
    Ok(Bytes::from(out.into_inner()))
}

// =============================================================================
// Tests
// =============================================================================
