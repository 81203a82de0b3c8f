//! Tile computation from raster sources.
//!
//! [`RasterComputer`] decodes a source image, keeps the decoded planes in a
//! small LRU so repeated tiles over the same source skip the decode, and
//! resamples the requested grid window down (or up) to the output size.
//!
//! Only the first channel of a source is served. The validity mask combines
//! the source alpha channel (fully transparent pixels are invalid) with an
//! optional `nodata` value carried in the request's reader options.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use image::DynamicImage;
use lru::LruCache;
use tracing::debug;

use crate::error::ComputeError;
use crate::raster::grid::{pixel_window, PixelWindow};
use crate::raster::masked::{DType, MaskedTile};
use crate::store::{TileComputer, TileRequest};

// =============================================================================
// Resampling
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resampling {
    Average,
    Nearest,
}

impl Resampling {
    fn parse(name: &str) -> Result<Self, ComputeError> {
        match name {
            "average" => Ok(Resampling::Average),
            "nearest" => Ok(Resampling::Nearest),
            other => Err(ComputeError::UnknownResampling(other.to_string())),
        }
    }
}

// =============================================================================
// Decoded Source
// =============================================================================

/// A source raster decoded to its first channel.
///
/// Samples are widened to f64 so resampling arithmetic is uniform across
/// element types; the original type is kept so output tiles preserve depth.
#[derive(Debug)]
struct DecodedRaster {
    width: u32,
    height: u32,
    dtype: DType,
    samples: Vec<f64>,
    mask: Vec<u8>,
}

impl DecodedRaster {
    fn decode(path: &str) -> Result<Self, ComputeError> {
        let image = image::open(path).map_err(|err| match err {
            image::ImageError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
                ComputeError::SourceNotFound {
                    path: path.to_string(),
                }
            }
            other => ComputeError::Decode {
                path: path.to_string(),
                message: other.to_string(),
            },
        })?;

        let width = image.width();
        let height = image.height();
        let (dtype, planes) = match &image {
            DynamicImage::ImageLuma8(b) => (DType::U8, split_plane(b.as_raw(), 1, None)),
            DynamicImage::ImageLumaA8(b) => (DType::U8, split_plane(b.as_raw(), 2, Some(1))),
            DynamicImage::ImageRgb8(b) => (DType::U8, split_plane(b.as_raw(), 3, None)),
            DynamicImage::ImageRgba8(b) => (DType::U8, split_plane(b.as_raw(), 4, Some(3))),
            DynamicImage::ImageLuma16(b) => (DType::U16, split_plane(b.as_raw(), 1, None)),
            DynamicImage::ImageLumaA16(b) => (DType::U16, split_plane(b.as_raw(), 2, Some(1))),
            DynamicImage::ImageRgb16(b) => (DType::U16, split_plane(b.as_raw(), 3, None)),
            DynamicImage::ImageRgba16(b) => (DType::U16, split_plane(b.as_raw(), 4, Some(3))),
            DynamicImage::ImageRgb32F(b) => (DType::F32, split_plane(b.as_raw(), 3, None)),
            DynamicImage::ImageRgba32F(b) => (DType::F32, split_plane(b.as_raw(), 4, Some(3))),
            _ => {
                return Err(ComputeError::UnsupportedFormat {
                    path: path.to_string(),
                    format: format!("{:?}", image.color()),
                })
            }
        };

        let (samples, mask) = planes;
        debug!(path, width, height, dtype = %dtype, "decoded raster source");

        Ok(Self {
            width,
            height,
            dtype,
            samples,
            mask,
        })
    }

    fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Extract the first channel and an invalidity mask from interleaved samples.
fn split_plane<T: Copy + Into<f64>>(
    raw: &[T],
    channels: usize,
    alpha: Option<usize>,
) -> (Vec<f64>, Vec<u8>) {
    let pixels = raw.len() / channels;
    let mut samples = Vec::with_capacity(pixels);
    let mut mask = Vec::with_capacity(pixels);
    for px in raw.chunks_exact(channels) {
        samples.push(px[0].into());
        let hidden = alpha.map(|a| px[a].into() == 0.0).unwrap_or(false);
        mask.push(hidden as u8);
    }
    (samples, mask)
}

// =============================================================================
// Raster Computer
// =============================================================================

/// Computes masked tiles by decoding and resampling raster files.
pub struct RasterComputer {
    readers: Mutex<LruCache<String, Arc<DecodedRaster>>>,
    max_decoded_pixels: u64,
}

impl RasterComputer {
    /// Create a computer retaining up to `reader_cache_size` decoded sources.
    ///
    /// Sources larger than `max_decoded_pixels` are decoded on every request
    /// instead of being retained, so one giant file cannot pin the cache.
    pub fn new(reader_cache_size: usize, max_decoded_pixels: u64) -> Self {
        let capacity = NonZeroUsize::new(reader_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            readers: Mutex::new(LruCache::new(capacity)),
            max_decoded_pixels,
        }
    }

    /// Number of decoded sources currently retained.
    pub fn cached_sources(&self) -> usize {
        self.readers.lock().unwrap().len()
    }

    fn open(&self, path: &str) -> Result<Arc<DecodedRaster>, ComputeError> {
        if let Some(found) = self.readers.lock().unwrap().get(path) {
            return Ok(Arc::clone(found));
        }

        let decoded = Arc::new(DecodedRaster::decode(path)?);
        if decoded.pixel_count() <= self.max_decoded_pixels {
            self.readers
                .lock()
                .unwrap()
                .put(path.to_string(), Arc::clone(&decoded));
        } else {
            debug!(
                path,
                pixels = decoded.pixel_count(),
                "source exceeds retention threshold, decoded without caching"
            );
        }
        Ok(decoded)
    }
}

impl TileComputer for RasterComputer {
    fn compute(&self, request: &TileRequest) -> Result<MaskedTile, ComputeError> {
        let method = Resampling::parse(&request.resampling_method)?;
        // Resampling must not synthesize values that never occur in the
        // source, so preserve_values forces nearest.
        let method = if request.preserve_values {
            Resampling::Nearest
        } else {
            method
        };

        let nodata = match request.reader_options.get("nodata") {
            Some(raw) => Some(raw.parse::<f64>().map_err(|_| ComputeError::InvalidOption {
                option: "nodata".to_string(),
                value: raw.clone(),
            })?),
            None => None,
        };

        let source = self.open(&request.path)?;
        let (out_width, out_height) = request.size;

        let window = match &request.tile {
            Some(coord) => pixel_window(coord, source.width, source.height),
            None => PixelWindow {
                x0: 0,
                y0: 0,
                x1: source.width as u64,
                y1: source.height as u64,
            },
        };
        if window.is_empty() {
            return Ok(MaskedTile::fully_masked(out_width, out_height, source.dtype));
        }

        let (samples, mask) = match method {
            Resampling::Average => resample_average(&source, &window, out_width, out_height, nodata),
            Resampling::Nearest => resample_nearest(&source, &window, out_width, out_height, nodata),
        };

        MaskedTile::from_samples(out_width, out_height, source.dtype, &samples, mask).map_err(
            |err| ComputeError::Decode {
                path: request.path.clone(),
                message: err.to_string(),
            },
        )
    }
}

// =============================================================================
// Resampling Kernels
// =============================================================================

fn source_valid(source: &DecodedRaster, index: usize, nodata: Option<f64>) -> bool {
    if source.mask[index] != 0 {
        return false;
    }
    match nodata {
        Some(nd) => source.samples[index] != nd,
        None => true,
    }
}

/// Mean of the valid source pixels under each output cell. Cells with no
/// valid contribution come out masked.
fn resample_average(
    source: &DecodedRaster,
    window: &PixelWindow,
    out_width: u32,
    out_height: u32,
    nodata: Option<f64>,
) -> (Vec<f64>, Vec<u8>) {
    let win_w = window.width();
    let win_h = window.height();
    let out_w = out_width as u64;
    let out_h = out_height as u64;

    let mut samples = Vec::with_capacity((out_w * out_h) as usize);
    let mut mask = Vec::with_capacity((out_w * out_h) as usize);

    for oy in 0..out_h {
        let sy0 = window.y0 + oy * win_h / out_h;
        let mut sy1 = window.y0 + (oy + 1) * win_h / out_h;
        // When upsampling, cell boundaries collapse; sample at least one row.
        if sy1 <= sy0 {
            sy1 = sy0 + 1;
        }
        for ox in 0..out_w {
            let sx0 = window.x0 + ox * win_w / out_w;
            let mut sx1 = window.x0 + (ox + 1) * win_w / out_w;
            if sx1 <= sx0 {
                sx1 = sx0 + 1;
            }

            let mut sum = 0.0;
            let mut count = 0u64;
            for sy in sy0..sy1 {
                for sx in sx0..sx1 {
                    let index = (sy * source.width as u64 + sx) as usize;
                    if source_valid(source, index, nodata) {
                        sum += source.samples[index];
                        count += 1;
                    }
                }
            }

            if count == 0 {
                samples.push(0.0);
                mask.push(1);
            } else {
                samples.push(sum / count as f64);
                mask.push(0);
            }
        }
    }

    (samples, mask)
}

/// Source pixel nearest to each output cell center, mask carried through.
fn resample_nearest(
    source: &DecodedRaster,
    window: &PixelWindow,
    out_width: u32,
    out_height: u32,
    nodata: Option<f64>,
) -> (Vec<f64>, Vec<u8>) {
    let win_w = window.width();
    let win_h = window.height();
    let out_w = out_width as u64;
    let out_h = out_height as u64;

    let mut samples = Vec::with_capacity((out_w * out_h) as usize);
    let mut mask = Vec::with_capacity((out_w * out_h) as usize);

    for oy in 0..out_h {
        let sy = (window.y0 + (2 * oy + 1) * win_h / (2 * out_h)).min(window.y1 - 1);
        for ox in 0..out_w {
            let sx = (window.x0 + (2 * ox + 1) * win_w / (2 * out_w)).min(window.x1 - 1);
            let index = (sy * source.width as u64 + sx) as usize;
            if source_valid(source, index, nodata) {
                samples.push(source.samples[index]);
                mask.push(0);
            } else {
                samples.push(0.0);
                mask.push(1);
            }
        }
    }

    (samples, mask)
}

// =============================================================================
// Tests
// =============================================================================
