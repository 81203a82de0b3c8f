use thiserror::Error;

/// Errors raised by the tile computer while reading and resampling rasters
#[derive(Debug, Clone, Error)]
pub enum ComputeError {
    /// Source raster file does not exist or cannot be opened
    #[error("Source not found: {path}")]
    SourceNotFound { path: String },

    /// Source raster could not be decoded
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    /// Source uses a sample layout the computer cannot represent
    #[error("Unsupported sample format in {path}: {format}")]
    UnsupportedFormat { path: String, format: String },

    /// Resampling method string is not recognized
    #[error("Unknown resampling method: {0} (expected \"average\" or \"nearest\")")]
    UnknownResampling(String),

    /// A reader option carried a value that could not be parsed
    #[error("Invalid reader option {option}: {value}")]
    InvalidOption { option: String, value: String },
}

/// Errors surfaced by the tile store to its callers
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Request parameters could not be normalized into a cache key
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The compute task failed; the underlying error passes through unchanged
    #[error("Compute failed: {0}")]
    Compute(#[from] ComputeError),

    /// The worker pool was broken and could not be recovered within one
    /// recreation attempt
    #[error("Worker pool broken: {message}")]
    PoolBroken { message: String },
}

/// Errors from cache payload encoding and decoding
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Payload is shorter than its header or declared contents
    #[error("Truncated payload: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    /// Element type tag in the header is not recognized
    #[error("Unknown element type tag: {0}")]
    UnknownDtype(u8),

    /// Data or mask plane length disagrees with the declared shape
    #[error("Plane length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Errors from rendering tiles to a display format
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// Stretch range is empty or inverted
    #[error("Invalid stretch range: [{lower}, {upper}]")]
    InvalidStretch { lower: f64, upper: f64 },

    /// PNG encoding failed
    #[error("Failed to encode PNG: {message}")]
    Encode { message: String },
}
