//! Configuration management for rastile.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `RASTILE_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use rastile::config::{Cli, Command};
//!
//! // Parse from command line and environment
//! let cli = Cli::parse();
//!
//! if let Command::Serve(config) = cli.command {
//!     println!("Listening on {}", config.bind_address());
//!     println!("Serving rasters from {}", config.base_path);
//! }
//! ```
//!
//! # Environment Variables
//!
//! All configuration options can be set via environment variables with the `RASTILE_` prefix:
//!
//! - `RASTILE_HOST` - Server bind address (default: 0.0.0.0)
//! - `RASTILE_PORT` - Server port (default: 3000)
//! - `RASTILE_BASE_PATH` - Directory containing the raster sources (required)
//! - `RASTILE_SOURCE_EXTENSION` - Source file extension (default: .tif)
//! - `RASTILE_CACHE_SIZE` - Compressed tile cache capacity (default: 490MB)
//! - `RASTILE_COMPRESSION_LEVEL` - zlib level for cached tiles, 0-9 (default: 9)
//! - `RASTILE_WORKERS` - Compute worker threads (default: 3)
//! - `RASTILE_SERIAL` - Run a single compute worker (default: false)
//! - `RASTILE_TILE_SIZE` - Default output tile edge in pixels (default: 256)
//! - `RASTILE_RESAMPLING` - Resampling kernel, average or nearest (default: average)
//! - `RASTILE_NODATA` - Sample value treated as missing data
//! - `RASTILE_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default source file extension appended to resolved dataset names.
pub const DEFAULT_SOURCE_EXTENSION: &str = ".tif";

/// Default compressed cache capacity, human-readable.
pub const DEFAULT_CACHE_SIZE: &str = "490MB";

/// Default number of compute worker threads.
pub const DEFAULT_WORKERS: usize = 3;

/// Default output tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Largest output tile edge accepted from a request.
pub const MAX_TILE_SIZE: u32 = 2048;

/// Default contrast stretch lower bound.
pub const DEFAULT_STRETCH_MIN: f64 = 0.0;

/// Default contrast stretch upper bound.
pub const DEFAULT_STRETCH_MAX: f64 = 255.0;

/// Default resampling kernel.
pub const DEFAULT_RESAMPLING_METHOD: &str = "average";

/// Default reprojection interpolation recorded for the target grid.
pub const DEFAULT_REPROJECTION_METHOD: &str = "linear";

/// Coordinate system tiles are served in. Fixed per deployment.
pub const TARGET_CRS: &str = "epsg:3857";

/// Default number of decoded sources retained by the computer.
pub const DEFAULT_READER_CACHE_CAPACITY: usize = 16;

/// Default retention threshold for decoded sources (10980 x 10980 pixels).
/// Sources above it are decoded per request instead of being cached.
pub const DEFAULT_MAX_DECODED_PIXELS: u64 = 10_980 * 10_980;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// rastile - A raster tile server.
///
/// Serves XYZ raster tiles rendered on demand from local single-band raster
/// datasets, with a compressed in-memory tile cache in front of a bounded
/// pool of compute workers.
#[derive(Parser, Debug, Clone)]
#[command(name = "rastile")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the tile server.
    Serve(ServeConfig),

    /// Validate configuration and read one dataset without starting the server.
    Check(CheckConfig),
}

/// Configuration for the `serve` command.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "RASTILE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "RASTILE_PORT")]
    pub port: u16,

    // =========================================================================
    // Source Configuration
    // =========================================================================
    /// Directory containing the raster source files.
    ///
    /// A dataset addressed by keys (a, b) resolves to `<base-path>/a_b<ext>`.
    #[arg(long, env = "RASTILE_BASE_PATH")]
    pub base_path: String,

    /// File extension of raster sources, including the leading dot.
    #[arg(long, default_value = DEFAULT_SOURCE_EXTENSION, env = "RASTILE_SOURCE_EXTENSION")]
    pub source_extension: String,

    /// Sample value treated as missing data in every source.
    #[arg(long, env = "RASTILE_NODATA")]
    pub nodata: Option<String>,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Compressed tile cache capacity (e.g. "490MB", "1GB", or bytes).
    #[arg(long, default_value = DEFAULT_CACHE_SIZE, env = "RASTILE_CACHE_SIZE")]
    pub cache_size: String,

    /// zlib compression level for cached tiles (0-9).
    #[arg(long, default_value_t = crate::store::DEFAULT_COMPRESSION_LEVEL, env = "RASTILE_COMPRESSION_LEVEL")]
    pub compression_level: u32,

    /// Maximum number of decoded sources retained between requests.
    #[arg(long, default_value_t = DEFAULT_READER_CACHE_CAPACITY, env = "RASTILE_READER_CACHE")]
    pub reader_cache: usize,

    /// Pixel count above which a decoded source is not retained.
    #[arg(long, default_value_t = DEFAULT_MAX_DECODED_PIXELS, env = "RASTILE_MAX_DECODED_PIXELS")]
    pub max_decoded_pixels: u64,

    // =========================================================================
    // Compute Configuration
    // =========================================================================
    /// Number of compute worker threads.
    #[arg(long, default_value_t = DEFAULT_WORKERS, env = "RASTILE_WORKERS")]
    pub workers: usize,

    /// Run tile computation on a single worker thread.
    #[arg(long, default_value_t = false, env = "RASTILE_SERIAL")]
    pub serial: bool,

    // =========================================================================
    // Tile Configuration
    // =========================================================================
    /// Default output tile edge in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "RASTILE_TILE_SIZE")]
    pub tile_size: u32,

    /// Default resampling kernel: average or nearest.
    #[arg(long, default_value = DEFAULT_RESAMPLING_METHOD, env = "RASTILE_RESAMPLING")]
    pub resampling: String,

    /// Reprojection interpolation recorded for the target grid.
    #[arg(long, default_value = DEFAULT_REPROJECTION_METHOD, env = "RASTILE_REPROJECTION")]
    pub reprojection: String,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "RASTILE_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "RASTILE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_path.is_empty() {
            return Err(
                "Raster base path is required. Set --base-path or RASTILE_BASE_PATH".to_string(),
            );
        }

        if !self.source_extension.starts_with('.') {
            return Err(format!(
                "source_extension must include the leading dot, got {:?}",
                self.source_extension
            ));
        }

        let cache_bytes = self.cache_size_bytes()?;
        if cache_bytes == 0 {
            return Err("cache_size must be greater than 0".to_string());
        }

        if self.compression_level > 9 {
            return Err("compression_level must be between 0 and 9".to_string());
        }

        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }

        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(format!("tile_size must be between 1 and {}", MAX_TILE_SIZE));
        }

        if self.resampling != "average" && self.resampling != "nearest" {
            return Err(format!(
                "resampling must be \"average\" or \"nearest\", got {:?}",
                self.resampling
            ));
        }

        if self.reader_cache == 0 {
            return Err("reader_cache must be greater than 0".to_string());
        }

        if let Some(nodata) = &self.nodata {
            if nodata.parse::<f64>().is_err() {
                return Err(format!("nodata must be numeric, got {:?}", nodata));
            }
        }

        Ok(())
    }

    /// Get the cache capacity in bytes, parsing the human-readable size.
    pub fn cache_size_bytes(&self) -> Result<u64, String> {
        parse_size(&self.cache_size)
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration for the `check` command.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Directory containing the raster source files.
    #[arg(long, env = "RASTILE_BASE_PATH")]
    pub base_path: String,

    /// File extension of raster sources, including the leading dot.
    #[arg(long, default_value = DEFAULT_SOURCE_EXTENSION, env = "RASTILE_SOURCE_EXTENSION")]
    pub source_extension: String,

    /// Sample value treated as missing data.
    #[arg(long, env = "RASTILE_NODATA")]
    pub nodata: Option<String>,

    /// Dataset key pair to read, e.g. `rastile check elevation 2020`.
    #[arg(num_args = 2, value_names = ["KEY0", "KEY1"])]
    pub dataset: Vec<String>,

    /// Output edge in pixels for the test read.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    pub size: u32,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Size Parsing
// =============================================================================

/// Parse a human-readable byte size such as "490MB", "64K", or "1048576".
pub fn parse_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("size is empty".to_string());
    }

    let upper = trimmed.to_ascii_uppercase();
    let (digits, multiplier) = if let Some(rest) = upper
        .strip_suffix("GB")
        .or_else(|| upper.strip_suffix('G'))
    {
        (rest, 1024 * 1024 * 1024)
    } else if let Some(rest) = upper
        .strip_suffix("MB")
        .or_else(|| upper.strip_suffix('M'))
    {
        (rest, 1024 * 1024)
    } else if let Some(rest) = upper
        .strip_suffix("KB")
        .or_else(|| upper.strip_suffix('K'))
    {
        (rest, 1024)
    } else if let Some(rest) = upper.strip_suffix('B') {
        (rest, 1)
    } else {
        (upper.as_str(), 1)
    };

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid size {:?}", input))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size {:?} overflows", input))
}

// =============================================================================
// Tests
// =============================================================================
