//! HTTP request handlers for the raster tile API.
//!
//! This module contains the Axum handlers for serving tiles and health checks.
//!
//! # Endpoints
//!
//! - `GET /singleband/{dataset}/{layer}/{z}/{x}/{y}.png` - Serve a tile
//! - `GET /singleband/{dataset}/{layer}/preview` - Whole-dataset preview
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config;
use crate::error::{ComputeError, RenderError, StoreError};
use crate::raster::TileCoord;
use crate::render::encode_png;
use crate::store::SourceResolver;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the source resolver.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Resolver owning the tile store and compute workers
    pub resolver: Arc<SourceResolver>,

    /// Default cache control max-age in seconds (defaults to 1 hour)
    pub cache_max_age: u32,
}

impl AppState {
    /// Create a new application state with the given resolver.
    pub fn new(resolver: SourceResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
            cache_max_age: 3600, // 1 hour default
        }
    }

    /// Create a new application state with custom cache max-age.
    pub fn with_cache_max_age(resolver: SourceResolver, cache_max_age: u32) -> Self {
        Self {
            resolver: Arc::new(resolver),
            cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from: `/singleband/{dataset}/{layer}/{z}/{x}/{filename}`
/// where filename is `{y}` or `{y}.png`
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    /// First dataset key
    pub dataset: String,

    /// Second dataset key
    pub layer: String,

    /// Zoom level (grid is 2^z cells per axis)
    pub z: u8,

    /// Tile X coordinate (0-indexed from west)
    pub x: u32,

    /// Tile Y coordinate with optional .png extension (e.g., "0" or "0.png")
    pub filename: String,
}

impl TilePathParams {
    /// Parse the Y coordinate from the filename, stripping any .png extension.
    pub fn y(&self) -> Result<u32, std::num::ParseIntError> {
        let y_str = self.filename.strip_suffix(".png").unwrap_or(&self.filename);
        y_str.parse()
    }
}

/// Path parameters for preview requests.
#[derive(Debug, Deserialize)]
pub struct PreviewPathParams {
    /// First dataset key
    pub dataset: String,

    /// Second dataset key
    pub layer: String,
}

/// Query parameters for tile and preview requests.
#[derive(Debug, Deserialize)]
pub struct TileQueryParams {
    /// Output size in pixels per side (default: 256, max: 2048)
    #[serde(default = "default_size")]
    pub size: u32,

    /// Value mapped to black in the rendered PNG (default: 0)
    #[serde(default = "default_stretch_min")]
    pub min: f64,

    /// Value mapped to white in the rendered PNG (default: 255)
    #[serde(default = "default_stretch_max")]
    pub max: f64,

    /// Restrict resampling to values present in the source
    #[serde(default)]
    pub preserve_values: bool,

    /// Resampling kernel override: `average` or `nearest`
    #[serde(default)]
    pub resampling: Option<String>,
}

fn default_size() -> u32 {
    config::DEFAULT_TILE_SIZE
}

fn default_stretch_min() -> f64 {
    config::DEFAULT_STRETCH_MIN
}

fn default_stretch_max() -> f64 {
    config::DEFAULT_STRETCH_MAX
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Build the error response, logging by severity:
/// - 5xx errors are logged at ERROR level (server errors)
/// - 404s are logged at DEBUG level (common and expected)
/// - other 4xx errors are logged at WARN level (client errors)
fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else if status.is_client_error() {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let error_response = ErrorResponse::with_status(error_type, message, status);
    (status, Json(error_response)).into_response()
}

/// Convert StoreError to HTTP response.
impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            // 400 Bad Request - the request cannot address a tile
            StoreError::InvalidRequest { reason } => (
                StatusCode::BAD_REQUEST,
                "invalid_request",
                format!("Invalid request: {}", reason),
            ),

            StoreError::Compute(compute_err) => match compute_err {
                // 404 Not Found
                ComputeError::SourceNotFound { path } => (
                    StatusCode::NOT_FOUND,
                    "not_found",
                    format!("Dataset not found: {}", path),
                ),

                ComputeError::UnsupportedFormat { path, format } => (
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "unsupported_format",
                    format!("Unsupported source format {} for {}", format, path),
                ),

                ComputeError::UnknownResampling(method) => (
                    StatusCode::BAD_REQUEST,
                    "invalid_resampling",
                    format!("Unknown resampling method: {}", method),
                ),

                // Reader options come from server configuration
                ComputeError::InvalidOption { option, value } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "invalid_option",
                    format!("Invalid reader option {}={}", option, value),
                ),

                ComputeError::Decode { path, message } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "decode_error",
                    format!("Failed to decode {}: {}", path, message),
                ),
            },

            // 500 Internal Server Error - compute workers unavailable
            StoreError::PoolBroken { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "compute_unavailable",
                format!("Tile computation unavailable: {}", message),
            ),
        };

        error_response(status, error_type, message)
    }
}

/// Convert RenderError to HTTP response.
impl IntoResponse for RenderError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            RenderError::InvalidStretch { lower, upper } => (
                StatusCode::BAD_REQUEST,
                "invalid_stretch",
                format!(
                    "Invalid stretch range: min {} must be below max {}",
                    lower, upper
                ),
            ),

            RenderError::Encode { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "encode_error",
                format!("Failed to encode tile: {}", message),
            ),
        };

        error_response(status, error_type, message)
    }
}

/// Wrapper unifying handler errors so both store and render failures can be
/// propagated with `?`.
pub enum ApiError {
    Store(StoreError),
    Render(RenderError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Store(err) => err.into_response(),
            ApiError::Render(err) => err.into_response(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        ApiError::Render(err)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /singleband/{dataset}/{layer}/{z}/{x}/{y}.png`
///
/// # Path Parameters
///
/// - `dataset`, `layer`: Dataset key pair
/// - `z`: Zoom level (grid is 2^z cells per axis)
/// - `x`: Tile X coordinate
/// - `y`: Tile Y coordinate (the `.png` extension is optional)
///
/// # Query Parameters
///
/// - `size`: Output pixels per side (default: 256)
/// - `min`, `max`: Contrast stretch range (defaults: 0, 255)
/// - `preserve_values`: Restrict resampling to source values
/// - `resampling`: Kernel override, `average` or `nearest`
///
/// # Response
///
/// - `200 OK`: PNG tile with `Content-Type: image/png`
/// - `400 Bad Request`: Invalid coordinates, stretch range, or resampling
/// - `404 Not Found`: Dataset not found
/// - `415 Unsupported Media Type`: Source format not supported
/// - `500 Internal Server Error`: Computation or encoding error
///
/// # Headers
///
/// - `Content-Type: image/png`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Tile-Cache-Hit: true|false`
pub async fn tile_handler(
    State(state): State<AppState>,
    Path(params): Path<TilePathParams>,
    Query(query): Query<TileQueryParams>,
) -> Result<Response, ApiError> {
    // Parse Y coordinate from filename (handles both "0" and "0.png")
    let y = params.y().map_err(|_| StoreError::InvalidRequest {
        reason: format!("invalid tile row {:?}", params.filename),
    })?;
    let coord = TileCoord::new(params.z, params.x, y);

    let request = build_request(&state, &params.dataset, &params.layer, Some(coord), &query)?;
    serve_tile(&state, request, &query).await
}

/// Handle whole-dataset preview requests.
///
/// # Endpoint
///
/// `GET /singleband/{dataset}/{layer}/preview`
///
/// Resamples the entire source into one image instead of a single grid
/// cell. Accepts the same query parameters as the tile endpoint.
pub async fn preview_handler(
    State(state): State<AppState>,
    Path(params): Path<PreviewPathParams>,
    Query(query): Query<TileQueryParams>,
) -> Result<Response, ApiError> {
    let request = build_request(&state, &params.dataset, &params.layer, None, &query)?;
    serve_tile(&state, request, &query).await
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "ok",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn build_request(
    state: &AppState,
    dataset: &str,
    layer: &str,
    coord: Option<TileCoord>,
    query: &TileQueryParams,
) -> Result<crate::store::TileRequest, StoreError> {
    let mut request = state.resolver.tile_request(&[dataset, layer], coord)?;

    // Clamp size to sane bounds
    let size = query.size.clamp(1, config::MAX_TILE_SIZE);
    request.size = (size, size);
    request.preserve_values = query.preserve_values;
    if let Some(resampling) = &query.resampling {
        request.resampling_method = resampling.clone();
    }
    Ok(request)
}

async fn serve_tile(
    state: &AppState,
    request: crate::store::TileRequest,
    query: &TileQueryParams,
) -> Result<Response, ApiError> {
    let future = state.resolver.lookup_or_submit(request)?;
    let cache_hit = future.is_ready();
    let tile = future.resolve().await?;

    let png = encode_png(&tile, query.min, query.max)?;

    // Build HTTP response with appropriate headers
    let http_response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        )
        .header("X-Tile-Cache-Hit", cache_hit.to_string())
        .body(axum::body::Body::from(png))
        .unwrap();

    Ok(http_response)
}

// =============================================================================
// Tests
// =============================================================================
