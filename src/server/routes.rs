//! Router configuration for rastile.
//!
//! This module defines the HTTP routes and applies middleware for CORS and
//! request tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health                                          - Health check
//! /singleband/{dataset}/{layer}/{z}/{x}/{y}.png    - Tile endpoint
//! /singleband/{dataset}/{layer}/preview            - Whole-dataset preview
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rastile::raster::RasterComputer;
//! use rastile::server::{create_router, RouterConfig};
//! use rastile::store::{ComputePool, CompressedTileCache, SourceResolver, TileStore};
//!
//! let store = TileStore::new(
//!     Arc::new(CompressedTileCache::with_capacity(490 * 1024 * 1024, 9)),
//!     ComputePool::new(3, false),
//!     Arc::new(RasterComputer::new(16, 120_000_000)),
//! );
//! let resolver = SourceResolver::new("/data/rasters", ".tif", None, store);
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//! let router = create_router(resolver, config);
//!
//! // Run the server
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, preview_handler, tile_handler, AppState};
use crate::config::DEFAULT_CACHE_MAX_AGE;
use crate::store::SourceResolver;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None, // Allow any origin by default
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    /// Pass None (or don't call this method) to allow any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - Health check route
/// - Tile and preview routes
/// - CORS configuration
/// - Request tracing (optional)
///
/// # Arguments
///
/// * `resolver` - The source resolver owning the tile store
/// * `config` - Router configuration
///
/// # Returns
///
/// A configured Axum router ready to be served.
pub fn create_router(resolver: SourceResolver, config: RouterConfig) -> Router {
    let app_state = AppState::with_cache_max_age(resolver, config.cache_max_age);

    let cors = build_cors_layer(&config);

    // Uses {filename} to capture both "{y}" and "{y}.png" formats
    let router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/singleband/{dataset}/{layer}/{z}/{x}/{filename}",
            get(tile_handler),
        )
        .route("/singleband/{dataset}/{layer}/preview", get(preview_handler))
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => {
            // No origins allowed - this effectively disables CORS
            cors
        }
        Some(origins) => {
            // Parse origins into HeaderValues
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
