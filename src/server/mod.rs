//! HTTP server layer for rastile.
//!
//! This module provides the HTTP API for serving computed raster tiles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │       GET /singleband/{dataset}/{layer}/{z}/{x}/{y}.png         │
//! │                                                                 │
//! │      ┌──────────────────────┐  ┌─────────────────────────┐      │
//! │      │       handlers       │  │         routes          │      │
//! │      │ (requests, rendering)│  │    (router config)      │      │
//! │      └──────────────────────┘  └─────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, preview_handler, tile_handler, ApiError, AppState, ErrorResponse,
    HealthResponse, PreviewPathParams, TilePathParams, TileQueryParams,
};
pub use routes::{create_router, RouterConfig};
