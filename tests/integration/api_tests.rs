//! API integration tests for tile retrieval and error handling.
//!
//! Tests verify:
//! - Tile and preview retrieval over real raster files
//! - Error cases (missing dataset, invalid coordinates, bad parameters)
//! - HTTP response codes and headers

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::test_utils::{
    decode_png, is_valid_png, make_router, temp_base_path, write_gradient_source, write_source,
};

async fn get(router: &axum::Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

// =============================================================================
// Basic Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_tile_retrieval_success() {
    let base = temp_base_path();
    write_gradient_source(&base, "elevation", "2020", 64);
    let router = make_router(&base);

    let (status, headers, body) = get(&router, "/singleband/elevation/2020/0/0/0.png").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), "image/png");
    assert!(headers.contains_key("cache-control"));
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "false");
    assert!(is_valid_png(&body));

    let image = decode_png(&body);
    assert_eq!(image.width(), 256);
    assert_eq!(image.height(), 256);
}

#[tokio::test]
async fn test_second_request_is_a_cache_hit() {
    let base = temp_base_path();
    write_gradient_source(&base, "elevation", "2020", 32);
    let router = make_router(&base);

    let (_, first_headers, first_body) =
        get(&router, "/singleband/elevation/2020/1/0/1.png").await;
    let (status, second_headers, second_body) =
        get(&router, "/singleband/elevation/2020/1/0/1.png").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first_headers.get("x-tile-cache-hit").unwrap(), "false");
    assert_eq!(second_headers.get("x-tile-cache-hit").unwrap(), "true");
    // Cached and freshly computed tiles render identically
    assert_eq!(first_body, second_body);
}

#[tokio::test]
async fn test_y_extension_is_optional() {
    let base = temp_base_path();
    write_gradient_source(&base, "elevation", "2020", 32);
    let router = make_router(&base);

    let (bare_status, _, bare) = get(&router, "/singleband/elevation/2020/0/0/0").await;
    let (png_status, _, png) = get(&router, "/singleband/elevation/2020/0/0/0.png").await;

    assert_eq!(bare_status, StatusCode::OK);
    assert_eq!(png_status, StatusCode::OK);
    assert_eq!(bare, png);
}

#[tokio::test]
async fn test_size_parameter_changes_output_dimensions() {
    let base = temp_base_path();
    write_gradient_source(&base, "elevation", "2020", 32);
    let router = make_router(&base);

    let (status, _, body) = get(&router, "/singleband/elevation/2020/0/0/0.png?size=64").await;

    assert_eq!(status, StatusCode::OK);
    let image = decode_png(&body);
    assert_eq!(image.width(), 64);
    assert_eq!(image.height(), 64);
}

#[tokio::test]
async fn test_stretch_parameters_rescale_values() {
    let base = temp_base_path();
    // Constant value 50 everywhere
    write_source(&base, "flat", "x", 4, vec![50; 16]);
    let router = make_router(&base);

    let (_, _, body) =
        get(&router, "/singleband/flat/x/0/0/0.png?size=4&min=0&max=50").await;

    let image = decode_png(&body);
    // 50 stretched over [0, 50] saturates to white
    assert_eq!(image.get_pixel(0, 0).0, [255, 255]);
}

// =============================================================================
// Preview Endpoint
// =============================================================================

#[tokio::test]
async fn test_preview_retrieval_success() {
    let base = temp_base_path();
    write_gradient_source(&base, "elevation", "2020", 32);
    let router = make_router(&base);

    let (status, headers, body) =
        get(&router, "/singleband/elevation/2020/preview?size=16").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), "image/png");
    let image = decode_png(&body);
    assert_eq!(image.width(), 16);
}

#[tokio::test]
async fn test_preview_and_tile_zero_are_cached_separately() {
    let base = temp_base_path();
    write_gradient_source(&base, "elevation", "2020", 32);
    let router = make_router(&base);

    get(&router, "/singleband/elevation/2020/preview").await;
    let (_, headers, _) = get(&router, "/singleband/elevation/2020/0/0/0.png").await;

    // The whole-dataset preview must not satisfy the tile request
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "false");
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_missing_dataset_returns_404() {
    let base = temp_base_path();
    let router = make_router(&base);

    let (status, headers, body) = get(&router, "/singleband/absent/layer/0/0/0.png").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers.get("content-type").unwrap(), "application/json");
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_non_numeric_tile_row_returns_400() {
    let base = temp_base_path();
    write_gradient_source(&base, "elevation", "2020", 32);
    let router = make_router(&base);

    let (status, _, body) = get(&router, "/singleband/elevation/2020/0/0/five.png").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid_request");
}

#[tokio::test]
async fn test_out_of_grid_coordinates_return_400() {
    let base = temp_base_path();
    write_gradient_source(&base, "elevation", "2020", 32);
    let router = make_router(&base);

    // Zoom 1 grid is 2x2; x = 2 is outside it
    let (status, _, _) = get(&router, "/singleband/elevation/2020/1/2/0.png").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_resampling_returns_400() {
    let base = temp_base_path();
    write_gradient_source(&base, "elevation", "2020", 32);
    let router = make_router(&base);

    let (status, _, body) =
        get(&router, "/singleband/elevation/2020/0/0/0.png?resampling=cubic").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid_resampling");
}

#[tokio::test]
async fn test_inverted_stretch_returns_400() {
    let base = temp_base_path();
    write_gradient_source(&base, "elevation", "2020", 32);
    let router = make_router(&base);

    let (status, _, body) =
        get(&router, "/singleband/elevation/2020/0/0/0.png?min=200&max=10").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid_stretch");
}

#[tokio::test]
async fn test_traversal_keys_are_rejected() {
    let base = temp_base_path();
    let router = make_router(&base);

    let (status, _, _) = get(&router, "/singleband/..%2F..%2Fetc/passwd/0/0/0.png").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Health Check
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let base = temp_base_path();
    let router = make_router(&base);

    let (status, _, body) = get(&router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
