//! End-to-end service tests over real raster files.
//!
//! These run the full path the server uses — resolver, store, compute pool,
//! raster computer, cache — against temporary datasets on disk, through the
//! blocking retrieval contract a non-async caller would use.

use std::thread;

use rastile::raster::TileCoord;
use rastile::StoreError;

use super::test_utils::{
    make_resolver, make_resolver_with_nodata, temp_base_path, write_gradient_source, write_source,
};

// =============================================================================
// Tile Content
// =============================================================================

#[test]
fn test_quadrant_tiles_have_quadrant_content() {
    let base = temp_base_path();
    // 2x2 source with one value per quadrant-to-be
    write_source(&base, "quad", "v1", 2, vec![10, 20, 30, 40]);
    let resolver = make_resolver(&base);

    for (x, y, expected) in [(0, 0, 10.0), (1, 0, 20.0), (0, 1, 30.0), (1, 1, 40.0)] {
        let mut request = resolver
            .tile_request(&["quad", "v1"], Some(TileCoord::new(1, x, y)))
            .unwrap();
        request.size = (1, 1);

        let tile = resolver.lookup_or_submit(request).unwrap().wait().unwrap();
        assert_eq!(tile.value_at(0), expected, "tile 1/{}/{}", x, y);
        assert_eq!(tile.valid_count(), 1);
    }
}

#[test]
fn test_preview_resamples_the_whole_dataset() {
    let base = temp_base_path();
    write_source(&base, "quad", "v1", 2, vec![10, 20, 30, 40]);
    let resolver = make_resolver(&base);

    let mut request = resolver.tile_request(&["quad", "v1"], None).unwrap();
    request.size = (1, 1);

    let tile = resolver.lookup_or_submit(request).unwrap().wait().unwrap();
    // Average of all four quadrants
    assert_eq!(tile.value_at(0), 25.0);
}

#[test]
fn test_preserve_values_forces_source_samples() {
    let base = temp_base_path();
    write_source(&base, "quad", "v1", 2, vec![10, 20, 30, 40]);
    let resolver = make_resolver(&base);

    let mut request = resolver.tile_request(&["quad", "v1"], None).unwrap();
    request.size = (1, 1);
    request.preserve_values = true;

    let tile = resolver.lookup_or_submit(request).unwrap().wait().unwrap();
    // Nearest sampling picks an actual source value rather than a mean
    assert!([10.0, 20.0, 30.0, 40.0].contains(&tile.value_at(0)));
}

#[test]
fn test_nodata_pixels_are_masked() {
    let base = temp_base_path();
    write_source(&base, "gaps", "v1", 2, vec![0, 50, 0, 50]);
    let resolver = make_resolver_with_nodata(&base, Some("0".to_string()));

    let mut request = resolver.tile_request(&["gaps", "v1"], None).unwrap();
    request.size = (2, 2);
    request.resampling_method = "nearest".to_string();

    let tile = resolver.lookup_or_submit(request).unwrap().wait().unwrap();
    assert_eq!(tile.valid_count(), 2);
    assert!(tile.masked_at(0));
    assert!(!tile.masked_at(1));
}

#[test]
fn test_tiles_beyond_source_coverage_are_fully_masked() {
    let base = temp_base_path();
    write_gradient_source(&base, "small", "v1", 16);
    let resolver = make_resolver(&base);

    // At zoom 10 a 16-pixel raster leaves most cells without any pixel
    let mut request = resolver
        .tile_request(&["small", "v1"], Some(TileCoord::new(10, 1, 1)))
        .unwrap();
    request.size = (4, 4);

    let tile = resolver.lookup_or_submit(request).unwrap().wait().unwrap();
    assert_eq!(tile.valid_count(), 0);
}

// =============================================================================
// Caching Through the Full Stack
// =============================================================================

#[test]
fn test_repeated_reads_populate_and_use_the_cache() {
    let base = temp_base_path();
    write_gradient_source(&base, "elevation", "2020", 32);
    let resolver = make_resolver(&base);

    let request = resolver
        .tile_request(&["elevation", "2020"], Some(TileCoord::new(0, 0, 0)))
        .unwrap();

    let miss = resolver.lookup_or_submit(request.clone()).unwrap();
    assert!(!miss.is_ready());
    let first = miss.wait().unwrap();
    assert_eq!(resolver.store().cache_stats().entries, 1);

    let hit = resolver.lookup_or_submit(request).unwrap();
    assert!(hit.is_ready());
    assert_eq!(hit.wait().unwrap(), first);
}

#[test]
fn test_datasets_do_not_share_cache_entries() {
    let base = temp_base_path();
    write_source(&base, "a", "x", 2, vec![10; 4]);
    write_source(&base, "b", "x", 2, vec![200; 4]);
    let resolver = make_resolver(&base);

    let mut first = resolver.tile_request(&["a", "x"], None).unwrap();
    first.size = (1, 1);
    let mut second = resolver.tile_request(&["b", "x"], None).unwrap();
    second.size = (1, 1);

    let a = resolver.lookup_or_submit(first).unwrap().wait().unwrap();
    let b = resolver.lookup_or_submit(second).unwrap().wait().unwrap();

    assert_eq!(a.value_at(0), 10.0);
    assert_eq!(b.value_at(0), 200.0);
    assert_eq!(resolver.store().cache_stats().entries, 2);
}

#[test]
fn test_blocking_retrieval_from_plain_threads() {
    let base = temp_base_path();
    write_gradient_source(&base, "elevation", "2020", 32);
    let resolver = std::sync::Arc::new(make_resolver(&base));

    let mut handles = vec![];
    for worker in 0..4 {
        let resolver = std::sync::Arc::clone(&resolver);
        handles.push(thread::spawn(move || {
            let mut request = resolver
                .tile_request(
                    &["elevation", "2020"],
                    Some(TileCoord::new(1, worker % 2, worker / 2)),
                )
                .unwrap();
            request.size = (8, 8);
            resolver.lookup_or_submit(request).unwrap().wait().unwrap()
        }));
    }

    for handle in handles {
        let tile = handle.join().unwrap();
        assert_eq!(tile.pixel_count(), 64);
    }
}

// =============================================================================
// Failure Paths
// =============================================================================

#[test]
fn test_missing_source_propagates_not_found() {
    let base = temp_base_path();
    let resolver = make_resolver(&base);

    let request = resolver.tile_request(&["absent", "layer"], None).unwrap();
    let result = resolver.lookup_or_submit(request).unwrap().wait();

    assert!(matches!(result, Err(StoreError::Compute(_))));
    // Failures are never cached
    assert_eq!(resolver.store().cache_stats().entries, 0);
}

#[test]
fn test_undecodable_source_propagates_and_is_not_cached() {
    let base = temp_base_path();
    std::fs::write(base.join("broken_v1.tif"), b"this is not a raster").unwrap();
    let resolver = make_resolver(&base);

    let request = resolver.tile_request(&["broken", "v1"], None).unwrap();
    let result = resolver.lookup_or_submit(request.clone()).unwrap().wait();
    assert!(matches!(result, Err(StoreError::Compute(_))));

    // The next attempt reaches the computer again rather than a cached error
    let again = resolver.lookup_or_submit(request).unwrap();
    assert!(!again.is_ready());
    assert!(again.wait().is_err());
}
