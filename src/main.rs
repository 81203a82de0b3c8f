//! rastile - A raster tile server.
//!
//! This binary starts the HTTP server and configures all components.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rastile::{
    config::{CheckConfig, Cli, Command, ServeConfig},
    raster::RasterComputer,
    server::{create_router, RouterConfig},
    store::{CompressedTileCache, ComputePool, SourceResolver, TileStore},
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(config) => {
            // The compute side blocks on worker threads, so only the HTTP
            // surface needs the async runtime.
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    eprintln!("Failed to start async runtime: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            runtime.block_on(run_serve(config))
        }
        // Runs entirely on the calling thread, exercising the blocking
        // retrieval path.
        Command::Check(config) => run_check(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }
    // Checked by validate
    let cache_bytes = match config.cache_size_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("rastile v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Base path: {}", config.base_path);
    info!("  Source extension: {}", config.source_extension);
    info!(
        "  Cache: {}MB compressed tiles, zlib level {}",
        cache_bytes / (1024 * 1024),
        config.compression_level
    );
    if config.serial {
        info!("  Compute: 1 serial worker");
    } else {
        info!("  Compute: {} workers", config.workers);
    }

    // Probe the source directory before accepting requests
    match count_sources(&config.base_path, &config.source_extension) {
        Ok(count) => {
            info!("  Found {} dataset(s) under the base path", count);
        }
        Err(e) => {
            error!("Failed to read base path {}: {}", config.base_path, e);
            error!("");
            error!("  Please check:");
            error!("    - The directory exists and is readable");
            error!("    - RASTILE_BASE_PATH / --base-path points to your rasters");
            return ExitCode::FAILURE;
        }
    }

    let resolver = build_resolver(&config, cache_bytes);
    let router = create_router(resolver, build_router_config(&config));

    // Bind and serve
    let addr = config.bind_address();

    info!("");
    info!("Server listening on: http://{}", addr);
    info!("");
    info!("Try these endpoints:");
    info!("  curl http://{}/health", addr);
    info!(
        "  curl http://{}/singleband/<dataset>/<layer>/0/0/0.png -o tile.png",
        addr
    );
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Count raster sources under the base path.
fn count_sources(base_path: &str, extension: &str) -> Result<usize, std::io::Error> {
    let extension = extension.to_lowercase();
    let mut count = 0;
    for entry in std::fs::read_dir(base_path)? {
        let entry = entry?;
        if entry.file_type()?.is_file()
            && entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .ends_with(&extension)
        {
            count += 1;
        }
    }
    Ok(count)
}

/// Build the service context: cache, compute pool, computer, store, resolver.
fn build_resolver(config: &ServeConfig, cache_bytes: u64) -> SourceResolver {
    let cache = Arc::new(CompressedTileCache::with_capacity(
        cache_bytes,
        config.compression_level,
    ));
    let pool = ComputePool::new(config.workers, config.serial);
    let computer = Arc::new(RasterComputer::new(
        config.reader_cache,
        config.max_decoded_pixels,
    ));
    let store = TileStore::new(cache, pool, computer);

    SourceResolver::new(
        config.base_path.clone(),
        config.source_extension.clone(),
        config.nodata.clone(),
        store,
    )
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "rastile=debug,tower_http=debug"
    } else {
        "rastile=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Check Command
// =============================================================================

fn run_check(config: CheckConfig) -> ExitCode {
    // Initialize minimal logging for check command
    if config.verbose {
        init_logging(true);
    }

    println!("rastile Configuration Check");
    println!("═══════════════════════════");
    println!();

    if config.base_path.is_empty() {
        println!("✗ Base path: not set (use --base-path or RASTILE_BASE_PATH)");
        return ExitCode::FAILURE;
    }
    if !Path::new(&config.base_path).is_dir() {
        println!("✗ Base path: {} is not a directory", config.base_path);
        return ExitCode::FAILURE;
    }
    println!("✓ Base path: {}", config.base_path);

    // Build a serial, cache-less context: the point is to exercise one read
    let store = TileStore::new(
        Arc::new(CompressedTileCache::with_capacity(0, 0)),
        ComputePool::new(1, true),
        Arc::new(RasterComputer::new(1, u64::MAX)),
    );
    let resolver = SourceResolver::new(
        config.base_path.clone(),
        config.source_extension.clone(),
        config.nodata.clone(),
        store,
    );

    let keys: Vec<&str> = config.dataset.iter().map(String::as_str).collect();
    let path = match resolver.resolve_path(&keys) {
        Ok(path) => {
            println!("✓ Dataset: {}", path);
            path
        }
        Err(e) => {
            println!("✗ Dataset: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if !Path::new(&path).is_file() {
        println!("✗ Source file does not exist");
        return ExitCode::FAILURE;
    }
    println!();

    // Whole-dataset read through the blocking retrieval path
    print!("Reading whole dataset at {}x{}... ", config.size, config.size);
    let mut request = match resolver.tile_request(&keys, None) {
        Ok(request) => request,
        Err(e) => {
            println!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };
    request.size = (config.size, config.size);

    let started = Instant::now();
    let tile = match resolver
        .lookup_or_submit(request)
        .and_then(|future| future.wait())
    {
        Ok(tile) => {
            println!("✓ done in {:.2?}", started.elapsed());
            tile
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let valid = tile.valid_count();
    let pixels = tile.pixel_count();
    println!("  Shape: {}x{}", tile.width(), tile.height());
    println!("  Element type: {}", tile.dtype());
    println!(
        "  Valid pixels: {}/{} ({:.1}%)",
        valid,
        pixels,
        100.0 * valid as f64 / pixels.max(1) as f64
    );

    resolver.store().shutdown();

    println!();
    println!("═══════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
