pub mod catalog;
pub mod config;
pub mod middleware;
pub mod prefetch;
pub mod sampler;
pub mod server;
pub mod shell;
pub mod util;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Cached posters older than this are dropped at startup.
const IMAGE_CACHE_MAX_AGE_DAYS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] catalog::CatalogError),
    #[error("Image cache error: {0}")]
    ImageCache(#[from] util::ImageResizerError),
    #[error("Server error: {0}")]
    Server(String),
}

pub async fn run(config_path: &str, debug_logs: bool) -> Result<(), ServerError> {
    let mut config = config::Config::from_file(config_path)?;
    config.debug_logs = debug_logs;

    info!("Using config file: {}", config_path);
    info!("Site: {}", config.site.title);
    if debug_logs {
        info!("Debug logging enabled");
    }

    let catalog_source = catalog::open_source(&config.catalog).await?;

    let cache_dir = config.get_image_cache_dir();
    info!("Image cache at {:?}", cache_dir);
    let image_resizer = Arc::new(util::ImageResizer::new(cache_dir)?);
    match image_resizer.cleanup_old_cache(IMAGE_CACHE_MAX_AGE_DAYS) {
        Ok(removed) if removed > 0 => info!("Removed {} stale cached images", removed),
        Ok(_) => {}
        Err(e) => warn!("Failed to clean image cache: {}", e),
    }
    if let Ok(stats) = image_resizer.get_cache_stats() {
        info!(
            files = stats.total_files,
            bytes = stats.total_size,
            "Image cache ready"
        );
    }

    let address = config.listen.address.as_deref().unwrap_or("[::]");
    let port = &config.listen.port;
    let addr: SocketAddr = format!("{}:{}", address, port)
        .parse()
        .map_err(|e| ServerError::Server(format!("Invalid address: {}", e)))?;

    let tls = match (&config.listen.tlscert, &config.listen.tlskey) {
        (Some(cert), Some(key)) => Some((cert.clone(), key.clone())),
        _ => None,
    };

    let state = server::AppState::new(config, catalog_source, image_resizer);

    // Warm up once so the first visitor does not pay for the poster fetches.
    state.load_catalog().await;

    let app = server::build_router(state);

    if let Some((cert_path, key_path)) = tls {
        info!("Loading TLS certificate from {}", cert_path);
        info!("Loading TLS key from {}", key_path);

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .map_err(|e| ServerError::Server(format!("Failed to load TLS config: {}", e)))?;

        info!("Serving HTTPS on {}", addr);

        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
    } else {
        info!("Serving HTTP on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Server(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
    }

    Ok(())
}
