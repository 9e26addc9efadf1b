//! Playback Server
//!
//! Serves per-session controlled, ffmpeg-transcoded MP4 streams of local
//! media files.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use playback_server::config::ServerConfig;
use playback_server::config_file::{generate_default_config, load_config};
use playback_server::http::create_router;
use playback_server::session::start_expiry_task;
use playback_server::state::AppState;
use playback_server::{PlaybackError, Result};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "playback-server";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let first = args.next();

    // `--generate-config [path]` writes the defaults and exits
    if first.as_deref() == Some("--generate-config") {
        let path = args.next().unwrap_or_else(|| "config.toml".to_string());
        generate_default_config(&path)?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }

    // Load configuration
    let config_path = first.unwrap_or_else(|| "config.toml".to_string());
    let loaded = load_config(&config_path);
    let config = match &loaded {
        Ok(Some(config)) => config.clone(),
        _ => ServerConfig::default(),
    }
    .with_env_overrides();

    // Initialize logging
    init_logging(&config);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    match loaded {
        Ok(Some(_)) => tracing::info!("Configuration loaded from {}", config_path),
        Ok(None) => tracing::info!("No config file at {}, using defaults", config_path),
        Err(e) => tracing::warn!(
            "Failed to load config file {}: {}. Using defaults.",
            config_path,
            e
        ),
    }
    tracing::debug!("Configuration: {:?}", config);

    // Create application state
    let state = Arc::new(AppState::new(config.clone()));

    // Periodic session expiry
    let sweeper = start_expiry_task(state.sessions.clone(), config.session.clone());

    // Build router
    let app = create_router(state.clone());

    // Start server
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| PlaybackError::Config(format!("invalid listen address: {}", e)))?;
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Server stopped");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("playback_server={},tower_http=info", config.log_level).into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    if config.log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolve on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
