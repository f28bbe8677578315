//! HexMem server binary.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hexmem::{api, config, AppState, Result};

/// Decay sweep interval.
const DECAY_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Analytics prune interval.
const ANALYTICS_PRUNE_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hexmem=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::init();
    tracing::info!(
        "Starting HexMem server on {}:{}",
        config.server.host,
        config.server.port
    );

    // Initialize application state (pool + migrations + services)
    let state = AppState::new().await?;
    tracing::info!(embedder = %state.embedder.name(), "Application state initialized");

    // Background timers: hourly decay sweep, 6-hourly analytics prune.
    let decay = state.decay.clone();
    let decay_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DECAY_SWEEP_INTERVAL);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            if let Err(e) = decay.sweep(None).await {
                tracing::warn!(error = %e, "Scheduled decay sweep failed");
            }
        }
    });

    let analytics = state.analytics.clone();
    let prune_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ANALYTICS_PRUNE_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            analytics.prune().await;
        }
    });

    // Build router
    let app = Router::new()
        .merge(api::routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Invalid address");

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background timers once the server has drained.
    decay_handle.abort();
    prune_handle.abort();
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
