//! Sensorhub Service - MQTT ingestion and HTTP query API.
//!
//! Run with: `cargo run -p sensorhub-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[cfg(feature = "mqtt")]
use sensorhub_service::MqttSubscriber;
use sensorhub_service::{AppState, Config, api};
use sensorhub_store::Store;

/// Sensorhub Service - MQTT ingestion and HTTP REST API.
#[derive(Parser, Debug)]
#[command(name = "sensorhub-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "SENSORHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long, env = "SENSORHUB_BIND")]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long, env = "SENSORHUB_DATABASE")]
    database: Option<PathBuf>,

    /// Disable the MQTT subscriber (API only mode).
    #[arg(long)]
    no_mqtt: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sensorhub_service=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }
    if args.no_mqtt {
        config.mqtt.enabled = false;
    }
    config.validate()?;

    info!("Opening database at {:?}", config.storage.path);
    let store = Store::open(&config.storage.path)?;

    let addr: SocketAddr = config.server.bind.parse()?;
    let state = AppState::new(store, config);

    #[cfg(feature = "mqtt")]
    let subscriber = MqttSubscriber::new(Arc::clone(&state)).start().await;
    #[cfg(not(feature = "mqtt"))]
    let subscriber: Option<tokio::task::JoinHandle<()>> = {
        info!("Built without MQTT support, serving the API only");
        None
    };

    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::clone(&state));

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.mqtt.signal_stop();
    if let Some(handle) = subscriber {
        let _ = handle.await;
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
