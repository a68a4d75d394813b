use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use lynx_api::vault::Vault;
use lynx_api::{ingest, pins, stream, AppState};
use lynx_db::Database;
use lynx_hub::PinHub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lynx=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = std::env::var("LYNX_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("LYNX_PORT")
        .unwrap_or_else(|_| "8000".into())
        .parse()?;
    let db_path: PathBuf = std::env::var("LYNX_DB_PATH")
        .unwrap_or_else(|_| "data/lynx.db".into())
        .into();
    let upload_dir: PathBuf = std::env::var("LYNX_UPLOAD_DIR")
        .unwrap_or_else(|_| "uploads".into())
        .into();

    // Init store, vault and hub
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db = Arc::new(Database::open(&db_path)?);
    let vault = Arc::new(Vault::new(upload_dir).await?);
    let hub = PinHub::new();

    let state = AppState { db, hub, vault };

    let app = Router::new()
        .route("/health", get(lynx_api::health))
        .route("/api/pins", get(pins::list_pins))
        .route("/api/pins", post(pins::create_pin))
        .route("/api/pins", delete(pins::wipe))
        .route("/api/wipe", post(pins::wipe))
        .route("/api/upload", post(ingest::upload))
        .route("/api/ingest", post(ingest::ingest))
        .route("/api/pins/stream", get(stream::pins_stream))
        .layer(DefaultBodyLimit::max(256 * 1024 * 1024)) // 256 MB uploads
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Lynx API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
