pub mod error;
pub mod ingest;
pub mod pins;
pub mod stream;
pub mod vault;

use std::sync::Arc;

use axum::Json;

use lynx_db::Database;
use lynx_hub::PinHub;
use lynx_types::api::HealthResponse;

use crate::error::ApiError;
use crate::vault::Vault;

/// Shared application state for all route handlers. Constructed once at
/// process start and handed to the router.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub hub: PinHub,
    pub vault: Arc<Vault>,
}

/// GET /health — liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: "lynx-api",
    })
}

/// Run blocking SQLite work off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking join error: {}", e);
            ApiError::Storage(anyhow::anyhow!("blocking task failed: {}", e))
        })?
        .map_err(ApiError::Storage)
}
