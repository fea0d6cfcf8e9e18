//! # Dossier HTTP API Module
//!
//! HTTP REST API over a store, using axum.
//!
//! ## Endpoints
//!
//! Reads:
//!
//! - `GET /health` - Health check
//! - `GET /status` - Record and edge counts
//! - `GET /validate` - Validate the stored edges
//! - `GET /edges/{kind}` - List the stored edges of one kind
//! - `POST /query` - Timeline, chain or record queries
//!
//! Writes (write key and write throttle apply):
//!
//! - `POST /records` - Load a batch of base records
//! - `POST /recompute` - Recompute derived edges and return the report
//! - `POST /export` - Canonical export of the computed edges
//!
//! CORS origins and the write budget come from the `[server]` section of
//! `dossier.toml`; the write key from `DOSSIER_API_KEY`.

mod auth;
mod handlers;
mod throttle;
mod types;

pub use auth::{API_KEY_ENV, WriteKey};
pub use throttle::write_throttle;
pub use types::{
    EdgesResponse, ExportResponse, HealthResponse, LoadResponse, QueryResponse,
    RecomputeRequest, RecomputeResponse, StatusResponse, ValidateResponse,
};

use crate::config::ServerConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use dossier_core::{DossierError, Engine, Store};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body. Record batches are the big ones.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the store and the configured engine.
///
/// Loads and recomputations take the write lock, so they never interleave
/// with reads.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<Store>>,
    pub engine: Arc<Engine>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Store, engine: Engine) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            engine: Arc::new(engine),
        }
    }
}

/// Access rules of the HTTP surface.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Browser origins allowed to call the API. `"*"` allows any.
    pub cors_origins: Vec<String>,
    /// Writes accepted per minute, 0 for no limit.
    pub writes_per_minute: u32,
    /// Key required on writes, if any.
    pub write_key: Option<WriteKey>,
}

impl ApiSettings {
    /// Settings from the `[server]` section plus `DOSSIER_API_KEY`.
    pub fn from_config(server: &ServerConfig) -> Self {
        Self {
            cors_origins: server.cors_origins.clone(),
            writes_per_minute: server.writes_per_minute,
            write_key: WriteKey::from_env(),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o.trim() == "*") {
        tracing::warn!("CORS: any origin may call the API");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, "CORS: ignoring invalid origin: {}", e);
                None
            }
        })
        .collect();
    tracing::info!(origins = allowed.len(), "CORS configured");

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router.
///
/// Reads are open. Writes pass the key check first, then the throttle, so
/// rejected callers never spend the budget.
pub fn create_router(state: AppState, settings: &ApiSettings) -> Router {
    let reads = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/validate", get(handlers::validate_handler))
        .route("/edges/{kind}", get(handlers::edges_handler))
        .route("/query", post(handlers::query_handler));

    let mut writes = Router::new()
        .route("/records", post(handlers::load_handler))
        .route("/recompute", post(handlers::recompute_handler))
        .route("/export", post(handlers::export_handler));

    match write_throttle(settings.writes_per_minute) {
        Some(throttle) => {
            tracing::info!(per_minute = settings.writes_per_minute, "write throttle enabled");
            writes = writes.route_layer(from_fn_with_state(throttle, throttle::throttle_writes));
        }
        None => tracing::info!("write throttle disabled"),
    }

    match &settings.write_key {
        Some(key) => {
            tracing::info!("write key required for loads, recomputations and exports");
            writes = writes.route_layer(from_fn_with_state(
                Arc::new(key.clone()),
                auth::require_write_key,
            ));
        }
        None => tracing::warn!(
            "no write key configured, anyone reaching the server can replace edges. \
             Set {} to require one.",
            API_KEY_ENV
        ),
    }

    reads
        .merge(writes)
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Bind and serve until the process is stopped.
pub async fn run_server(
    addr: &str,
    store: Store,
    engine: Engine,
    settings: &ApiSettings,
) -> Result<(), DossierError> {
    let router = create_router(AppState::new(store, engine), settings);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| DossierError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Dossier HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| DossierError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
