//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        EdgesResponse, ExportResponse, HealthResponse, LoadResponse, QueryResponse,
        RecomputeRequest, RecomputeResponse, StatusResponse, ValidateResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use dossier_core::{
    DossierError, EdgeKind, Engine, GraphFacade, GraphMetrics, Loader, Query, RecordBatch,
    canonical_fingerprint, edge_records, export_canonical, primitives::MAX_TRAVERSAL_DEPTH,
    stored_edges,
};

/// Map an engine error to an HTTP status.
fn status_for(error: &DossierError) -> StatusCode {
    match error {
        DossierError::InvalidConfig(_) | DossierError::InvalidRecord(_) => {
            StatusCode::BAD_REQUEST
        }
        DossierError::RecordNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn join_error(error: tokio::task::JoinError) -> DossierError {
    DossierError::IoError(format!("Worker task failed: {}", error))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Record and edge counts of the store.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.read().await;
    match GraphMetrics::from_graph(&*store) {
        Ok(metrics) => {
            let response =
                StatusResponse::new(metrics, store.is_persistent(), state.engine.config());
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

// =============================================================================
// LOAD HANDLER
// =============================================================================

/// Validate and store a batch of base records.
///
/// Computed edges are not touched; call `/recompute` afterwards.
pub async fn load_handler(
    State(state): State<AppState>,
    Json(batch): Json<RecordBatch>,
) -> impl IntoResponse {
    let mut store = state.store.clone().write_owned().await;
    let loaded = tokio::task::spawn_blocking(move || Loader::load(&mut *store, batch)).await;

    match loaded.unwrap_or_else(|e| Err(join_error(e))) {
        Ok(summary) => (StatusCode::OK, Json(LoadResponse::success(summary))),
        Err(e) => (
            status_for(&e),
            Json(LoadResponse::error(format!("Load failed: {}", e))),
        ),
    }
}

// =============================================================================
// RECOMPUTE HANDLER
// =============================================================================

/// Recompute derived edges, optionally with per-run overrides.
///
/// The run holds the store's write lock on a blocking thread until the
/// new edges are committed.
pub async fn recompute_handler(
    State(state): State<AppState>,
    Json(request): Json<RecomputeRequest>,
) -> impl IntoResponse {
    let engine = if request.is_empty() {
        (*state.engine).clone()
    } else {
        match request
            .to_config(state.engine.config())
            .and_then(Engine::new)
        {
            Ok(engine) => engine,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(RecomputeResponse::error(format!("Invalid overrides: {}", e))),
                );
            }
        }
    };

    let mut store = state.store.clone().write_owned().await;
    let run = tokio::task::spawn_blocking(move || engine.recompute(&mut *store)).await;

    match run.unwrap_or_else(|e| Err(join_error(e))) {
        Ok(report) => (StatusCode::OK, Json(RecomputeResponse::success(report))),
        Err(e) => (
            status_for(&e),
            Json(RecomputeResponse::error(format!("Recompute failed: {}", e))),
        ),
    }
}

// =============================================================================
// VALIDATE HANDLER
// =============================================================================

/// Validate the stored edges without recomputing.
pub async fn validate_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.read().await;
    match state.engine.validate_only(&*store) {
        Ok(report) => (StatusCode::OK, Json(ValidateResponse::success(report))),
        Err(e) => (
            status_for(&e),
            Json(ValidateResponse::error(format!("Validation failed: {}", e))),
        ),
    }
}

// =============================================================================
// EDGES HANDLER
// =============================================================================

/// Stored edges of one kind, e.g. `/edges/chain`.
pub async fn edges_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    let kind: EdgeKind = match kind.parse() {
        Ok(k) => k,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("{}", e) })),
            )
                .into_response();
        }
    };

    let store = state.store.read().await;
    match store.computed_edges(kind) {
        Ok(batch) => (
            StatusCode::OK,
            Json(EdgesResponse::new(kind, edge_records(&batch))),
        )
            .into_response(),
        Err(e) => (
            status_for(&e),
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

// =============================================================================
// QUERY HANDLER
// =============================================================================

/// Execute a query.
pub async fn query_handler(
    State(state): State<AppState>,
    Json(query): Json<Query>,
) -> impl IntoResponse {
    if let Query::Chain { depth, .. } = &query
        && *depth > MAX_TRAVERSAL_DEPTH
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(QueryResponse::error(format!(
                "depth {} exceeds maximum {}",
                depth, MAX_TRAVERSAL_DEPTH
            ))),
        );
    }

    let store = state.store.read().await;
    match query.execute(&*store) {
        Ok(result) => (StatusCode::OK, Json(QueryResponse::success(result))),
        Err(e) => (
            status_for(&e),
            Json(QueryResponse::error(format!("Query failed: {}", e))),
        ),
    }
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Canonical export of every stored computed edge.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.read().await;
    let exported = stored_edges(&*store).and_then(|edges| {
        let revision = store.revision()?;
        let data = export_canonical(&edges, revision)?;
        let fingerprint = canonical_fingerprint(&edges)?;
        Ok((data, fingerprint, revision))
    });

    match exported {
        Ok((data, fingerprint, revision)) => (
            StatusCode::OK,
            Json(ExportResponse::success(&data, fingerprint, revision)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExportResponse::error(format!("Export failed: {}", e))),
        ),
    }
}
