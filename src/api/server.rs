//! HTTP server for the import pipeline.
//!
//! # API Endpoints
//!
//! | Method | Path                              | Description                        |
//! |--------|-----------------------------------|------------------------------------|
//! | GET    | `/health`                         | Health check                       |
//! | POST   | `/api/imports`                    | Upload a file into staging         |
//! | GET    | `/api/imports`                    | List batches (newest first)        |
//! | GET    | `/api/imports/{id}`               | Batch status summary               |
//! | GET    | `/api/imports/{id}/transactions`  | Paginated staged rows              |
//! | POST   | `/api/imports/{id}/commit`        | Copy valid rows into production    |
//! | POST   | `/api/imports/{id}/cancel`        | Discard the staged batch           |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use super::types::{
    error_response, BatchSummaryBody, CancelResponse, CommitRequest, CommitResponse, PagedBody,
    StagedTransactionBody, UploadResponse,
};
use crate::batch::parse_upload;
use crate::commit::CommitEngine;
use crate::config::ImportConfig;
use crate::error::{CommitError, QueryError, UploadError};
use crate::models::BatchStatus;
use crate::query::BatchQueries;
use crate::staging::StagingStore;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: StagingStore,
    pub engine: CommitEngine,
    pub queries: BatchQueries,
    pub config: Arc<ImportConfig>,
}

impl AppState {
    pub fn new(store: StagingStore, config: ImportConfig) -> Self {
        let engine = CommitEngine::new(&store);
        let queries = BatchQueries::new(&store);
        Self { store, engine, queries, config: Arc::new(config) }
    }
}

/// Build the router; exposed separately so tests can drive it in-process.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    // Leave headroom over the file cap for multipart framing; the parser
    // still enforces the configured limit with a descriptive error.
    let body_limit = state.config.max_file_size + 64 * 1024;

    Router::new()
        .route("/health", get(health))
        .route("/api/imports", post(upload_import).get(list_batches))
        .route("/api/imports/{id}", get(batch_status))
        .route("/api/imports/{id}/transactions", get(batch_transactions))
        .route("/api/imports/{id}/commit", post(commit_import))
        .route("/api/imports/{id}/cancel", post(cancel_import))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server.
pub async fn start_server(port: u16, state: AppState) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "salestage server listening");

    axum::serve(listener, router(state)).await
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "salestage",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(error_response(message)))
}

fn internal(err: impl std::fmt::Display) -> ApiError {
    error!("internal error: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response("internal server error")))
}

/// Upload a file into staging.
///
/// Multipart fields: `file` (required), `sourceCompany` (required),
/// `strictMode` (`true`/`false`, default false), `uploadedBy` (required).
async fn upload_import(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut source_company: Option<String> = None;
    let mut strict_mode = false;
    let mut uploaded_by: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(&format!("Read error: {}", e)))?;
                file_data = Some(bytes.to_vec());
            }
            "sourceCompany" => {
                source_company = Some(field.text().await.unwrap_or_default());
            }
            "strictMode" => {
                let text = field.text().await.unwrap_or_default();
                strict_mode = matches!(text.trim(), "true" | "1" | "yes");
            }
            "uploadedBy" => {
                uploaded_by = Some(field.text().await.unwrap_or_default());
            }
            _ => {}
        }
    }

    let bytes = file_data.ok_or_else(|| bad_request("No file provided"))?;
    let file_name = file_name.unwrap_or_else(|| "upload.csv".to_string());
    let source_company = source_company.ok_or_else(|| bad_request("sourceCompany is required"))?;
    let uploaded_by = uploaded_by.ok_or_else(|| bad_request("uploadedBy is required"))?;

    let outcome = parse_upload(
        &bytes,
        &file_name,
        &source_company,
        &uploaded_by,
        strict_mode,
        &state.config,
    )
    .map_err(|e: UploadError| bad_request(&e.to_string()))?;

    // A failed strict-mode batch is reported but never staged.
    if outcome.batch.status != BatchStatus::Failed {
        state.store.persist(&outcome).await.map_err(internal)?;
    }

    Ok(Json(UploadResponse::from(&outcome)))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    company: Option<String>,
}

/// List batch summaries, newest first.
async fn list_batches(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<BatchSummaryBody>>, ApiError> {
    let summaries = state
        .queries
        .list(params.company.as_deref())
        .await
        .map_err(internal)?;
    Ok(Json(summaries.into_iter().map(BatchSummaryBody::from).collect()))
}

fn parse_batch_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| bad_request(&format!("Invalid batch id: '{}'", id)))
}

fn query_error(err: QueryError) -> ApiError {
    match err {
        QueryError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(error_response(&format!("Import batch not found: {}", id))),
        ),
        QueryError::Store(e) => internal(e),
    }
}

/// Batch status summary.
async fn batch_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BatchSummaryBody>, ApiError> {
    let batch_id = parse_batch_id(&id)?;
    let summary = state.queries.status(batch_id).await.map_err(query_error)?;
    Ok(Json(summary.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageParams {
    page: Option<u32>,
    page_size: Option<u32>,
}

/// Paginated staged rows for review.
async fn batch_transactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<PagedBody<StagedTransactionBody>>, ApiError> {
    let batch_id = parse_batch_id(&id)?;
    let page = state
        .queries
        .transactions(batch_id, params.page, params.page_size)
        .await
        .map_err(query_error)?;
    Ok(Json(page.into()))
}

fn commit_error(err: CommitError) -> ApiError {
    match &err {
        CommitError::NotFound(_) => (StatusCode::NOT_FOUND, Json(error_response(&err.to_string()))),
        CommitError::AlreadyCommitted(_) | CommitError::InvalidState { .. } => {
            (StatusCode::CONFLICT, Json(error_response(&err.to_string())))
        }
        CommitError::Store(e) => internal(e),
    }
}

/// Commit a reviewed batch into production.
async fn commit_import(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CommitRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let batch_id = parse_batch_id(&id)?;
    if request.committed_by.trim().is_empty() {
        return Err(bad_request("committedBy is required"));
    }

    let receipt = state
        .engine
        .commit(batch_id, request.committed_by.trim())
        .await
        .map_err(commit_error)?;
    Ok(Json(receipt.into()))
}

/// Cancel a staged batch, discarding its rows.
async fn cancel_import(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let batch_id = parse_batch_id(&id)?;
    state.engine.cancel(batch_id).await.map_err(commit_error)?;
    Ok(Json(CancelResponse { success: true }))
}
