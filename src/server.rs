//! HTTP API.
//!
//! # Endpoints
//!
//! | Method   | Path              | Description |
//! |----------|-------------------|-------------|
//! | `GET`    | `/health`         | Health check (returns version) |
//! | `POST`   | `/upload`         | Multipart upload: `files`, `category`, `user_id` |
//! | `POST`   | `/ask`            | Answer a question over selected documents |
//! | `DELETE` | `/docs/{doc_id}`  | Remove a document's vectors (and original, given `?user_id=`) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `retrieval_failed` (502),
//! `storage_failed` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted for browser clients.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use legal_lens_core::error::{IndexError, InputError, LensError, RetrievalError, StorageError};

use crate::ask::{answer_question, AskRequest, AskResponse};
use crate::config::Config;
use crate::ingest::{delete_document, ingest_document, UploadRequest};
use crate::services::Services;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the router over shared services.
pub fn build_router(services: Arc<Services>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/upload", post(handle_upload))
        .route("/ask", post(handle_ask))
        .route("/docs/{doc_id}", delete(handle_delete))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(services)
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Arc::new(Services::from_config(config).await?);
    let app = build_router(services);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "Legal Lens listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

impl From<LensError> for AppError {
    fn from(err: LensError) -> Self {
        let message = err.to_string();
        match err {
            LensError::Input(_) | LensError::Retrieval(RetrievalError::Input(_)) => {
                bad_request(message)
            }
            LensError::Retrieval(RetrievalError::Index(_)) => {
                tracing::error!(error = %message, "retrieval failed");
                AppError::new(StatusCode::BAD_GATEWAY, "retrieval_failed", message)
            }
            LensError::Storage(StorageError::InvalidKey(_)) => bad_request(message),
            LensError::Index(IndexError::Unavailable(_)) | LensError::Storage(_) => {
                tracing::error!(error = %message, "storage failed");
                AppError::new(StatusCode::BAD_GATEWAY, "storage_failed", message)
            }
            LensError::Index(_) => internal(message),
        }
    }
}

fn internal(err: impl std::fmt::Display) -> AppError {
    tracing::error!(error = %err, "internal error");
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", err.to_string())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    status: &'static str,
    doc_id: String,
    chunks_count: usize,
    embeddings_degraded: bool,
}

/// Only the first `files` part is ingested; further files are ignored.
async fn handle_upload(
    State(services): State<Arc<Services>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut category = None;
    let mut user_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "file" => {
                let filename = field.file_name().unwrap_or("upload.pdf").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read file: {}", e)))?;
                if file.is_none() {
                    file = Some((filename, bytes.to_vec()));
                }
            }
            "category" => {
                category = Some(field.text().await.map_err(|e| bad_request(e.to_string()))?)
            }
            "user_id" => {
                user_id = Some(field.text().await.map_err(|e| bad_request(e.to_string()))?)
            }
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| bad_request("no files"))?;
    let request = UploadRequest {
        user_id: user_id.ok_or_else(|| LensError::from(InputError::MissingField("user_id")))?,
        category: category.ok_or_else(|| LensError::from(InputError::MissingField("category")))?,
        filename,
        bytes,
    };

    let report = ingest_document(&services, request).await?;
    Ok(Json(UploadResponse {
        status: "processed",
        doc_id: report.doc_id,
        chunks_count: report.chunks_count,
        embeddings_degraded: report.embeddings_degraded,
    }))
}

// ============ POST /ask ============

async fn handle_ask(
    State(services): State<Arc<Services>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let response = answer_question(&services, &request).await?;
    Ok(Json(response))
}

// ============ DELETE /docs/{doc_id} ============

#[derive(Deserialize)]
struct DeleteParams {
    user_id: Option<String>,
}

#[derive(Serialize)]
struct DeleteResponse {
    status: &'static str,
    doc_id: String,
    vectors_removed: usize,
}

async fn handle_delete(
    State(services): State<Arc<Services>>,
    Path(doc_id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteResponse>, AppError> {
    let user_id = params.user_id.as_deref().filter(|u| !u.trim().is_empty());
    let removed = delete_document(&services, &doc_id, user_id).await?;
    if removed == 0 {
        return Err(not_found(format!("no document with id: {}", doc_id)));
    }
    Ok(Json(DeleteResponse {
        status: "deleted",
        doc_id,
        vectors_removed: removed,
    }))
}
