//! HTTP server exposing ingestion and search.
//!
//! [`build_vectorizer`] wires the datastore, object storage, face analyzer and
//! CLIP embedder into a shared [`Vectorizer`]; [`router`] maps it onto axum
//! routes; [`serve_http`] runs it until Ctrl-C.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::config::{RetrievalConfig, VectorizerConfig};
use crate::embedding::{self, FaceAnalyzer, JointEmbedder};
use crate::service::{FaceSearch, ImageEntry, IngestOutcome, ServiceError, Vectorizer};
use crate::store::supabase::SupabaseBackend;
use crate::store::types::{MatchResult, ScopeError, TenantScope};
use crate::store::{EmbeddingStore, ObjectStorage, StoreError};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub vectorizer: Arc<Vectorizer>,
    pub retrieval: Arc<RetrievalConfig>,
}

/// Build every collaborator once and wire them into a [`Vectorizer`].
pub fn build_vectorizer(config: &VectorizerConfig) -> Result<Arc<Vectorizer>> {
    let backend = Arc::new(SupabaseBackend::new(&config.store)?);
    let store: Arc<dyn EmbeddingStore> = backend.clone();
    let objects: Arc<dyn ObjectStorage> = backend;
    tracing::info!(url = %config.store.url, table = %config.store.table, "datastore ready");

    let faces: Arc<dyn FaceAnalyzer> = Arc::from(embedding::create_face_analyzer(&config.face)?);
    tracing::info!(url = %config.face.url, "face analyzer ready");

    let joint: Arc<dyn JointEmbedder> =
        Arc::from(embedding::create_joint_embedder(&config.embedding)?);
    tracing::info!(model = %config.embedding.model, "joint embedder ready");

    let vectorizer = Vectorizer::new(store, objects, faces, joint)
        .with_query_archiving(config.retrieval.archive_query_images);
    Ok(Arc::new(vectorizer))
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/vectorize", post(vectorize))
        .route("/find-face", post(find_face))
        .route("/search-text", post(search_text))
        .route("/images", get(list_images))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn serve_http(config: VectorizerConfig) -> Result<()> {
    config.validate()?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting vectorizer");

    let vectorizer = build_vectorizer(&config)?;
    let state = AppState {
        vectorizer,
        retrieval: Arc::new(config.retrieval.clone()),
    };
    let app = router(state, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening at http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Error body: `{"error": kind, "detail": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            detail: detail.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let (status, kind) = match &err {
            ServiceError::NoFaceDetected => (StatusCode::NOT_FOUND, "no_face_detected"),
            ServiceError::NoEmbeddings => (StatusCode::NOT_FOUND, "no_embeddings"),
            ServiceError::InvalidInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input"),
            ServiceError::Vector(_) => (StatusCode::UNPROCESSABLE_ENTITY, "degenerate_embedding"),
            ServiceError::Store(StoreError::InvalidUrl(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "misconfigured_store")
            }
            ServiceError::Store(_) => (StatusCode::BAD_GATEWAY, "store_unavailable"),
            ServiceError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_failure"),
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self {
            status,
            kind,
            detail: err.to_string(),
        }
    }
}

impl From<ScopeError> for ApiError {
    fn from(err: ScopeError) -> Self {
        Self::bad_request(err.to_string())
    }
}

// Extractor rejections use the same JSON body as every other error.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.kind, "detail": self.detail });
        (self.status, Json(body)).into_response()
    }
}

// ── Request / response types ─────────────────────────────────────────────────

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    event_id: Option<String>,
    business_id: Option<String>,
    threshold: Option<String>,
}

impl UploadForm {
    fn into_parts(self) -> Result<(Vec<u8>, TenantScope, Option<String>), ApiError> {
        let file = self
            .file
            .ok_or_else(|| ApiError::bad_request("missing form field: file"))?;
        let event_id = self
            .event_id
            .ok_or_else(|| ApiError::bad_request("missing form field: event_id"))?;
        let business_id = self
            .business_id
            .ok_or_else(|| ApiError::bad_request("missing form field: business_id"))?;
        let scope = TenantScope::new(event_id, business_id)?;
        Ok((file, scope, self.threshold))
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchTextRequest {
    pub prompt: String,
    pub event_id: String,
    pub business_id: String,
    pub top_k: Option<usize>,
    pub threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct SearchTextResponse {
    pub results: Vec<MatchResult>,
}

#[derive(Debug, Deserialize)]
pub struct ScopeParams {
    pub event_id: String,
    pub business_id: String,
}

#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub images: Vec<ImageEntry>,
}

async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadForm, ApiError> {
    let mut multipart = multipart?;
    let multipart_error = |e: axum::extract::multipart::MultipartError| ApiError {
        status: e.status(),
        kind: "bad_request",
        detail: e.body_text(),
    };

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => form.file = Some(field.bytes().await.map_err(multipart_error)?.to_vec()),
            "event_id" => form.event_id = Some(field.text().await.map_err(multipart_error)?),
            "business_id" => form.business_id = Some(field.text().await.map_err(multipart_error)?),
            "threshold" => form.threshold = Some(field.text().await.map_err(multipart_error)?),
            other => tracing::debug!(field = %other, "ignoring form field"),
        }
    }
    Ok(form)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /vectorize — ingest an image for a tenant scope.
async fn vectorize(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IngestOutcome>, ApiError> {
    let (file, scope, _) = read_upload(multipart).await?.into_parts()?;
    tracing::info!(scope = %scope, size = file.len(), "vectorize called");

    let outcome = state.vectorizer.ingest(&file, &scope).await?;
    Ok(Json(outcome))
}

/// POST /find-face — match the first face of the query image within a tenant scope.
async fn find_face(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<FaceSearch>, ApiError> {
    let (file, scope, threshold) = read_upload(multipart).await?.into_parts()?;
    let threshold = match threshold.as_deref().map(str::trim) {
        None | Some("") => state.retrieval.face_threshold,
        Some(raw) => raw
            .parse::<f32>()
            .map_err(|_| ApiError::bad_request(format!("invalid threshold: {raw}")))?,
    };
    tracing::info!(scope = %scope, size = file.len(), threshold, "find-face called");

    let search = state.vectorizer.find_by_image(&file, &scope, threshold).await?;
    Ok(Json(search))
}

/// POST /search-text — rank a scope's images against a text prompt.
async fn search_text(
    State(state): State<AppState>,
    request: Result<Json<SearchTextRequest>, JsonRejection>,
) -> Result<Json<SearchTextResponse>, ApiError> {
    let Json(request) = request?;
    let scope = TenantScope::new(request.event_id, request.business_id)?;
    let top_k = request.top_k.unwrap_or(state.retrieval.text_top_k);
    let threshold = request.threshold.unwrap_or(state.retrieval.text_threshold);
    tracing::info!(scope = %scope, top_k, "search-text called");

    let results = state
        .vectorizer
        .find_by_text(&request.prompt, &scope, top_k, threshold)
        .await?;
    Ok(Json(SearchTextResponse { results }))
}

/// GET /images — list a scope's distinct images.
async fn list_images(
    State(state): State<AppState>,
    params: Result<Query<ScopeParams>, QueryRejection>,
) -> Result<Json<ImagesResponse>, ApiError> {
    let Query(params) = params?;
    let scope = TenantScope::new(params.event_id, params.business_id)?;
    let images = state.vectorizer.list_images(&scope).await?;
    Ok(Json(ImagesResponse { images }))
}
