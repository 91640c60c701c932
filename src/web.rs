// src/web.rs

use crate::sync::{ErrorKind, Reconciler, SyncError};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

type AppState = Arc<Reconciler>;

#[derive(Deserialize)]
pub struct PushRequest {
    pub ids: Vec<u64>,
}

/// Ошибка прохода в HTTP-ответе
pub struct ApiError(pub SyncError);

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = match kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::RemoteFetch | ErrorKind::Directory => StatusCode::BAD_GATEWAY,
            ErrorKind::Persistence | ErrorKind::Assertion => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(kind = %kind, error = %self.0, "request failed");
        (
            status,
            Json(serde_json::json!({
                "ok": false,
                "kind": kind,
                "error": self.0.to_string(),
            })),
        )
            .into_response()
    }
}

fn done<T: Serialize + Display>(outcome: T) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "summary": outcome.to_string(),
        "data": outcome,
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_sources(State(reconciler): State<AppState>) -> impl IntoResponse {
    Json(reconciler.sources().cloned().collect::<Vec<_>>())
}

async fn sync_source(
    Path(source): Path<String>,
    State(reconciler): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(done(reconciler.sync_source(&source).await?))
}

async fn sync_departments(
    Path(source): Path<String>,
    State(reconciler): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(done(reconciler.sync_departments(&source).await?))
}

async fn sync_users(
    Path(source): Path<String>,
    State(reconciler): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(done(reconciler.sync_users(&source).await?))
}

async fn department_drift(State(reconciler): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(done(reconciler.detect_department_drift().await?))
}

async fn user_drift(State(reconciler): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(done(reconciler.detect_user_drift().await?))
}

async fn push_users(
    State(reconciler): State<AppState>,
    Json(payload): Json<PushRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(done(reconciler.push_users(&payload.ids).await?))
}

async fn push_groups(
    State(reconciler): State<AppState>,
    Json(payload): Json<PushRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(done(reconciler.push_departments(&payload.ids).await?))
}

pub fn create_router(reconciler: AppState) -> Router {
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/sources", get(list_sources))
        .route("/api/sources/:source/sync", post(sync_source))
        .route("/api/sources/:source/departments/sync", post(sync_departments))
        .route("/api/sources/:source/users/sync", post(sync_users))
        .route("/api/drift/departments", post(department_drift))
        .route("/api/drift/users", post(user_drift))
        .route("/api/push/users", post(push_users))
        .route("/api/push/groups", post(push_groups))
        .with_state(reconciler)
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

pub async fn run_web_server(reconciler: AppState, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(reconciler);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("🌐 Web API запущен на http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
