//! HTTP routes over a [`MemoryAuthority`]
//!
//! ```text
//! POST /read   {}         → Snapshot          (404 when missing)
//! POST /sync   SyncInput  → SyncOutput        (404 when missing, 409 rejected)
//! GET  /status            → { version, started }
//! ```

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use scribing_sync::{MemoryAuthority, ProtocolError, Snapshot, SyncInput, SyncOutput, SyncProtocol};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub authority: Arc<MemoryAuthority>,
    pub started: DateTime<Utc>,
}

impl AppState {
    pub fn new(authority: Arc<MemoryAuthority>) -> Self {
        Self {
            authority,
            started: Utc::now(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Document not found")]
    NotFound,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Protocol(ProtocolError::Rejected(_)) => StatusCode::CONFLICT,
            ApiError::Protocol(ProtocolError::Payload(_)) => StatusCode::BAD_REQUEST,
            ApiError::Protocol(ProtocolError::Transport(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request refused");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/read", post(read_handler))
        .route("/sync", post(sync_handler))
        .route("/status", get(status_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn read_handler(State(state): State<AppState>) -> Result<Json<Snapshot>, ApiError> {
    let snapshot = state.authority.read().await?.ok_or(ApiError::NotFound)?;
    Ok(Json(snapshot))
}

async fn sync_handler(
    State(state): State<AppState>,
    Json(input): Json<SyncInput>,
) -> Result<Json<SyncOutput>, ApiError> {
    let output = state.authority.sync(input).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(output))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    version: Option<u64>,
    started: String,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: state.authority.version(),
        started: state.started.to_rfc3339(),
    })
}
