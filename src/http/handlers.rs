use super::state::AppState;
use crate::session::{SessionHandle, SessionStats, TranscriptLine};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::info;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CallSummary {
    pub call_id: String,
    pub session_id: String,
    pub owner_id: Option<String>,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub call_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CloseOwnerResponse {
    pub owner_id: String,
    pub closed: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

async fn summarize(handle: &SessionHandle) -> CallSummary {
    CallSummary {
        call_id: handle.call_id.clone(),
        session_id: handle.session_id.clone(),
        owner_id: handle.owner_id.clone(),
        stats: handle.stats().await,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /calls
/// List all active call sessions
pub async fn list_calls(State(state): State<AppState>) -> impl IntoResponse {
    let handles = state.registry.list().await;

    let mut calls = Vec::with_capacity(handles.len());
    for handle in &handles {
        calls.push(summarize(handle).await);
    }

    Json(calls)
}

/// GET /calls/:call_id
/// Stats for one active call
pub async fn get_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&call_id).await {
        Some(handle) => (StatusCode::OK, Json(summarize(&handle).await)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Call {} not found", call_id),
            }),
        )
            .into_response(),
    }
}

/// GET /calls/:call_id/transcript
/// Finalized transcript lines accumulated so far
pub async fn get_call_transcript(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&call_id).await {
        Some(handle) => {
            let transcript: Vec<TranscriptLine> = handle.transcript().await;
            (StatusCode::OK, Json(transcript)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Call {} not found", call_id),
            }),
        )
            .into_response(),
    }
}

/// DELETE /calls/:call_id
/// Force-close one call; its transport adapter removes the entry once the
/// session loop exits
pub async fn close_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&call_id).await {
        Some(handle) => {
            info!("Force-closing call {}", call_id);
            handle.close();
            (
                StatusCode::OK,
                Json(CloseResponse {
                    call_id,
                    status: "closing".to_string(),
                }),
            )
                .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Call {} not found", call_id),
            }),
        )
            .into_response(),
    }
}

/// DELETE /owners/:owner_id/calls
/// Close every active call belonging to one owner
pub async fn close_owner_calls(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> impl IntoResponse {
    let closed = state.registry.close_for_owner(&owner_id).await;
    info!("Closing {} call(s) for owner {}", closed, owner_id);

    Json(CloseOwnerResponse { owner_id, closed })
}
