//! /sessions handlers: connect, inspect and drop device sessions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use edgeview_core::descriptor;

use super::{ok, ApiError, ApiResult, ApiState, SessionInfo};

// ── /sessions (POST) ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ConnectRequest {
    /// Pasted EdgeView script carrying the `-token` flag.
    pub script: String,
    /// Defaults to the descriptor's subject.
    #[serde(default, alias = "nodeId")]
    pub node_id: Option<String>,
}

pub async fn handle_session_connect(
    State(state): State<ApiState>,
    Json(req): Json<ConnectRequest>,
) -> ApiResult<SessionInfo> {
    let desc = descriptor::parse(&req.script)?;
    let node_id = req.node_id.unwrap_or_else(|| desc.target_id.clone());

    let record = state.manager.ensure_session(&node_id, Some(&desc)).await?;
    ok(SessionInfo::from(&record))
}

// ── /sessions (GET) ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
}

pub async fn handle_session_list(State(state): State<ApiState>) -> ApiResult<SessionListResponse> {
    let sessions = state
        .manager
        .active_sessions()
        .iter()
        .map(SessionInfo::from)
        .collect();
    ok(SessionListResponse { sessions })
}

// ── /sessions/:node_id (GET) ──────────────────────────────────────────────────

pub async fn handle_session_inspect(
    State(state): State<ApiState>,
    Path(node_id): Path<String>,
) -> ApiResult<SessionInfo> {
    let record = state.manager.lookup(&node_id).ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            format!("no active session for {node_id}"),
        )
    })?;
    ok(SessionInfo::from(&record))
}

// ── /sessions/:node_id (DELETE) ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionDropResponse {
    pub node_id: String,
    pub dropped: bool,
}

pub async fn handle_session_drop(
    State(state): State<ApiState>,
    Path(node_id): Path<String>,
) -> ApiResult<SessionDropResponse> {
    let dropped = state.manager.end_session(&node_id).is_some();
    ok(SessionDropResponse { node_id, dropped })
}

// ── /session-status (POST) ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct NodeIdRequest {
    #[serde(alias = "nodeId")]
    pub node_id: String,
}

#[derive(Serialize)]
pub struct SessionStatusResponse {
    pub active: bool,
    #[serde(flatten)]
    pub session: Option<SessionInfo>,
}

pub async fn handle_session_status(
    State(state): State<ApiState>,
    Json(req): Json<NodeIdRequest>,
) -> ApiResult<SessionStatusResponse> {
    let session = state.manager.lookup(&req.node_id).as_ref().map(SessionInfo::from);
    ok(SessionStatusResponse {
        active: session.is_some(),
        session,
    })
}
