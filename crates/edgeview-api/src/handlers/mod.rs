//! HTTP API handlers. Launcher session state as JSON.
//!
//! Every response uses the same envelope:
//!   { "success": true,  "data": ... }
//!   { "success": false, "error": "..." }

pub mod sessions;
pub mod status;

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use edgeview_core::{DescriptorError, IdentityError};
use edgeview_services::{EstablishError, LoopbackSessionManager, SessionError, SessionRecord};

#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<LoopbackSessionManager>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(manager: Arc<LoopbackSessionManager>) -> Self {
        Self {
            manager,
            started_at: Instant::now(),
        }
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data: Some(data),
        error: None,
    }))
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DescriptorError> for ApiError {
    fn from(e: DescriptorError) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        tracing::error!(error = %e, "SSH key provisioning failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        let status = match &e {
            SessionError::Descriptor(_)
            | SessionError::DescriptorRequired(_)
            | SessionError::TargetMismatch { .. }
            | SessionError::DescriptorExpired(_) => StatusCode::BAD_REQUEST,
            SessionError::Identity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SessionError::EstablishmentFailed {
                source: EstablishError::TimedOut(_),
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            SessionError::EstablishmentFailed { .. } => StatusCode::BAD_GATEWAY,
        };
        ApiError::new(status, e.to_string())
    }
}

// ── Shared types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub node_id: String,
    pub url: String,
    pub instance_id: u32,
    pub max_instances: u32,
    pub port: u16,
    pub local_endpoint: String,
    pub established_at: u64,
    pub expires_at: u64,
    pub expires_in_secs: u64,
}

impl From<&SessionRecord> for SessionInfo {
    fn from(r: &SessionRecord) -> Self {
        Self {
            node_id: r.target_id.clone(),
            url: r.config.url.clone(),
            instance_id: r.config.instance_id,
            max_instances: r.config.max_instances,
            port: r.config.local_port,
            local_endpoint: r.local_endpoint.to_string(),
            established_at: unix_secs(r.established_at),
            expires_at: unix_secs(r.expires_at),
            expires_in_secs: r.remaining().as_secs(),
        }
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

// Re-export handler functions for use in router setup.
pub use sessions::{
    handle_session_connect, handle_session_drop, handle_session_inspect, handle_session_list,
    handle_session_status,
};
pub use status::{handle_ssh_key, handle_status};
