//! /status and /ssh-key handlers.

use axum::extract::State;
use serde::Serialize;

use super::{ok, ApiResult, ApiState};

// ── /status ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    /// Present once a key has been provisioned.
    pub public_key: Option<String>,
}

pub async fn handle_status(State(state): State<ApiState>) -> ApiResult<StatusResponse> {
    // Status never provisions a key; a broken key shows up as absent here
    // and as an error on /ssh-key.
    let public_key = match state.manager.identity().discover() {
        Ok(key) => key.map(|k| k.public_key),
        Err(e) => {
            tracing::warn!(error = %e, "SSH key unreadable");
            None
        }
    };

    ok(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        active_sessions: state.manager.active_sessions().len(),
        public_key,
    })
}

// ── /ssh-key ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SshKeyResponse {
    pub private_key_path: String,
    pub public_key: String,
}

pub async fn handle_ssh_key(State(state): State<ApiState>) -> ApiResult<SshKeyResponse> {
    let key = state.manager.identity().ensure_key()?;
    ok(SshKeyResponse {
        private_key_path: key.private_key_path.display().to_string(),
        public_key: key.public_key,
    })
}
