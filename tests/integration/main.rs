//! EdgeView launcher integration test harness.
//!
//! Each test starts its own in-process launcher: a session manager backed
//! by real loopback tunnels, a fresh key directory, and the HTTP API on an
//! OS-assigned port. Nothing outside the temp directory is touched.
//!
//!   cargo test --test integration

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use edgeview_api::ApiState;
use edgeview_core::IdentityProvider;
use edgeview_services::{
    LoopbackSessionManager, LoopbackTunnel, SessionCache, SessionManager, SessionSettings,
    TunnelEvent,
};

mod api;
mod identity;

// ── Harness ───────────────────────────────────────────────────────────────────

static COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn temp_dir(tag: &str) -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "edgeview-it-{tag}-{}-{}",
        std::process::id(),
        id
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Unsigned descriptor token carrying `claims`.
pub fn token(claims: &Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode(b"not-verified")
    )
}

/// The launch script a device page hands out.
pub fn script_for(target_id: &str, num: u64) -> String {
    let claims = json!({
        "dep": "https://zedcloud.example.com/edgeview",
        "sub": target_id,
        "num": num,
        "key": format!("nonce-{target_id}"),
    });
    format!(
        "docker run -it --rm lfedge/eve-edgeview -token {} -inst 1",
        token(&claims)
    )
}

pub struct Launcher {
    pub port: u16,
    pub key_dir: PathBuf,
    pub manager: Arc<LoopbackSessionManager>,
    // Held so tunnel opens are accepted.
    pub tunnel_events: mpsc::UnboundedReceiver<TunnelEvent>,
}

impl Launcher {
    pub async fn start() -> Result<Self> {
        let key_dir = temp_dir("launcher");
        let (tunnel, tunnel_events) = LoopbackTunnel::new(([127, 0, 0, 1], 0).into());
        let manager = Arc::new(SessionManager::new(
            Arc::new(SessionCache::new()),
            IdentityProvider::new(&key_dir),
            tunnel,
            SessionSettings {
                default_ttl: Duration::from_secs(600),
                establish_timeout: Duration::from_secs(5),
            },
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let state = ApiState::new(manager.clone());
        tokio::spawn(async move {
            if let Err(e) = edgeview_api::serve_on(listener, state).await {
                eprintln!("API server failed: {e}");
            }
        });

        Ok(Self {
            port,
            key_dir,
            manager,
            tunnel_events,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}/api{}", self.port, path)
    }

    pub async fn get(&self, path: &str) -> Result<(u16, Value)> {
        let resp = reqwest::get(self.url(path))
            .await
            .with_context(|| format!("GET {path}"))?;
        decode(resp).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<(u16, Value)> {
        let resp = reqwest::Client::new()
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        decode(resp).await
    }

    pub async fn delete(&self, path: &str) -> Result<(u16, Value)> {
        let resp = reqwest::Client::new()
            .delete(self.url(path))
            .send()
            .await
            .with_context(|| format!("DELETE {path}"))?;
        decode(resp).await
    }
}

async fn decode(resp: reqwest::Response) -> Result<(u16, Value)> {
    let status = resp.status().as_u16();
    let body = resp.json::<Value>().await.context("response is not JSON")?;
    Ok((status, body))
}
