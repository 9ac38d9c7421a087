//! edgeviewd: EdgeView launcher daemon.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;

use edgeview_core::config::LauncherConfig;
use edgeview_core::IdentityProvider;
use edgeview_services::{LoopbackTunnel, SessionCache, SessionManager, SessionSettings};

mod runtime;

use runtime::TunnelRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = LauncherConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = LauncherConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        LauncherConfig::default()
    });
    tracing::info!(
        key_dir = %config.identity.key_dir.display(),
        ttl_secs = config.session.ttl_secs,
        api_port = config.api.port,
        "edgeviewd starting"
    );

    // Identity. A failure here is not fatal; establishment retries it.
    let identity = IdentityProvider::from_config(&config.identity);
    match identity.ensure_key() {
        Ok(key) => tracing::info!(path = %key.private_key_path.display(), "SSH key ready"),
        Err(e) => tracing::warn!(error = %e, "SSH key not available"),
    }

    // Shared state
    let cache = Arc::new(SessionCache::new());
    let (tunnel, tunnel_events) = LoopbackTunnel::new(config.tunnel.bind_addr);
    let manager = Arc::new(SessionManager::new(
        cache,
        identity,
        tunnel,
        SessionSettings::from(&config.session),
    ));

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let runtime_task = tokio::spawn(TunnelRuntime::new().run(tunnel_events, shutdown_tx.subscribe()));

    let sweep_task = {
        let manager = manager.clone();
        let interval = config.session.sweep_interval();
        tokio::spawn(async move {
            let Some(period) = interval else {
                std::future::pending::<()>().await;
                return;
            };
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                manager.sweep();
            }
        })
    };

    let api_task = {
        let state = edgeview_api::ApiState::new(manager.clone());
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = edgeview_api::serve(state, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = runtime_task       => tracing::error!("tunnel runtime exited: {:?}", r),
        r = sweep_task         => tracing::error!("sweep task exited: {:?}", r),
        r = api_task           => tracing::error!("API server exited: {:?}", r),
    }

    Ok(())
}
