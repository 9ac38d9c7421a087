//! Tunnel runtime. Holds the local endpoint of every live session.
//!
//! An endpoint is a port reservation: the listener stays bound for as long
//! as its session lives and is closed when the session is ended, swept, or
//! replaced. Relaying traffic over it is the EdgeView client's job, so
//! nothing here accepts connections.

use std::collections::HashMap;
use std::net::SocketAddr;

use edgeview_services::{PendingTunnel, TunnelEvent};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

#[derive(Default)]
pub struct TunnelRuntime {
    endpoints: HashMap<String, TcpListener>,
}

impl TunnelRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<TunnelEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        self.close_all();
    }

    fn handle(&mut self, event: TunnelEvent) {
        match event {
            TunnelEvent::Opened(pending) => self.adopt(pending),
            TunnelEvent::Released {
                target_id,
                local_endpoint,
            } => self.release(&target_id, local_endpoint),
        }
    }

    /// Take over a freshly bound endpoint. An older endpoint for the same
    /// target is closed.
    fn adopt(&mut self, pending: PendingTunnel) {
        let PendingTunnel { params, listener } = pending;
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                target_id = %params.target_id,
                local_endpoint = %addr,
                dispatch = %params.dispatch_url,
                instance = params.instance_id,
                "tunnel endpoint reserved"
            );
        }
        if self
            .endpoints
            .insert(params.target_id.clone(), listener)
            .is_some()
        {
            tracing::debug!(target_id = %params.target_id, "replaced tunnel endpoint");
        }
        tracing::debug!(live = self.endpoints.len(), "tunnel endpoints");
    }

    /// Close the endpoint for `target_id` if it is still the one at
    /// `local_endpoint`.
    fn release(&mut self, target_id: &str, local_endpoint: SocketAddr) {
        let current = self
            .endpoints
            .get(target_id)
            .and_then(|l| l.local_addr().ok());
        if current != Some(local_endpoint) {
            tracing::debug!(target_id, %local_endpoint, "endpoint already gone");
            return;
        }
        self.endpoints.remove(target_id);
        tracing::info!(target_id, %local_endpoint, "tunnel endpoint closed");
    }

    fn close_all(&mut self) {
        for (target_id, _listener) in self.endpoints.drain() {
            tracing::debug!(%target_id, "tunnel endpoint closed");
        }
    }
}
