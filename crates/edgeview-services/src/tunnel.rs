//! Tunnel establishment seam.
//!
//! The session manager fully determines what a tunnel needs (dispatcher,
//! instance, nonce, key) but does not speak the EdgeView wire protocol.
//! A `TunnelOpener` turns those parameters into a bound local endpoint.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

use edgeview_core::KeyMaterial;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Everything needed to open one tunnel.
#[derive(Clone)]
pub struct TunnelParams {
    pub target_id: String,
    pub dispatch_url: String,
    pub token: String,
    pub instance_id: u32,
    pub nonce_key: String,
    pub encrypted: bool,
    pub key: KeyMaterial,
}

impl fmt::Debug for TunnelParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelParams")
            .field("target_id", &self.target_id)
            .field("dispatch_url", &self.dispatch_url)
            .field("token", &"<redacted>")
            .field("instance_id", &self.instance_id)
            .field("nonce_key", &"<redacted>")
            .field("encrypted", &self.encrypted)
            .field("key", &self.key)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to bind local endpoint: {0}")]
    Bind(#[from] std::io::Error),
    #[error("transport runtime is not accepting tunnels")]
    RuntimeClosed,
}

pub trait TunnelOpener: Send + Sync {
    /// Open a tunnel and return the local endpoint it is bound to.
    fn open(
        &self,
        params: &TunnelParams,
    ) -> impl Future<Output = Result<SocketAddr, TunnelError>> + Send;

    /// The session bound to `local_endpoint` has ended or expired.
    fn release(&self, _target_id: &str, _local_endpoint: SocketAddr) {}
}

/// A bound listener waiting for the transport runtime to pick it up.
#[derive(Debug)]
pub struct PendingTunnel {
    pub params: TunnelParams,
    pub listener: TcpListener,
}

/// What the transport runtime is told, in order.
#[derive(Debug)]
pub enum TunnelEvent {
    Opened(PendingTunnel),
    /// Only the endpoint at `local_endpoint` is released; a newer tunnel
    /// for the same target stays up.
    Released {
        target_id: String,
        local_endpoint: SocketAddr,
    },
}

/// Binds a local TCP listener per session and hands it to the transport
/// runtime over a channel.
#[derive(Debug, Clone)]
pub struct LoopbackTunnel {
    bind_addr: SocketAddr,
    tx: mpsc::UnboundedSender<TunnelEvent>,
}

impl LoopbackTunnel {
    pub fn new(bind_addr: SocketAddr) -> (Self, mpsc::UnboundedReceiver<TunnelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { bind_addr, tx }, rx)
    }
}

impl TunnelOpener for LoopbackTunnel {
    async fn open(&self, params: &TunnelParams) -> Result<SocketAddr, TunnelError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        self.tx
            .send(TunnelEvent::Opened(PendingTunnel {
                params: params.clone(),
                listener,
            }))
            .map_err(|_| TunnelError::RuntimeClosed)?;
        tracing::debug!(target_id = %params.target_id, %local_addr, "tunnel endpoint bound");
        Ok(local_addr)
    }

    fn release(&self, target_id: &str, local_endpoint: SocketAddr) {
        let event = TunnelEvent::Released {
            target_id: target_id.to_string(),
            local_endpoint,
        };
        if self.tx.send(event).is_err() {
            tracing::debug!(target_id, "transport runtime gone, nothing to release");
        }
    }
}
