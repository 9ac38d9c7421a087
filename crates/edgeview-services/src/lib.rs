//! edgeview-services: the session cache and manager behind a tunnel seam.

pub mod cache;
pub mod session;
pub mod tunnel;

pub use cache::{ConnectionConfig, SessionCache, SessionRecord};
pub use session::{EstablishError, SessionError, SessionManager, SessionSettings, MAX_SESSION_TTL};
pub use tunnel::{
    LoopbackTunnel, PendingTunnel, TunnelError, TunnelEvent, TunnelOpener, TunnelParams,
};

/// The manager as wired in the daemon.
pub type LoopbackSessionManager = SessionManager<LoopbackTunnel>;
