//! Session manager. Establish-or-reuse for one target at a time.
//!
//! A cached, unexpired record is returned as-is. Otherwise the manager
//! ensures an SSH key, opens a tunnel from the descriptor's parameters under
//! a timeout, and caches the result. Nothing is written to the cache unless
//! every step succeeded.
//!
//! Two concurrent calls for the same uncached target may both establish;
//! the later `put` wins and the cache still holds exactly one record.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use edgeview_core::config::SessionConfig;
use edgeview_core::{ConnectionDescriptor, DescriptorError, IdentityError, IdentityProvider};
use thiserror::Error;

use crate::cache::{ConnectionConfig, SessionCache, SessionRecord};
use crate::tunnel::{TunnelError, TunnelOpener, TunnelParams};

/// Upper bound on the default session lifetime.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Lifetime of a session when the descriptor has no `exp`.
    /// Clamped to `MAX_SESSION_TTL` at establishment.
    pub default_ttl: Duration,
    pub establish_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        if config.ttl() > MAX_SESSION_TTL {
            tracing::warn!(
                ttl_secs = config.ttl_secs,
                max_secs = MAX_SESSION_TTL.as_secs(),
                "session ttl too large, clamping"
            );
        }
        Self {
            default_ttl: config.ttl(),
            establish_timeout: config.establish_timeout(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EstablishError {
    #[error(transparent)]
    Tunnel(#[from] TunnelError),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("session expiry is past what the system clock can represent")]
    ClockOutOfRange,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("no active session for {0} and no descriptor to establish one")]
    DescriptorRequired(String),
    #[error("descriptor addresses {found}, not {expected}")]
    TargetMismatch { expected: String, found: String },
    #[error("descriptor for {0} has already expired")]
    DescriptorExpired(String),
    #[error("failed to establish session to {target_id}: {source}")]
    EstablishmentFailed {
        target_id: String,
        #[source]
        source: EstablishError,
    },
}

pub struct SessionManager<T> {
    cache: Arc<SessionCache>,
    identity: IdentityProvider,
    tunnel: T,
    settings: SessionSettings,
}

impl<T: TunnelOpener> SessionManager<T> {
    pub fn new(
        cache: Arc<SessionCache>,
        identity: IdentityProvider,
        tunnel: T,
        settings: SessionSettings,
    ) -> Self {
        Self {
            cache,
            identity,
            tunnel,
            settings,
        }
    }

    /// Active session for `target_id`, without establishing anything.
    pub fn lookup(&self, target_id: &str) -> Option<SessionRecord> {
        self.cache.get(target_id)
    }

    /// Return the active session for `target_id`, establishing one from
    /// `descriptor` if there is none.
    pub async fn ensure_session(
        &self,
        target_id: &str,
        descriptor: Option<&ConnectionDescriptor>,
    ) -> Result<SessionRecord, SessionError> {
        if let Some(existing) = self.cache.get(target_id) {
            tracing::debug!(target_id, "reusing cached session");
            return Ok(existing);
        }
        let descriptor =
            descriptor.ok_or_else(|| SessionError::DescriptorRequired(target_id.to_string()))?;
        self.establish(target_id, descriptor).await
    }

    async fn establish(
        &self,
        target_id: &str,
        descriptor: &ConnectionDescriptor,
    ) -> Result<SessionRecord, SessionError> {
        if descriptor.target_id != target_id {
            return Err(SessionError::TargetMismatch {
                expected: target_id.to_string(),
                found: descriptor.target_id.clone(),
            });
        }

        let now = SystemTime::now();
        let expires_at = match descriptor.expires_at {
            Some(exp) if exp <= now => {
                return Err(SessionError::DescriptorExpired(target_id.to_string()))
            }
            Some(exp) => exp,
            None => {
                let ttl = self.settings.default_ttl.min(MAX_SESSION_TTL);
                now.checked_add(ttl).ok_or_else(|| SessionError::EstablishmentFailed {
                    target_id: target_id.to_string(),
                    source: EstablishError::ClockOutOfRange,
                })?
            }
        };

        let key = self.identity.ensure_key()?;
        let params = TunnelParams {
            target_id: target_id.to_string(),
            dispatch_url: descriptor.dispatch_url.clone(),
            token: descriptor.token.clone(),
            instance_id: descriptor.instance_id,
            nonce_key: descriptor.nonce_key.clone(),
            encrypted: descriptor.encrypted,
            key,
        };

        let timeout = self.settings.establish_timeout;
        let local_endpoint = match tokio::time::timeout(timeout, self.tunnel.open(&params)).await {
            Ok(Ok(addr)) => addr,
            Ok(Err(e)) => {
                tracing::warn!(target_id, error = %e, "tunnel establishment failed");
                return Err(SessionError::EstablishmentFailed {
                    target_id: target_id.to_string(),
                    source: e.into(),
                });
            }
            Err(_) => {
                tracing::warn!(target_id, ?timeout, "tunnel establishment timed out");
                return Err(SessionError::EstablishmentFailed {
                    target_id: target_id.to_string(),
                    source: EstablishError::TimedOut(timeout),
                });
            }
        };

        let record = SessionRecord {
            target_id: target_id.to_string(),
            config: ConnectionConfig {
                url: descriptor.dispatch_url.clone(),
                instance_id: descriptor.instance_id,
                max_instances: descriptor.max_instances,
                local_port: local_endpoint.port(),
            },
            local_endpoint,
            established_at: now,
            expires_at,
        };
        self.cache.put(target_id, record.clone());

        tracing::info!(
            target_id,
            url = %record.config.url,
            instance = record.config.instance_id,
            %local_endpoint,
            "session established"
        );
        Ok(record)
    }

    /// Cache a session that was established out of band.
    pub fn store_session(
        &self,
        target_id: &str,
        config: ConnectionConfig,
        local_endpoint: SocketAddr,
        expires_at: SystemTime,
    ) -> SessionRecord {
        let record = SessionRecord {
            target_id: target_id.to_string(),
            config,
            local_endpoint,
            established_at: SystemTime::now(),
            expires_at,
        };
        self.cache.put(target_id, record.clone());
        record
    }

    /// Forget the session for `target_id`. Returns the evicted record.
    pub fn end_session(&self, target_id: &str) -> Option<SessionRecord> {
        let removed = self.cache.remove(target_id)?;
        self.tunnel.release(target_id, removed.local_endpoint);
        tracing::info!(target_id, "session ended");
        Some(removed)
    }

    pub fn active_sessions(&self) -> Vec<SessionRecord> {
        self.cache.snapshot()
    }

    /// Evict expired records and release their endpoints. Lookups ignore
    /// expired records regardless.
    pub fn sweep(&self) -> usize {
        let evicted = self.cache.sweep_expired();
        for record in &evicted {
            self.tunnel.release(&record.target_id, record.local_endpoint);
        }
        if !evicted.is_empty() {
            tracing::debug!(evicted = evicted.len(), "swept expired sessions");
        }
        evicted.len()
    }

    pub fn identity(&self) -> &IdentityProvider {
        &self.identity
    }
}
