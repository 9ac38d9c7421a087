//! Session cache. At most one record per target, expired lazily.
//!
//! Expiry is checked on read: an expired record stays in the table until it
//! is overwritten, removed, or swept, but is never returned. A single mutex
//! guards the whole table; it only ever holds a handful of devices.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

/// What a front-end needs to reconnect to or report on a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Websocket dispatcher endpoint.
    pub url: String,
    pub instance_id: u32,
    pub max_instances: u32,
    /// Local port the tunnel is bound to.
    pub local_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub target_id: String,
    pub config: ConnectionConfig,
    pub local_endpoint: SocketAddr,
    pub established_at: SystemTime,
    pub expires_at: SystemTime,
}

impl SessionRecord {
    pub fn is_active_at(&self, now: SystemTime) -> bool {
        now < self.expires_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(SystemTime::now())
    }

    /// Time left before expiry; zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }
}

/// Target id → session record.
#[derive(Debug, Default)]
pub struct SessionCache {
    table: Mutex<HashMap<String, SessionRecord>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section is a single map operation, so a panic while
    // holding the lock cannot leave a half-written entry behind.
    fn table(&self) -> MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Active record for `target_id`, if any.
    pub fn get(&self, target_id: &str) -> Option<SessionRecord> {
        self.get_at(target_id, SystemTime::now())
    }

    pub fn get_at(&self, target_id: &str, now: SystemTime) -> Option<SessionRecord> {
        self.table()
            .get(target_id)
            .filter(|r| r.is_active_at(now))
            .cloned()
    }

    /// Replace whatever is stored for `target_id`.
    pub fn put(&self, target_id: &str, record: SessionRecord) {
        if let Some(old) = self.table().insert(target_id.to_string(), record) {
            tracing::debug!(target_id, expired = !old.is_active(), "replaced cached session");
        }
    }

    pub fn remove(&self, target_id: &str) -> Option<SessionRecord> {
        self.table().remove(target_id)
    }

    /// All active records.
    pub fn snapshot(&self) -> Vec<SessionRecord> {
        self.snapshot_at(SystemTime::now())
    }

    pub fn snapshot_at(&self, now: SystemTime) -> Vec<SessionRecord> {
        let mut records: Vec<SessionRecord> = self
            .table()
            .values()
            .filter(|r| r.is_active_at(now))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.target_id.cmp(&b.target_id));
        records
    }

    /// Drop expired records and return them.
    pub fn sweep_expired(&self) -> Vec<SessionRecord> {
        self.sweep_expired_at(SystemTime::now())
    }

    pub fn sweep_expired_at(&self, now: SystemTime) -> Vec<SessionRecord> {
        let mut table = self.table();
        let expired: Vec<String> = table
            .iter()
            .filter(|(_, r)| !r.is_active_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        expired
            .iter()
            .filter_map(|k| table.remove(k))
            .collect()
    }

    /// Physical entry count, expired records included.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}
