//! Session registry
//!
//! The store is the only place session identifiers are minted. Records live in
//! a sharded concurrent map; every read or write of a record happens while
//! holding that record's shard lock, so a transition touching several fields
//! is never observed half-applied.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{ExpiryBasis, SessionConfig};

use super::command::PlaybackCommand;
use super::record::PlaybackRecord;

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Concurrent registry of playback sessions
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<SessionId, PlaybackRecord>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session with a default record
    pub fn create_session(&self) -> SessionId {
        let id = SessionId::generate();
        self.sessions
            .insert(id.clone(), PlaybackRecord::new(Utc::now()));
        tracing::info!(session_id = %id, "Session created");
        id
    }

    /// Snapshot of a session's record
    pub fn get_session(&self, id: &str) -> Option<PlaybackRecord> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Look up `id`, minting a new session when it is absent or unknown
    pub fn get_or_create(&self, id: Option<&str>) -> (SessionId, PlaybackRecord) {
        if let Some(id) = id {
            if let Some(entry) = self.sessions.get(id) {
                return (entry.key().clone(), entry.value().clone());
            }
            tracing::debug!(requested = id, "Unknown session, creating a new one");
        }
        let now = Utc::now();
        let id = SessionId::generate();
        let record = PlaybackRecord::new(now);
        self.sessions.insert(id.clone(), record.clone());
        tracing::info!(session_id = %id, "Session created");
        (id, record)
    }

    /// Run `f` against a session's record while holding its lock
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut PlaybackRecord) -> R) -> Option<R> {
        self.sessions.get_mut(id).map(|mut entry| f(entry.value_mut()))
    }

    /// Apply a command to `id` (or to a new session when `id` is absent or
    /// unknown). Returns the session id and the record after the transition.
    pub fn apply(&self, id: Option<&str>, command: &PlaybackCommand) -> (SessionId, PlaybackRecord) {
        let now = Utc::now();
        if let Some(id) = id {
            if let Some(mut entry) = self.sessions.get_mut(id) {
                entry.value_mut().apply(command, now);
                return (entry.key().clone(), entry.value().clone());
            }
        }

        let id = SessionId::generate();
        let mut record = PlaybackRecord::new(now);
        record.apply(command, now);
        self.sessions.insert(id.clone(), record.clone());
        tracing::info!(session_id = %id, "Session created");
        (id, record)
    }

    /// Read the transport flag, marking the session active. `None` once the
    /// session is gone.
    pub fn poll_playing(&self, id: &str, now: DateTime<Utc>) -> Option<bool> {
        self.update(id, |record| {
            if record.is_playing {
                record.touch(now);
            }
            record.is_playing
        })
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            tracing::info!(session_id = id, "Session removed");
        }
        removed
    }

    /// Remove sessions created more than `max_age` ago.
    ///
    /// Creation time only; a session in active use is evicted all the same.
    pub fn expire_older_than(&self, max_age: Duration) -> usize {
        self.expire_where(max_age, |record, now| record.age_secs(now))
    }

    /// Remove sessions with no command or delivered chunk for `max_age`
    pub fn expire_inactive_longer_than(&self, max_age: Duration) -> usize {
        self.expire_where(max_age, |record, now| record.idle_secs(now))
    }

    /// Run one maintenance sweep according to `config`
    pub fn sweep(&self, config: &SessionConfig) -> usize {
        let max_age = Duration::from_secs(config.max_age_secs);
        match config.expiry {
            ExpiryBasis::Created => self.expire_older_than(max_age),
            ExpiryBasis::LastActivity => self.expire_inactive_longer_than(max_age),
        }
    }

    fn expire_where(
        &self,
        max_age: Duration,
        age_of: impl Fn(&PlaybackRecord, DateTime<Utc>) -> f64,
    ) -> usize {
        let now = Utc::now();
        let limit = max_age.as_secs_f64();
        let mut removed = 0;

        self.sessions.retain(|id, record| {
            let age = age_of(record, now);
            if age > limit {
                tracing::debug!(session_id = %id, age_secs = age, "Session expired");
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            tracing::info!("Cleaned {} expired sessions", removed);
        }
        removed
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Start a background task that periodically sweeps expired sessions
pub fn start_expiry_task(store: SessionStore, config: SessionConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(config.sweep_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            store.sweep(&config);
        }
    })
}
