//! Authenticated-session registry with sliding TTL expiry.

use crate::models::AuthSession;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Default session lifetime: 8 hours of inactivity.
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 480;

/// Thread-safe registry of authenticated sessions.
///
/// Each session owns an opaque database config blob handed over at login.
/// Expiry is lazy on access plus a periodic sweep; every successful read
/// renews the lease.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, AuthSession>>,
    ttl_minutes: i64,
}

impl SessionStore {
    pub fn new(ttl_minutes: i64) -> Self {
        tracing::info!(ttl_minutes, "session store initialized");
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl_minutes,
        }
    }

    /// Create a session for an authenticated user. The credential check
    /// itself happens elsewhere; by the time we are called it succeeded.
    pub fn create(&self, username: &str, db_config: serde_json::Value) -> String {
        let session = AuthSession::new(username, db_config, self.ttl_minutes);
        let id = session.id.clone();
        self.sessions.lock().insert(id.clone(), session);
        tracing::info!(username, session = %short_id(&id), "session created");
        id
    }

    /// Look up a session. Expired entries are evicted and reported as
    /// absent; a live hit renews the sliding lease before returning.
    pub fn get(&self, id: &str) -> Option<AuthSession> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(id)?;

        if session.is_expired() {
            tracing::debug!(session = %short_id(id), "session expired on access");
            sessions.remove(id);
            return None;
        }

        session.touch();
        Some(session.clone())
    }

    /// Check whether a session is live.
    pub fn validate(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The opaque database config owned by a session.
    pub fn db_config(&self, id: &str) -> Option<serde_json::Value> {
        self.get(id).map(|session| session.db_config)
    }

    /// Attach a conversation id to a session. The link is lookup-only;
    /// deleting either side never cascades.
    pub fn link_conversation(&self, id: &str, conversation_id: &str) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(id) {
            Some(session) if !session.is_expired() => {
                session.conversation_id = Some(conversation_id.to_string());
                session.touch();
                true
            }
            _ => false,
        }
    }

    /// Remove a session unconditionally. Returns false if absent.
    pub fn destroy(&self, id: &str) -> bool {
        let removed = self.sessions.lock().remove(id);
        if let Some(session) = &removed {
            tracing::info!(username = %session.username, session = %short_id(id), "session destroyed");
        }
        removed.is_some()
    }

    /// Remove every expired session under one exclusive lock.
    /// Returns the number removed.
    pub fn sweep(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        before - sessions.len()
    }

    /// Snapshot of store occupancy.
    pub fn stats(&self) -> SessionStats {
        let sessions = self.sessions.lock();
        let active = sessions.values().filter(|s| !s.is_expired()).count();
        SessionStats {
            total_sessions: sessions.len(),
            active_sessions: active,
            ttl_minutes: self.ttl_minutes,
        }
    }

    /// All live sessions, for the admin surface.
    pub fn list(&self) -> Vec<AuthSession> {
        self.sessions
            .lock()
            .values()
            .filter(|s| !s.is_expired())
            .cloned()
            .collect()
    }
}

/// Session store occupancy snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub ttl_minutes: i64,
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
