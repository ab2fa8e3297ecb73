//! Unit tests for the authenticated-session store.

use super::*;
use serde_json::json;
use std::time::Duration;

fn sleep_briefly() {
    std::thread::sleep(Duration::from_millis(2));
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn create_returns_distinct_opaque_ids() {
        let store = SessionStore::new(480);
        let a = store.create("alice", json!({"host": "db1"}));
        let b = store.create("alice", json!({"host": "db1"}));
        assert_ne!(a, b);
    }

    #[test]
    fn get_returns_session_with_db_config() {
        let store = SessionStore::new(480);
        let id = store.create("alice", json!({"host": "db1", "port": 5432}));

        let session = store.get(&id).expect("session exists");
        assert_eq!(session.username, "alice");
        assert_eq!(session.db_config, json!({"host": "db1", "port": 5432}));
    }

    #[test]
    fn get_unknown_returns_none() {
        let store = SessionStore::new(480);
        assert!(store.get("no-such-id").is_none());
    }

    #[test]
    fn destroy_removes_unconditionally() {
        let store = SessionStore::new(480);
        let id = store.create("alice", json!({}));
        assert!(store.destroy(&id));
        assert!(!store.destroy(&id));
        assert!(store.get(&id).is_none());
    }
}

#[cfg(test)]
mod sliding_expiry_tests {
    use super::*;

    #[test]
    fn last_activity_is_non_decreasing_across_gets() {
        let store = SessionStore::new(480);
        let id = store.create("alice", json!({}));

        let first = store.get(&id).expect("live").last_activity;
        sleep_briefly();
        let second = store.get(&id).expect("live").last_activity;
        sleep_briefly();
        let third = store.get(&id).expect("live").last_activity;

        assert!(second >= first);
        assert!(third >= second);
        assert!(third > first);
    }

    #[test]
    fn expired_session_is_absent_and_evicted_on_get() {
        let store = SessionStore::new(0);
        let id = store.create("alice", json!({}));
        sleep_briefly();

        assert!(store.get(&id).is_none());
        // Lazy expiry removed the entry, not just hid it.
        assert_eq!(store.stats().total_sessions, 0);
    }

    #[test]
    fn validate_tracks_liveness() {
        let live = SessionStore::new(480);
        let id = live.create("alice", json!({}));
        assert!(live.validate(&id));

        let dead = SessionStore::new(0);
        let id = dead.create("bob", json!({}));
        sleep_briefly();
        assert!(!dead.validate(&id));
    }

    #[test]
    fn sweep_removes_all_expired_entries() {
        let store = SessionStore::new(0);
        store.create("a", json!({}));
        store.create("b", json!({}));
        store.create("c", json!({}));
        sleep_briefly();

        assert_eq!(store.sweep(), 3);
        assert_eq!(store.stats().total_sessions, 0);
    }

    #[test]
    fn sweep_keeps_live_entries() {
        let store = SessionStore::new(480);
        store.create("a", json!({}));
        store.create("b", json!({}));

        assert_eq!(store.sweep(), 0);
        assert_eq!(store.stats().total_sessions, 2);
    }
}

#[cfg(test)]
mod linkage_tests {
    use super::*;

    #[test]
    fn link_conversation_is_non_owning() {
        let store = SessionStore::new(480);
        let id = store.create("alice", json!({}));

        assert!(store.link_conversation(&id, "conv-1"));
        let session = store.get(&id).expect("live");
        assert_eq!(session.conversation_id.as_deref(), Some("conv-1"));
    }

    #[test]
    fn link_conversation_fails_for_unknown_session() {
        let store = SessionStore::new(480);
        assert!(!store.link_conversation("no-such-id", "conv-1"));
    }

    #[test]
    fn db_config_returns_none_when_expired() {
        let store = SessionStore::new(0);
        let id = store.create("alice", json!({"host": "db1"}));
        sleep_briefly();
        assert!(store.db_config(&id).is_none());
    }
}

#[cfg(test)]
mod admin_tests {
    use super::*;

    #[test]
    fn list_returns_live_sessions() {
        let store = SessionStore::new(480);
        store.create("alice", json!({}));
        store.create("bob", json!({}));

        let sessions = store.list();
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn stats_counts_active() {
        let store = SessionStore::new(480);
        store.create("alice", json!({}));

        let stats = store.stats();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.ttl_minutes, 480);
    }
}
