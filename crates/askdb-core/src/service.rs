//! Startup wiring for the core stores.
//!
//! Each store is constructed exactly once here and passed by reference into
//! whatever request layer sits on top; there is no global mutable state.

use std::sync::Arc;
use std::time::Duration;

use crate::analytics::AnalyticsAggregator;
use crate::config::Config;
use crate::conversations::ConversationStore;
use crate::db::Database;
use crate::error::Result;
use crate::history::QueryHistoryStore;
use crate::sessions::SessionStore;
use crate::sweeper::SweeperHandle;

/// The assembled core: one instance of each store plus their sweep tasks.
pub struct Service {
    db: Arc<Database>,
    pub sessions: Arc<SessionStore>,
    pub conversations: Arc<ConversationStore>,
    pub history: Arc<QueryHistoryStore>,
    pub analytics: AnalyticsAggregator,
    sweepers: Vec<SweeperHandle>,
}

impl Service {
    /// Open the durable log, construct the stores, and start the
    /// background sweeps.
    pub async fn start(config: &Config) -> Result<Self> {
        let db = Arc::new(Database::open(&config.database).await?);

        let sessions = Arc::new(SessionStore::new(config.sessions.ttl_minutes));
        let conversations = Arc::new(ConversationStore::new(config.conversations.ttl_minutes));
        let history = Arc::new(QueryHistoryStore::new(
            db.clone(),
            config.history.max_history_per_session,
            config.history.max_favorites,
        ));
        let analytics = AnalyticsAggregator::new(db.clone());

        let sweepers = vec![
            SweeperHandle::spawn(
                "sessions",
                Duration::from_secs(config.sessions.sweep_interval_secs),
                {
                    let sessions = sessions.clone();
                    move || sessions.sweep()
                },
            ),
            SweeperHandle::spawn(
                "conversations",
                Duration::from_secs(config.conversations.sweep_interval_secs),
                {
                    let conversations = conversations.clone();
                    move || conversations.sweep()
                },
            ),
            SweeperHandle::spawn(
                "history",
                Duration::from_secs(config.history.sweep_interval_secs),
                {
                    let history = history.clone();
                    let retention = chrono::Duration::hours(config.history.retention_hours);
                    move || history.prune(retention)
                },
            ),
        ];

        Ok(Self {
            db,
            sessions,
            conversations,
            history,
            analytics,
            sweepers,
        })
    }

    /// Stop the sweep tasks and close the durable log.
    pub async fn shutdown(self) {
        for sweeper in self.sweepers {
            sweeper.shutdown().await;
        }
        self.db.close().await;
        tracing::info!("core service shut down");
    }
}
