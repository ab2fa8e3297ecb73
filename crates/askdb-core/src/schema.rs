//! Database schema for the durable query log.

/// SQL schema for the append-only query log.
pub const SCHEMA: &str = r#"
-- Query log table: one row per executed query, system of record for
-- history, favorites, and analytics.
CREATE TABLE IF NOT EXISTS queries (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    user_id TEXT,
    question TEXT NOT NULL,
    sql TEXT NOT NULL,
    tables TEXT NOT NULL DEFAULT '[]',
    row_count INTEGER NOT NULL DEFAULT 0,
    execution_time_ms REAL NOT NULL DEFAULT 0,
    success INTEGER NOT NULL DEFAULT 1,
    error_message TEXT,
    widget_type TEXT NOT NULL DEFAULT 'default',
    is_favorite INTEGER NOT NULL DEFAULT 0,
    favorite_name TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queries_session_id ON queries(session_id);
CREATE INDEX IF NOT EXISTS idx_queries_user_id ON queries(user_id);
CREATE INDEX IF NOT EXISTS idx_queries_widget_type ON queries(widget_type);
CREATE INDEX IF NOT EXISTS idx_queries_created_at ON queries(created_at);
CREATE INDEX IF NOT EXISTS idx_queries_success ON queries(success);
CREATE INDEX IF NOT EXISTS idx_queries_is_favorite ON queries(is_favorite);
"#;
