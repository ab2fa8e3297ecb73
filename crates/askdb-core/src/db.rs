//! Durable query log backed by SQLite.
//!
//! This is the system of record for history, favorites, and analytics.
//! Every executed query is appended here unconditionally; the in-memory
//! recency cache in [`crate::history`] is rebuilt on top of it.

use crate::error::Result;
use crate::models::{QueryRecord, WidgetType};
use crate::schema::SCHEMA;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

/// Handle to the durable query log.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self> {
        let parent = path.parent().unwrap_or(Path::new("."));
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Initialize schema.
    async fn init(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Append a query record. A record is either fully committed or not
    /// committed at all.
    pub async fn insert_query(&self, record: &QueryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO queries (
                id, session_id, user_id, question, sql, tables,
                row_count, execution_time_ms, success, error_message,
                widget_type, is_favorite, favorite_name, tags, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.session_id)
        .bind(&record.user_id)
        .bind(&record.question)
        .bind(&record.sql)
        .bind(serde_json::to_string(&record.tables)?)
        .bind(record.row_count)
        .bind(record.execution_time_ms)
        .bind(record.success)
        .bind(&record.error_message)
        .bind(record.widget_type.as_str())
        .bind(record.is_favorite)
        .bind(&record.favorite_name)
        .bind(serde_json::to_string(&record.tags)?)
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a single query by ID.
    pub async fn get_query(&self, id: &str) -> Result<Option<QueryRecord>> {
        let row = sqlx::query("SELECT * FROM queries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| query_from_row(&row)))
    }

    /// All records for a session, newest first. Same-millisecond inserts
    /// keep insertion order via the rowid tiebreak.
    pub async fn session_queries(&self, session_id: &str) -> Result<Vec<QueryRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM queries WHERE session_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(query_from_row).collect())
    }

    /// Records created at or after the cutoff, oldest first, optionally
    /// restricted to one widget type.
    pub async fn records_since(
        &self,
        cutoff: DateTime<Utc>,
        widget_type: Option<WidgetType>,
    ) -> Result<Vec<QueryRecord>> {
        let rows = match widget_type {
            Some(widget) => {
                sqlx::query(
                    "SELECT * FROM queries WHERE created_at >= ? AND widget_type = ? \
                     ORDER BY created_at ASC, rowid ASC",
                )
                .bind(cutoff.timestamp_millis())
                .bind(widget.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM queries WHERE created_at >= ? \
                     ORDER BY created_at ASC, rowid ASC",
                )
                .bind(cutoff.timestamp_millis())
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(query_from_row).collect())
    }

    /// Update the favorite flag and name of a query.
    /// Returns false if the ID is unknown.
    pub async fn set_favorite(
        &self,
        id: &str,
        is_favorite: bool,
        favorite_name: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE queries SET is_favorite = ?, favorite_name = ? WHERE id = ?")
            .bind(is_favorite)
            .bind(favorite_name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the tags of a query.
    pub async fn update_tags(&self, id: &str, tags: &[String]) -> Result<bool> {
        let result = sqlx::query("UPDATE queries SET tags = ? WHERE id = ?")
            .bind(serde_json::to_string(tags)?)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a query. Returns false if the ID is unknown.
    pub async fn delete_query(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM queries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every non-favorite record for a session. Favorites survive.
    /// Returns the number of rows removed.
    pub async fn clear_session_history(&self, session_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM queries WHERE session_id = ? AND is_favorite = 0")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// All favorite records, oldest first.
    pub async fn favorites(&self) -> Result<Vec<QueryRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM queries WHERE is_favorite = 1 ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(query_from_row).collect())
    }

    /// Number of favorite records.
    pub async fn count_favorites(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM queries WHERE is_favorite = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// The favorite with the smallest created_at, if any.
    pub async fn oldest_favorite(&self) -> Result<Option<QueryRecord>> {
        let row = sqlx::query(
            "SELECT * FROM queries WHERE is_favorite = 1 \
             ORDER BY created_at ASC, rowid ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| query_from_row(&row)))
    }

    /// Log health: total records plus the oldest and newest timestamps.
    pub async fn stats(&self) -> Result<LogStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) as total, MIN(created_at) as oldest, MAX(created_at) as newest \
             FROM queries",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(LogStats {
            total: row.get("total"),
            oldest: row
                .get::<Option<i64>, _>("oldest")
                .and_then(datetime_from_millis),
            newest: row
                .get::<Option<i64>, _>("newest")
                .and_then(datetime_from_millis),
        })
    }
}

/// Log health summary.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LogStats {
    pub total: i64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

fn datetime_from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.with_timezone(&Utc))
}

fn query_from_row(row: &sqlx::sqlite::SqliteRow) -> QueryRecord {
    QueryRecord {
        id: row.get("id"),
        session_id: row.get("session_id"),
        user_id: row.get("user_id"),
        question: row.get("question"),
        sql: row.get("sql"),
        tables: row
            .get::<Option<String>, _>("tables")
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        row_count: row.get("row_count"),
        execution_time_ms: row.get("execution_time_ms"),
        success: row.get("success"),
        error_message: row.get("error_message"),
        widget_type: WidgetType::from(row.get::<&str, _>("widget_type")),
        is_favorite: row.get("is_favorite"),
        favorite_name: row.get("favorite_name"),
        tags: row
            .get::<Option<String>, _>("tags")
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        created_at: datetime_from_millis(row.get::<i64, _>("created_at")).unwrap_or_default(),
    }
}
