//! Query history and favorites over the durable log plus a bounded
//! in-memory recency cache.
//!
//! Every add is appended to the durable log unconditionally; the cache is
//! only updated after the write committed, so it can never reference a
//! record that failed to persist. Deduplication applies to the cache alone:
//! the log keeps every attempt so analytics sees them, while the recent
//! list and suggestions stay clean.

use crate::db::Database;
use crate::error::Result;
use crate::models::{QueryRecord, WidgetType};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Default cap on non-favorite cached records per session.
pub const DEFAULT_MAX_HISTORY_PER_SESSION: usize = 50;

/// Default cap on favorite records.
pub const DEFAULT_MAX_FAVORITES: usize = 100;

/// Default in-memory retention for cached history: 24 hours.
pub const DEFAULT_HISTORY_RETENTION_HOURS: i64 = 24;

/// Session id assigned to favorites created outside any session.
const GLOBAL_SESSION: &str = "global";

/// Records the dedup window looks back over.
const DEDUP_WINDOW: usize = 5;

/// History store. Writes go to the durable log first, then to the
/// per-session recency cache.
pub struct QueryHistoryStore {
    db: Arc<Database>,
    cache: Mutex<HashMap<String, Vec<QueryRecord>>>,
    max_history_per_session: usize,
    max_favorites: usize,
}

/// Input for logging one executed query.
#[derive(Debug, Clone)]
pub struct NewQuery {
    pub session_id: String,
    pub question: String,
    pub sql: String,
    pub tables: Vec<String>,
    pub row_count: i64,
    pub execution_time_ms: f64,
    pub success: bool,
    pub error_message: Option<String>,
    pub widget_type: WidgetType,
    pub user_id: Option<String>,
    pub tags: Vec<String>,
}

impl Default for NewQuery {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            question: String::new(),
            sql: String::new(),
            tables: Vec::new(),
            row_count: 0,
            execution_time_ms: 0.0,
            success: true,
            error_message: None,
            widget_type: WidgetType::Default,
            user_id: None,
            tags: Vec::new(),
        }
    }
}

/// Parameters for reading history.
#[derive(Debug, Default, Clone)]
pub struct HistoryQuery {
    pub session_id: String,
    /// Defaults to 20, clamped to 50.
    pub limit: Option<usize>,
    pub offset: usize,
    /// Case-insensitive substring match against question or SQL.
    pub search: Option<String>,
    /// Keep records whose tables intersect this set.
    pub tables_filter: Vec<String>,
}

/// Request to flag a query as favorite.
///
/// Either `query_id` (mark an existing record) or `question` + `sql`
/// (create a new one) must be given; anything less yields `None`.
#[derive(Debug, Default, Clone)]
pub struct FavoriteRequest {
    pub query_id: Option<String>,
    pub session_id: Option<String>,
    pub question: Option<String>,
    pub sql: Option<String>,
    pub tables: Vec<String>,
    pub favorite_name: Option<String>,
    pub tags: Vec<String>,
}

/// A suggested query and where it came from.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Suggestion {
    pub source: SuggestionSource,
    pub query: QueryRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    Favorite,
    History,
}

/// History store occupancy snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HistoryStats {
    pub cached_sessions: usize,
    pub cached_records: usize,
    pub total_favorites: i64,
    pub max_history_per_session: usize,
    pub max_favorites: usize,
}

impl QueryHistoryStore {
    pub fn new(db: Arc<Database>, max_history_per_session: usize, max_favorites: usize) -> Self {
        tracing::info!(
            max_history_per_session,
            max_favorites,
            "query history store initialized"
        );
        Self {
            db,
            cache: Mutex::new(HashMap::new()),
            max_history_per_session,
            max_favorites,
        }
    }

    /// Log one executed query.
    ///
    /// The record always lands in the durable log. It is added to the
    /// session's recency cache only when its normalized SQL differs from
    /// the last five cached entries; past the per-session bound, the oldest
    /// non-favorite cached entry is evicted (favorites are exempt).
    pub async fn add(&self, new: NewQuery) -> Result<QueryRecord> {
        // The log stores millisecond timestamps; truncate up front so the
        // returned record, the cache, and the log all carry the same value.
        let now = Utc::now();
        let created_at = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

        let record = QueryRecord {
            id: Uuid::new_v4().to_string(),
            session_id: new.session_id,
            user_id: new.user_id,
            question: new.question,
            sql: new.sql,
            tables: new.tables,
            row_count: new.row_count,
            execution_time_ms: new.execution_time_ms,
            success: new.success,
            error_message: new.error_message,
            widget_type: new.widget_type,
            is_favorite: false,
            favorite_name: None,
            tags: new.tags,
            created_at,
        };

        // Durable write first; the cache must never reference a record
        // that failed to persist.
        self.db.insert_query(&record).await?;

        let mut cache = self.cache.lock();
        let entries = cache.entry(record.session_id.clone()).or_default();

        let hash = record.dedup_hash();
        let duplicate = entries
            .iter()
            .rev()
            .take(DEDUP_WINDOW)
            .any(|cached| cached.dedup_hash() == hash);

        if !duplicate {
            entries.push(record.clone());

            if entries.len() > self.max_history_per_session {
                if let Some(pos) = entries.iter().position(|cached| !cached.is_favorite) {
                    entries.remove(pos);
                }
            }
        }

        Ok(record)
    }

    /// Read history for a session from the durable log, newest first.
    /// Search and table filters apply before pagination.
    pub async fn get_history(&self, query: HistoryQuery) -> Result<Vec<QueryRecord>> {
        let limit = query.limit.unwrap_or(20).min(50);
        let mut records = self.db.session_queries(&query.session_id).await?;

        if let Some(search) = &query.search {
            let needle = search.to_lowercase();
            records.retain(|record| {
                record.question.to_lowercase().contains(&needle)
                    || record.sql.to_lowercase().contains(&needle)
            });
        }

        if !query.tables_filter.is_empty() {
            records.retain(|record| intersects(&record.tables, &query.tables_filter));
        }

        Ok(records.into_iter().skip(query.offset).take(limit).collect())
    }

    /// Get a single record from the durable log.
    pub async fn get_query(&self, query_id: &str) -> Result<Option<QueryRecord>> {
        self.db.get_query(query_id).await
    }

    /// Flag a query as favorite, either by id or by synthesizing a new
    /// record from question + sql. Returns `None` when the id is unknown or
    /// when the request carries neither form.
    pub async fn add_to_favorites(&self, request: FavoriteRequest) -> Result<Option<QueryRecord>> {
        if let Some(query_id) = &request.query_id {
            return self.mark_existing_favorite(query_id, &request).await;
        }

        if let (Some(question), Some(sql)) = (&request.question, &request.sql) {
            return self.create_favorite(question, sql, &request).await.map(Some);
        }

        // Not enough information; a caller-visible sentinel, not an error.
        Ok(None)
    }

    async fn mark_existing_favorite(
        &self,
        query_id: &str,
        request: &FavoriteRequest,
    ) -> Result<Option<QueryRecord>> {
        let Some(mut record) = self.db.get_query(query_id).await? else {
            return Ok(None);
        };

        let name = request
            .favorite_name
            .clone()
            .unwrap_or_else(|| default_favorite_name(&record.question));

        self.db.set_favorite(query_id, true, Some(&name)).await?;
        if !request.tags.is_empty() {
            self.db.update_tags(query_id, &request.tags).await?;
            record.tags = request.tags.clone();
        }

        record.is_favorite = true;
        record.favorite_name = Some(name.clone());
        self.update_cached_flags(&record.session_id, query_id, true, Some(&name));

        Ok(Some(record))
    }

    async fn create_favorite(
        &self,
        question: &str,
        sql: &str,
        request: &FavoriteRequest,
    ) -> Result<QueryRecord> {
        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| GLOBAL_SESSION.to_string());

        let mut record = self
            .add(NewQuery {
                session_id,
                question: question.to_string(),
                sql: sql.to_string(),
                tables: request.tables.clone(),
                tags: request.tags.clone(),
                ..NewQuery::default()
            })
            .await?;

        let name = request
            .favorite_name
            .clone()
            .unwrap_or_else(|| default_favorite_name(question));
        self.db.set_favorite(&record.id, true, Some(&name)).await?;
        record.is_favorite = true;
        record.favorite_name = Some(name.clone());
        self.update_cached_flags(&record.session_id, &record.id, true, Some(&name));

        // Bound the favorites set: the one with the smallest created_at
        // loses its flag first.
        if self.db.count_favorites().await? > self.max_favorites as i64 {
            if let Some(oldest) = self.db.oldest_favorite().await? {
                self.db.set_favorite(&oldest.id, false, None).await?;
                self.update_cached_flags(&oldest.session_id, &oldest.id, false, None);
                tracing::debug!(query = %oldest.id, "favorite evicted (oldest)");
            }
        }

        Ok(record)
    }

    /// Unflag a favorite. Returns false if the id is unknown or not
    /// currently a favorite.
    pub async fn remove_from_favorites(&self, query_id: &str) -> Result<bool> {
        match self.db.get_query(query_id).await? {
            Some(record) if record.is_favorite => {
                self.db.set_favorite(query_id, false, None).await?;
                self.update_cached_flags(&record.session_id, query_id, false, None);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// All favorites, filtered and sorted by favorite name (falling back
    /// to the question).
    pub async fn get_favorites(
        &self,
        limit: usize,
        search: Option<&str>,
        tags_filter: &[String],
    ) -> Result<Vec<QueryRecord>> {
        let mut favorites = self.db.favorites().await?;

        if let Some(search) = search {
            let needle = search.to_lowercase();
            favorites.retain(|record| {
                record.question.to_lowercase().contains(&needle)
                    || record.sql.to_lowercase().contains(&needle)
                    || record
                        .favorite_name
                        .as_ref()
                        .is_some_and(|name| name.to_lowercase().contains(&needle))
            });
        }

        if !tags_filter.is_empty() {
            favorites.retain(|record| intersects(&record.tags, tags_filter));
        }

        favorites.sort_by_key(|record| {
            record
                .favorite_name
                .clone()
                .unwrap_or_else(|| record.question.clone())
        });
        favorites.truncate(limit);
        Ok(favorites)
    }

    /// Delete a query from the durable log and the session's cache.
    /// Returns false if it was found in neither.
    pub async fn delete_query(&self, query_id: &str, session_id: &str) -> Result<bool> {
        let removed_durable = self.db.delete_query(query_id).await?;

        let removed_cached = {
            let mut cache = self.cache.lock();
            match cache.get_mut(session_id) {
                Some(entries) => {
                    let before = entries.len();
                    entries.retain(|record| record.id != query_id);
                    before != entries.len()
                }
                None => false,
            }
        };

        Ok(removed_durable || removed_cached)
    }

    /// Remove every non-favorite record for a session from the durable log
    /// and the cache. Favorites survive. Returns the durable rows removed.
    pub async fn clear_history(&self, session_id: &str) -> Result<u64> {
        let removed = self.db.clear_session_history(session_id).await?;

        let mut cache = self.cache.lock();
        let now_empty = match cache.get_mut(session_id) {
            Some(entries) => {
                entries.retain(|record| record.is_favorite);
                entries.is_empty()
            }
            None => false,
        };
        if now_empty {
            cache.remove(session_id);
        }

        Ok(removed)
    }

    /// Suggestions for the current table selection: favorites whose tables
    /// intersect first, then cached non-favorite history most recent first,
    /// deduplicated by id.
    pub async fn get_suggested_queries(
        &self,
        session_id: &str,
        current_tables: &[String],
        limit: usize,
    ) -> Result<Vec<Suggestion>> {
        let favorites = self.db.favorites().await?;

        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();

        for favorite in favorites {
            if intersects(&favorite.tables, current_tables) && seen.insert(favorite.id.clone()) {
                suggestions.push(Suggestion {
                    source: SuggestionSource::Favorite,
                    query: favorite,
                });
            }
        }

        let cache = self.cache.lock();
        if let Some(entries) = cache.get(session_id) {
            for record in entries.iter().rev() {
                if !record.is_favorite
                    && intersects(&record.tables, current_tables)
                    && seen.insert(record.id.clone())
                {
                    suggestions.push(Suggestion {
                        source: SuggestionSource::History,
                        query: record.clone(),
                    });
                }
            }
        }
        drop(cache);

        suggestions.truncate(limit);
        Ok(suggestions)
    }

    /// Distinct table names over the session's 10 most recent cached
    /// records, in recency order.
    pub fn get_recent_tables(&self, session_id: &str, limit: usize) -> Vec<String> {
        let cache = self.cache.lock();
        let Some(entries) = cache.get(session_id) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut tables = Vec::new();
        for record in entries.iter().rev().take(10) {
            for table in &record.tables {
                if seen.insert(table.clone()) {
                    tables.push(table.clone());
                    if tables.len() >= limit {
                        return tables;
                    }
                }
            }
        }
        tables
    }

    /// Drop cached entries older than the retention window, keeping
    /// favorites. Sessions left with nothing are removed from the map so
    /// idle sessions do not pin memory. The durable log is untouched.
    /// Returns the number of cached entries removed.
    pub fn prune(&self, retention: Duration) -> usize {
        let cutoff = Utc::now() - retention;
        let mut cache = self.cache.lock();
        let mut removed = 0;
        cache.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|record| record.is_favorite || record.created_at > cutoff);
            removed += before - entries.len();
            !entries.is_empty()
        });
        removed
    }

    /// Snapshot of cache occupancy and favorite count.
    pub async fn stats(&self) -> Result<HistoryStats> {
        let total_favorites = self.db.count_favorites().await?;
        let cache = self.cache.lock();
        Ok(HistoryStats {
            cached_sessions: cache.len(),
            cached_records: cache.values().map(Vec::len).sum(),
            total_favorites,
            max_history_per_session: self.max_history_per_session,
            max_favorites: self.max_favorites,
        })
    }

    /// Number of cached records for one session. Test and admin surface.
    pub fn cached_len(&self, session_id: &str) -> usize {
        self.cache
            .lock()
            .get(session_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn update_cached_flags(
        &self,
        session_id: &str,
        query_id: &str,
        is_favorite: bool,
        favorite_name: Option<&str>,
    ) {
        let mut cache = self.cache.lock();
        if let Some(entries) = cache.get_mut(session_id) {
            if let Some(record) = entries.iter_mut().find(|record| record.id == query_id) {
                record.is_favorite = is_favorite;
                record.favorite_name = favorite_name.map(ToOwned::to_owned);
            }
        }
    }
}

fn default_favorite_name(question: &str) -> String {
    question.chars().take(50).collect()
}

fn intersects(tables: &[String], filter: &[String]) -> bool {
    filter.iter().any(|wanted| tables.contains(wanted))
}
