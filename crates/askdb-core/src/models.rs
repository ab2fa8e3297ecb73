//! Domain models for sessions, conversations, and the query log.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message roles within a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

impl From<&str> for MessageRole {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "assistant" | "agent" | "ai" | "bot" => MessageRole::Assistant,
            "system" => MessageRole::System,
            _ => MessageRole::User,
        }
    }
}

/// Client surface tag partitioning history and analytics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WidgetType {
    #[default]
    Default,
    Auth,
}

impl WidgetType {
    pub fn as_str(self) -> &'static str {
        match self {
            WidgetType::Default => "default",
            WidgetType::Auth => "auth",
        }
    }
}

impl std::fmt::Display for WidgetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for WidgetType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "auth" => WidgetType::Auth,
            _ => WidgetType::Default,
        }
    }
}

/// An authenticated session. The `db_config` blob is owned by the caller
/// and never interpreted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub id: String,
    pub username: String,
    pub db_config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub ttl_minutes: i64,
    /// Non-owning link to a conversation session. Lookup only, never
    /// cascades deletion.
    pub conversation_id: Option<String>,
}

impl AuthSession {
    pub fn new(username: impl Into<String>, db_config: serde_json::Value, ttl_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            db_config,
            created_at: now,
            last_activity: now,
            ttl_minutes,
            conversation_id: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() - self.last_activity > Duration::minutes(self.ttl_minutes)
    }

    /// Reset the sliding-expiration countdown.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// A single message in a conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            role,
            content: content.into(),
            metadata,
            timestamp: Utc::now(),
        }
    }

    /// Project down to the role/content form sent to the language model.
    pub fn to_context(&self) -> ContextMessage {
        ContextMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Role/content pair in the shape the language model consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextMessage {
    pub role: MessageRole,
    pub content: String,
}

/// A conversation session with its ordered message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: String,
    pub messages: Vec<ConversationMessage>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub ttl_minutes: i64,
}

impl ConversationSession {
    pub fn new(ttl_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
            ttl_minutes,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() - self.last_activity > Duration::minutes(self.ttl_minutes)
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// A logged query. Immutable except for the favorite flag, favorite name,
/// and tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: String,
    pub session_id: String,
    pub user_id: Option<String>,
    pub question: String,
    pub sql: String,
    pub tables: Vec<String>,
    pub row_count: i64,
    pub execution_time_ms: f64,
    pub success: bool,
    pub error_message: Option<String>,
    pub widget_type: WidgetType,
    pub is_favorite: bool,
    pub favorite_name: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl QueryRecord {
    /// Content fingerprint used to suppress near-duplicate recent entries.
    pub fn dedup_hash(&self) -> u64 {
        dedup_hash(&self.sql)
    }
}

/// Hash of normalized SQL text (trimmed, lowercased).
pub fn dedup_hash(sql: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    sql.trim().to_lowercase().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
