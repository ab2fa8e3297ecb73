//! Per-conversation message logs with TTL and context windowing.

use crate::models::{ContextMessage, ConversationMessage, ConversationSession, MessageRole};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Default conversation lifetime: 60 minutes of inactivity.
pub const DEFAULT_CONVERSATION_TTL_MINUTES: i64 = 60;

/// Default number of trailing messages sent to the language model.
pub const DEFAULT_MAX_CONTEXT_MESSAGES: usize = 10;

/// Registry of conversation sessions. Independent TTL from auth sessions.
pub struct ConversationStore {
    sessions: Mutex<HashMap<String, ConversationSession>>,
    ttl_minutes: i64,
}

impl ConversationStore {
    pub fn new(ttl_minutes: i64) -> Self {
        tracing::info!(ttl_minutes, "conversation store initialized");
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl_minutes,
        }
    }

    /// Resume a live conversation or start a fresh one.
    ///
    /// A live id is touched and returned as-is; an expired or unknown id is
    /// discarded and a new conversation is allocated in its place.
    pub fn get_or_create(&self, id: Option<&str>) -> (String, ConversationSession) {
        let mut sessions = self.sessions.lock();

        if let Some(id) = id {
            match sessions.get_mut(id) {
                Some(session) if !session.is_expired() => {
                    session.touch();
                    return (id.to_string(), session.clone());
                }
                Some(_) => {
                    tracing::debug!(conversation = %short_id(id), "conversation expired, reissuing");
                    sessions.remove(id);
                }
                None => {}
            }
        }

        let session = ConversationSession::new(self.ttl_minutes);
        let new_id = session.id.clone();
        sessions.insert(new_id.clone(), session.clone());
        tracing::debug!(conversation = %short_id(&new_id), "conversation created");
        (new_id, session)
    }

    /// Append a message, auto-creating the conversation if missing.
    /// Messages are immutable once appended.
    pub fn append(
        &self,
        id: &str,
        role: MessageRole,
        content: &str,
        metadata: serde_json::Value,
    ) {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(id.to_string()).or_insert_with(|| {
            let mut fresh = ConversationSession::new(self.ttl_minutes);
            fresh.id = id.to_string();
            fresh
        });
        session
            .messages
            .push(ConversationMessage::new(role, content, metadata));
        session.touch();
    }

    /// The trailing window of messages in role/content form, optionally led
    /// by a synthetic system entry. Read-only: never touches the session.
    pub fn context(
        &self,
        id: &str,
        max_messages: usize,
        system_preamble: Option<&str>,
    ) -> Vec<ContextMessage> {
        let sessions = self.sessions.lock();

        let mut context = Vec::new();
        if let Some(preamble) = system_preamble {
            context.push(ContextMessage {
                role: MessageRole::System,
                content: preamble.to_string(),
            });
        }

        if let Some(session) = sessions.get(id) {
            let skip = session.messages.len().saturating_sub(max_messages);
            context.extend(session.messages[skip..].iter().map(ConversationMessage::to_context));
        }

        context
    }

    /// Full message log for a conversation.
    pub fn history(&self, id: &str) -> Vec<ConversationMessage> {
        self.sessions
            .lock()
            .get(id)
            .map(|session| session.messages.clone())
            .unwrap_or_default()
    }

    /// Empty the message log but keep the conversation's identity and
    /// created_at.
    pub fn clear(&self, id: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get_mut(id) {
            session.messages.clear();
            session.touch();
        }
    }

    /// Remove a conversation entirely. Returns false if absent.
    pub fn delete(&self, id: &str) -> bool {
        self.sessions.lock().remove(id).is_some()
    }

    /// Remove every expired conversation. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        before - sessions.len()
    }

    /// Snapshot of store occupancy.
    pub fn stats(&self) -> ConversationStats {
        let sessions = self.sessions.lock();
        let total_messages: usize = sessions.values().map(|s| s.messages.len()).sum();
        let active = sessions.values().filter(|s| !s.is_expired()).count();
        ConversationStats {
            total_sessions: sessions.len(),
            active_sessions: active,
            total_messages,
            ttl_minutes: self.ttl_minutes,
        }
    }

    /// Summary for one conversation, if it exists.
    pub fn summary(&self, id: &str) -> Option<ConversationSummary> {
        let sessions = self.sessions.lock();
        sessions.get(id).map(|session| ConversationSummary {
            id: session.id.clone(),
            message_count: session.messages.len(),
            created_at: session.created_at,
            last_activity: session.last_activity,
        })
    }
}

/// Conversation store occupancy snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConversationStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub total_messages: usize,
    pub ttl_minutes: i64,
}

/// Summary of a single conversation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
#[path = "conversations_tests.rs"]
mod tests;
