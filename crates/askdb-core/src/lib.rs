//! askdb-core: session, conversation, and query-history engine
//!
//! This crate is the stateful core of a natural-language-to-SQL service:
//! authenticated sessions with sliding TTL expiry, per-conversation context
//! windows, a deduplicated query history with favorites straddling an
//! in-memory cache and a durable SQLite log, and the analytics views
//! derived from that log.

pub mod analytics;
pub mod config;
pub mod conversations;
pub mod db;
pub mod error;
pub mod history;
pub mod models;
pub mod providers;
pub mod schema;
pub mod service;
pub mod sessions;
pub mod sweeper;

pub use config::Config;
pub use db::Database;
pub use error::Error;
pub use error::Result;
pub use service::Service;

/// Application name used for config directories and paths.
pub const APP_NAME: &str = "askdb";
