//! Collaborator interfaces consumed by this core.
//!
//! The language-model and database backends live outside this crate; only
//! their trait seams and output shapes are defined here. Implementations
//! must be safe for concurrent use so one instance serves every request.

use crate::error::Error;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Intent classification for a natural-language question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub intent: String,
    pub confidence: f64,
    pub reasoning: String,
}

/// SQL generated from a question, with the model's explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedSql {
    pub sql: String,
    pub explanation: String,
}

/// Result set returned by the database backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Column description within a table schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Schema of one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Language-model backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn determine_intent(&self, question: &str, schema: &str) -> Result<Intent>;
    async fn generate_sql(&self, question: &str, schema: &str) -> Result<GeneratedSql>;
    async fn generate_chat_response(&self, question: &str, schema: &str) -> Result<String>;
}

/// Database backend.
#[async_trait]
pub trait DbProvider: Send + Sync {
    async fn execute_query(&self, sql: &str) -> Result<QueryOutput>;
    async fn get_tables(&self) -> Result<Vec<String>>;
    async fn get_table_schema(&self, name: &str) -> Result<TableSchema>;
}

/// Known language-model backends, resolved statically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    Anthropic,
    Gemini,
    Vertexai,
}

impl FromStr for LlmProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "anthropic" => Ok(LlmProviderKind::Anthropic),
            "gemini" => Ok(LlmProviderKind::Gemini),
            "vertexai" => Ok(LlmProviderKind::Vertexai),
            other => Err(Error::Provider(format!("unknown LLM provider '{other}'"))),
        }
    }
}

/// Known database backends, resolved statically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbProviderKind {
    #[default]
    Postgresql,
    Mysql,
    Trino,
}

impl FromStr for DbProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DbProviderKind::Postgresql),
            "mysql" => Ok(DbProviderKind::Mysql),
            "trino" => Ok(DbProviderKind::Trino),
            other => Err(Error::Provider(format!("unknown database provider '{other}'"))),
        }
    }
}
