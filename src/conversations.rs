// Conversation log
//! Persisted user/bot exchanges, used as chat history and served by
//! `GET /api/conversations`.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::llm::ChatMessage;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: i64,
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Newest first.
    async fn recent(&self, limit: i64) -> Result<Vec<Conversation>, StoreError>;
    async fn save(&self, user_message: &str, bot_response: &str) -> Result<Conversation, StoreError>;
    fn backend(&self) -> &'static str;
}

/// Chronological user/assistant pairs from a newest-first slice.
pub fn to_history(recent: &[Conversation]) -> Vec<ChatMessage> {
    recent
        .iter()
        .rev()
        .flat_map(|c| {
            [
                ChatMessage::user(c.user_message.clone()),
                ChatMessage::assistant(c.bot_response.clone()),
            ]
        })
        .collect()
}

// ── Postgres ────────────────────────────────────────────────────────────────

pub struct PgConversationStore {
    db: PgPool,
}

impl PgConversationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn recent(&self, limit: i64) -> Result<Vec<Conversation>, StoreError> {
        let rows = sqlx::query_as::<_, Conversation>(
            "SELECT id, user_message, bot_response, timestamp FROM conversations \
             ORDER BY timestamp DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn save(&self, user_message: &str, bot_response: &str) -> Result<Conversation, StoreError> {
        let row = sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations (user_message, bot_response) VALUES ($1, $2) \
             RETURNING id, user_message, bot_response, timestamp",
        )
        .bind(user_message)
        .bind(bot_response)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

// ── In-memory ───────────────────────────────────────────────────────────────

/// Used when `DATABASE_URL` is unset, and in tests. Lost on restart.
#[derive(Default)]
pub struct MemoryConversationStore {
    rows: RwLock<Vec<Conversation>>,
    next_id: AtomicI64,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn recent(&self, limit: i64) -> Result<Vec<Conversation>, StoreError> {
        let rows = self.rows.read().await;
        let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(rows.iter().rev().take(take).cloned().collect())
    }

    async fn save(&self, user_message: &str, bot_response: &str) -> Result<Conversation, StoreError> {
        let conversation = Conversation {
            id: self.next_id.fetch_add(1, Ordering::Relaxed).max(1),
            user_message: user_message.to_string(),
            bot_response: bot_response.to_string(),
            timestamp: Utc::now(),
        };
        self.rows.write().await.push(conversation.clone());
        Ok(conversation)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
