//! SQLite chat store.
//!
//! One `chats` table; the history column holds the whole turn list as a UTF-8
//! JSON blob (see [`encode_history`]). A record whose blob does not decode is
//! read back as an empty history.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use cosmocat_core::error::StoreError;
use cosmocat_core::store::{ChatStore, ChatSummary, RetentionPolicy};
use cosmocat_core::turn::{ConversationId, Turn, decode_history, encode_history};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteQueryResult, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct SqliteChatStore {
    pool: SqlitePool,
    retention: RetentionPolicy,
    // Read-modify-write of a history blob must not interleave.
    write_lock: Mutex<()>,
}

fn storage(e: sqlx::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

/// An UPDATE keyed by chat id that touched nothing means the chat is unknown.
fn require_row(result: SqliteQueryResult, chat: &ConversationId) -> Result<(), StoreError> {
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(chat.to_string()));
    }
    Ok(())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => at.with_timezone(&Utc),
        Err(e) => {
            warn!(error = %e, raw, "Unparseable chat timestamp");
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}

impl SqliteChatStore {
    /// Connect using an SQLite URL such as `sqlite://chats.db`.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (tests).
    pub async fn new(url: &str, retention: RetentionPolicy) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?;
        // Every connection to :memory: is its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        Self::connect(options, max_connections, retention).await
    }

    /// Open (or create) a database file, creating its directory if needed.
    pub async fn open(path: &Path, retention: RetentionPolicy) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Storage(format!("Failed to create chat directory: {e}"))
                })?;
            }
        }
        let options = SqliteConnectOptions::new().filename(path);
        let store = Self::connect(options, 4, retention).await?;
        info!("SQLite chat store initialized at {}", path.display());
        Ok(store)
    }

    async fn connect(
        options: SqliteConnectOptions,
        max_connections: u32,
        retention: RetentionPolicy,
    ) -> Result<Self, StoreError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        Self::from_pool(pool, retention).await
    }

    /// Wrap an existing pool, running migrations first.
    pub async fn from_pool(pool: SqlitePool, retention: RetentionPolicy) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            retention,
            write_lock: Mutex::new(()),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                id          TEXT PRIMARY KEY NOT NULL,
                title       TEXT,
                history     BLOB NOT NULL DEFAULT x'',
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("chats table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chats_updated_at ON chats(updated_at DESC)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("updated_at index: {e}")))?;

        Ok(())
    }

    fn summary(row: &SqliteRow) -> Result<ChatSummary, StoreError> {
        let id: String = row.try_get("id").map_err(storage)?;
        let title: Option<String> = row.try_get("title").map_err(storage)?;
        let history: Vec<u8> = row.try_get("history").map_err(storage)?;
        let updated_at: String = row.try_get("updated_at").map_err(storage)?;
        Ok(ChatSummary {
            id: ConversationId(id),
            title,
            turns: decode_history(&history).len(),
            updated_at: parse_timestamp(&updated_at),
        })
    }
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_chat(&self) -> Result<ConversationId, StoreError> {
        let id = ConversationId::new();
        let now = timestamp(Utc::now());
        let empty = encode_history(&[]).map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query(
            "INSERT INTO chats (id, title, history, created_at, updated_at) VALUES (?, NULL, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(empty)
        .bind(now.clone())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(id)
    }

    async fn load_history(&self, chat: &ConversationId) -> Result<Vec<Turn>, StoreError> {
        let row = sqlx::query("SELECT history FROM chats WHERE id = ?")
            .bind(chat.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(row) => {
                let blob: Vec<u8> = row.try_get("history").map_err(storage)?;
                Ok(decode_history(&blob))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn append_turn(&self, chat: &ConversationId, turn: Turn) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let row = sqlx::query("SELECT history FROM chats WHERE id = ?")
            .bind(chat.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| StoreError::NotFound(chat.to_string()))?;
        let blob: Vec<u8> = row.try_get("history").map_err(storage)?;

        let mut history = decode_history(&blob);
        history.push(turn);
        let history = self.retention.prune(&history);
        let blob =
            encode_history(&history).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let result = sqlx::query("UPDATE chats SET history = ?, updated_at = ? WHERE id = ?")
            .bind(blob)
            .bind(timestamp(Utc::now()))
            .bind(chat.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        require_row(result, chat)
    }

    async fn clear_history(&self, chat: &ConversationId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let empty = encode_history(&[]).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let result = sqlx::query("UPDATE chats SET history = ?, updated_at = ? WHERE id = ?")
            .bind(empty)
            .bind(timestamp(Utc::now()))
            .bind(chat.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        require_row(result, chat)
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, title, history, updated_at FROM chats ORDER BY updated_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.iter().map(Self::summary).collect()
    }

    async fn title(&self, chat: &ConversationId) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT title FROM chats WHERE id = ?")
            .bind(chat.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(row) => row.try_get("title").map_err(storage),
            None => Ok(None),
        }
    }

    async fn set_title(&self, chat: &ConversationId, title: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("UPDATE chats SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title.to_string())
            .bind(timestamp(Utc::now()))
            .bind(chat.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        require_row(result, chat)
    }
}
