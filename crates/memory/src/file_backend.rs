//! File-based chat store: persistent JSON-lines storage.
//!
//! Each line is one JSON-encoded [`ChatRecord`]. Chats are loaded into memory
//! on creation and the whole file is rewritten on every mutation, which keeps
//! reads fast and writes durable.
//!
//! Storage location: `~/.cosmocat/chats.jsonl`

use async_trait::async_trait;
use cosmocat_core::error::StoreError;
use cosmocat_core::store::{ChatStore, ChatSummary, RetentionPolicy};
use cosmocat_core::turn::{ConversationId, Turn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::record::{ChatRecord, summaries};

pub struct FileChatStore {
    path: PathBuf,
    retention: RetentionPolicy,
    chats: Arc<RwLock<Vec<ChatRecord>>>,
}

impl FileChatStore {
    /// Open a store at `path`.
    ///
    /// An existing file is loaded; a missing one means an empty store (the
    /// file is created on first write).
    pub fn new(path: PathBuf, retention: RetentionPolicy) -> Self {
        let chats = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = chats.len(), "File chat store loaded");
        Self {
            path,
            retention,
            chats: Arc::new(RwLock::new(chats)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<ChatRecord> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<ChatRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted chat record");
                    None
                }
            })
            .collect()
    }

    /// Write every chat to disk. Called with the write lock held so
    /// concurrent mutations cannot interleave their flushes.
    fn flush(&self, chats: &[ChatRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Storage(format!("Failed to create chat directory: {e}"))
                })?;
            }
        }

        let mut content = String::new();
        for record in chats {
            let line = serde_json::to_string(record)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| StoreError::Storage(format!("Failed to write chat file: {e}")))
    }

    async fn update(
        &self,
        chat: &ConversationId,
        apply: impl FnOnce(&mut ChatRecord),
    ) -> Result<(), StoreError> {
        let mut chats = self.chats.write().await;
        let record = chats
            .iter_mut()
            .find(|r| &r.id == chat)
            .ok_or_else(|| StoreError::NotFound(chat.to_string()))?;
        apply(record);
        self.flush(&chats)
    }
}

#[async_trait]
impl ChatStore for FileChatStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn create_chat(&self) -> Result<ConversationId, StoreError> {
        let id = ConversationId::new();
        let mut chats = self.chats.write().await;
        chats.push(ChatRecord::new(id.clone()));
        self.flush(&chats)?;
        Ok(id)
    }

    async fn load_history(&self, chat: &ConversationId) -> Result<Vec<Turn>, StoreError> {
        let chats = self.chats.read().await;
        Ok(chats
            .iter()
            .find(|r| &r.id == chat)
            .map(|r| r.history.clone())
            .unwrap_or_default())
    }

    async fn append_turn(&self, chat: &ConversationId, turn: Turn) -> Result<(), StoreError> {
        let retention = self.retention;
        self.update(chat, |record| record.push(turn, &retention))
            .await
    }

    async fn clear_history(&self, chat: &ConversationId) -> Result<(), StoreError> {
        self.update(chat, ChatRecord::clear).await
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, StoreError> {
        Ok(summaries(self.chats.read().await.iter()))
    }

    async fn title(&self, chat: &ConversationId) -> Result<Option<String>, StoreError> {
        let chats = self.chats.read().await;
        Ok(chats
            .iter()
            .find(|r| &r.id == chat)
            .and_then(|r| r.title.clone()))
    }

    async fn set_title(&self, chat: &ConversationId, title: &str) -> Result<(), StoreError> {
        self.update(chat, |record| record.set_title(title)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn temp_path() -> PathBuf {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);
        path
    }

    #[tokio::test]
    async fn history_survives_reload() {
        let path = temp_path();

        let store = FileChatStore::new(path.clone(), RetentionPolicy::default());
        let chat = store.create_chat().await.unwrap();
        store.append_turn(&chat, Turn::user("Привет!")).await.unwrap();
        store.set_title(&chat, "Приветствие 🐾").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Привет!"));

        let reloaded = FileChatStore::new(path, RetentionPolicy::default());
        assert_eq!(
            reloaded.load_history(&chat).await.unwrap(),
            vec![Turn::user("Привет!")]
        );
        assert_eq!(
            reloaded.title(&chat).await.unwrap().as_deref(),
            Some("Приветствие 🐾")
        );
    }

    #[tokio::test]
    async fn clear_persists() {
        let path = temp_path();

        let store = FileChatStore::new(path.clone(), RetentionPolicy::default());
        let chat = store.create_chat().await.unwrap();
        store.append_turn(&chat, Turn::user("one")).await.unwrap();
        store.clear_history(&chat).await.unwrap();

        let reloaded = FileChatStore::new(path, RetentionPolicy::default());
        assert!(reloaded.load_history(&chat).await.unwrap().is_empty());
        assert_eq!(reloaded.list_chats().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("chats.jsonl");

        let store = FileChatStore::new(path.clone(), RetentionPolicy::default());
        store.create_chat().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn handles_missing_file_gracefully() {
        let dir = TempDir::new().unwrap();
        let store = FileChatStore::new(dir.path().join("none.jsonl"), RetentionPolicy::default());
        assert!(store.list_chats().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn skips_corrupted_lines() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            r#"{{"id":"aaaa","history":[{{"role":"user","content":"hi"}}],"created_at":"2026-01-01T00:00:00Z","updated_at":"2026-01-01T00:00:00Z"}}"#
        )
        .unwrap();
        writeln!(tmp, "this is not json").unwrap();
        writeln!(
            tmp,
            r#"{{"id":"bbbb","title":"Кошачий чат","created_at":"2026-01-02T00:00:00Z","updated_at":"2026-01-02T00:00:00Z"}}"#
        )
        .unwrap();

        let store = FileChatStore::new(tmp.path().to_path_buf(), RetentionPolicy::default());
        let chats = store.list_chats().await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].id, ConversationId::from("bbbb"));
        assert_eq!(
            store
                .load_history(&ConversationId::from("aaaa"))
                .await
                .unwrap(),
            vec![Turn::user("hi")]
        );
    }

    #[tokio::test]
    async fn bad_turn_does_not_drop_its_chat() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            r#"{{"id":"aaaa","history":[{{"role":"user","content":"hi"}},{{"role":null,"content":"x"}}],"created_at":"2026-01-01T00:00:00Z","updated_at":"2026-01-01T00:00:00Z"}}"#
        )
        .unwrap();

        let store = FileChatStore::new(tmp.path().to_path_buf(), RetentionPolicy::default());
        let other = store.create_chat().await.unwrap();
        store.append_turn(&other, Turn::user("Мур")).await.unwrap();

        let reloaded = FileChatStore::new(tmp.path().to_path_buf(), RetentionPolicy::default());
        assert_eq!(reloaded.list_chats().await.unwrap().len(), 2);
        assert_eq!(
            reloaded
                .load_history(&ConversationId::from("aaaa"))
                .await
                .unwrap(),
            vec![Turn::user("hi")]
        );
    }

    #[tokio::test]
    async fn set_title_on_unknown_chat_fails() {
        let store = FileChatStore::new(temp_path(), RetentionPolicy::default());
        let err = store
            .set_title(&ConversationId::from("missing"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
