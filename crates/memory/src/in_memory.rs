//! In-memory chat store, for tests and ephemeral sessions.

use async_trait::async_trait;
use cosmocat_core::error::StoreError;
use cosmocat_core::store::{ChatStore, ChatSummary, RetentionPolicy};
use cosmocat_core::turn::{ConversationId, Turn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::record::{ChatRecord, summaries};

/// Chats kept in a map for the lifetime of the process.
pub struct InMemoryChatStore {
    chats: Arc<RwLock<HashMap<ConversationId, ChatRecord>>>,
    retention: RetentionPolicy,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::with_retention(RetentionPolicy::default())
    }

    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            chats: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }
}

impl Default for InMemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(chat: &ConversationId) -> StoreError {
    StoreError::NotFound(chat.to_string())
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_chat(&self) -> Result<ConversationId, StoreError> {
        let id = ConversationId::new();
        self.chats
            .write()
            .await
            .insert(id.clone(), ChatRecord::new(id.clone()));
        Ok(id)
    }

    async fn load_history(&self, chat: &ConversationId) -> Result<Vec<Turn>, StoreError> {
        Ok(self
            .chats
            .read()
            .await
            .get(chat)
            .map(|r| r.history.clone())
            .unwrap_or_default())
    }

    async fn append_turn(&self, chat: &ConversationId, turn: Turn) -> Result<(), StoreError> {
        let mut chats = self.chats.write().await;
        let record = chats.get_mut(chat).ok_or_else(|| not_found(chat))?;
        record.push(turn, &self.retention);
        Ok(())
    }

    async fn clear_history(&self, chat: &ConversationId) -> Result<(), StoreError> {
        let mut chats = self.chats.write().await;
        chats.get_mut(chat).ok_or_else(|| not_found(chat))?.clear();
        Ok(())
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, StoreError> {
        Ok(summaries(self.chats.read().await.values()))
    }

    async fn title(&self, chat: &ConversationId) -> Result<Option<String>, StoreError> {
        Ok(self
            .chats
            .read()
            .await
            .get(chat)
            .and_then(|r| r.title.clone()))
    }

    async fn set_title(&self, chat: &ConversationId, title: &str) -> Result<(), StoreError> {
        let mut chats = self.chats.write().await;
        chats.get_mut(chat).ok_or_else(|| not_found(chat))?.set_title(title);
        Ok(())
    }
}
