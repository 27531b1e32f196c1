//! Chat store trait: the narrow contract with the persistence collaborator.
//!
//! The pipeline itself never touches storage. Callers load a history, ask for
//! a reply and persist the produced turn through this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::turn::{ConversationId, Role, Turn};

/// A listing entry for one chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: ConversationId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub turns: usize,

    pub updated_at: DateTime<Utc>,
}

/// How much history a store keeps per chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_user_turns: usize,
    pub max_assistant_turns: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_user_turns: 5,
            max_assistant_turns: 5,
        }
    }
}

impl RetentionPolicy {
    /// Keep the newest `max_user_turns` user turns and `max_assistant_turns`
    /// assistant turns, drop everything else, preserve chronological order.
    pub fn prune(&self, history: &[Turn]) -> Vec<Turn> {
        let mut picked = Vec::new();
        let mut users = 0;
        let mut assistants = 0;
        for turn in history.iter().rev() {
            match turn.role {
                Role::User if users < self.max_user_turns => {
                    users += 1;
                    picked.push(turn.clone());
                }
                Role::Assistant if assistants < self.max_assistant_turns => {
                    assistants += 1;
                    picked.push(turn.clone());
                }
                _ => {}
            }
            if users >= self.max_user_turns && assistants >= self.max_assistant_turns {
                break;
            }
        }
        picked.reverse();
        picked
    }
}

/// The core ChatStore trait.
///
/// Implementations: in-memory (tests, ephemeral sessions), JSONL file, SQLite.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "file", "in_memory").
    fn name(&self) -> &str;

    /// Create an empty chat and return its id.
    async fn create_chat(&self) -> std::result::Result<ConversationId, StoreError>;

    /// Full stored history, oldest first. Unknown chats yield an empty history.
    async fn load_history(
        &self,
        chat: &ConversationId,
    ) -> std::result::Result<Vec<Turn>, StoreError>;

    /// Append a turn; the stored history is pruned by the store's retention policy.
    async fn append_turn(
        &self,
        chat: &ConversationId,
        turn: Turn,
    ) -> std::result::Result<(), StoreError>;

    /// Forget every turn of a chat, keeping the chat itself.
    async fn clear_history(&self, chat: &ConversationId) -> std::result::Result<(), StoreError>;

    /// All chats, most recently updated first.
    async fn list_chats(&self) -> std::result::Result<Vec<ChatSummary>, StoreError>;

    /// Current title, if one was set.
    async fn title(
        &self,
        chat: &ConversationId,
    ) -> std::result::Result<Option<String>, StoreError>;

    /// Set or replace the chat title.
    async fn set_title(
        &self,
        chat: &ConversationId,
        title: &str,
    ) -> std::result::Result<(), StoreError>;
}
