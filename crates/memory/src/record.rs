//! The in-process representation of one chat, shared by the in-memory and
//! JSONL stores.

use chrono::{DateTime, Utc};
use cosmocat_core::store::{ChatSummary, RetentionPolicy};
use cosmocat_core::turn::{ConversationId, Turn, deserialize_history};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: ConversationId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "deserialize_history")]
    pub history: Vec<Turn>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatRecord {
    pub fn new(id: ConversationId) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn and prune the history to `retention`.
    pub fn push(&mut self, turn: Turn, retention: &RetentionPolicy) {
        self.history.push(turn);
        self.history = retention.prune(&self.history);
        self.touch();
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.touch();
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
        self.touch();
    }

    pub fn summary(&self) -> ChatSummary {
        ChatSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            turns: self.history.len(),
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        // updated_at strictly increases for a chat, even within one clock tick.
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + chrono::Duration::microseconds(1)
        };
    }
}

/// Summaries of `records`, most recently updated first.
pub(crate) fn summaries<'a>(records: impl Iterator<Item = &'a ChatRecord>) -> Vec<ChatSummary> {
    let mut out: Vec<ChatSummary> = records.map(ChatRecord::summary).collect();
    out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    out
}
