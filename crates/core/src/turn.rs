//! Turn and conversation identity types.
//!
//! A [`Turn`] is the unit the whole pipeline works with: the chat store hands
//! out an ordered `Vec<Turn>`, the context selector picks a window of them and
//! the prompt builder renders them. On the wire a turn is exactly
//! `{"role": "...", "content": "..."}`.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Unique identifier for a chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// A fresh 16-hex-char identifier.
    pub fn new() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(16);
        Self(id)
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who spoke a turn.
///
/// A record without a role is treated as a user turn. Any role string we do
/// not know (`system`, `tool`, typos) lands in [`Role::Other`], which the
/// context selector drops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
    #[serde(other)]
    Other,
}

/// A single message in a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(default)]
    pub role: Role,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Length of the content in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Encode a history as UTF-8 JSON (non-ASCII characters are written as-is).
pub fn encode_history(turns: &[Turn]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(turns)
}

/// Decode a stored history blob.
///
/// Empty or malformed input yields an empty history rather than an error,
/// and a single malformed turn is dropped without losing its neighbours:
/// a broken record must not take the chat down with it.
pub fn decode_history(blob: &[u8]) -> Vec<Turn> {
    if blob.is_empty() {
        return Vec::new();
    }
    match serde_json::from_slice::<serde_json::Value>(blob) {
        Ok(value) => turns_from_value(value),
        Err(e) => {
            tracing::warn!(error = %e, "Discarding malformed chat history");
            Vec::new()
        }
    }
}

/// Serde adapter for history fields embedded in larger records.
///
/// Same tolerance as [`decode_history`]: bad elements are skipped, a
/// non-list value becomes an empty history.
pub fn deserialize_history<'de, D>(deserializer: D) -> Result<Vec<Turn>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(turns_from_value(serde_json::Value::deserialize(deserializer)?))
}

fn turns_from_value(value: serde_json::Value) -> Vec<Turn> {
    let serde_json::Value::Array(items) = value else {
        if !value.is_null() {
            tracing::warn!("Discarding chat history that is not a list");
        }
        return Vec::new();
    };

    let total = items.len();
    let turns: Vec<Turn> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if turns.len() < total {
        tracing::warn!(dropped = total - turns.len(), "Skipped malformed turns");
    }
    turns
}
