//! Subcommand implementations and the wiring they share.

pub mod chat;
pub mod doctor;
pub mod history;
pub mod onboard;
pub mod reply;
pub mod title;

use cosmocat_agent::Assistant;
use cosmocat_config::{AppConfig, StoreConfig};
use cosmocat_core::error::{Error, Result, StoreError};
use cosmocat_core::store::ChatStore;
use cosmocat_core::turn::ConversationId;
use cosmocat_memory::{FileChatStore, InMemoryChatStore, SqliteChatStore};
use std::sync::Arc;

pub(crate) fn load_config() -> Result<AppConfig> {
    AppConfig::load().map_err(|e| Error::Config {
        message: e.to_string(),
    })
}

/// Open the chat store named by `store.backend`.
pub(crate) async fn open_store(store: &StoreConfig) -> Result<Arc<dyn ChatStore>> {
    let retention = store.retention();
    let opened: Arc<dyn ChatStore> = match store.backend.as_str() {
        "file" => Arc::new(FileChatStore::new(store.path(), retention)),
        "memory" => Arc::new(InMemoryChatStore::with_retention(retention)),
        _ => Arc::new(SqliteChatStore::open(&store.path(), retention).await?),
    };
    tracing::debug!(backend = opened.name(), "Chat store opened");
    Ok(opened)
}

/// The assistant around whichever engine this binary was built with.
pub(crate) fn build_assistant(config: &AppConfig) -> Assistant {
    Assistant::new(cosmocat_engine::engine_from_config(&config.model), config)
}

/// Resolve a chat id typed by the user, failing if the store does not know it.
pub(crate) async fn find_chat(
    store: &dyn ChatStore,
    id: &str,
) -> std::result::Result<ConversationId, StoreError> {
    let wanted = ConversationId::from(id.trim());
    let known = store.list_chats().await?;
    if known.iter().any(|chat| chat.id == wanted) {
        Ok(wanted)
    } else {
        Err(StoreError::NotFound(wanted.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmocat_core::turn::Turn;

    #[tokio::test]
    async fn opens_each_backend() {
        let dir = tempfile::TempDir::new().unwrap();

        for backend in ["memory", "file", "sqlite"] {
            let config = StoreConfig {
                backend: backend.into(),
                path: Some(dir.path().join(format!("chats.{backend}"))),
                ..StoreConfig::default()
            };
            let store = open_store(&config).await.unwrap();
            let chat = store.create_chat().await.unwrap();
            store.append_turn(&chat, Turn::user("hi")).await.unwrap();
            assert_eq!(store.load_history(&chat).await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn unopenable_store_reports_a_store_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StoreConfig {
            backend: "sqlite".into(),
            path: Some(dir.path().to_path_buf()),
            ..StoreConfig::default()
        };
        assert!(matches!(open_store(&config).await, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn find_chat_rejects_unknown_ids() {
        let store = InMemoryChatStore::new();
        let chat = store.create_chat().await.unwrap();

        let found = find_chat(&store, &format!(" {chat} ")).await.unwrap();
        assert_eq!(found, chat);
        assert!(matches!(
            find_chat(&store, "nope").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
