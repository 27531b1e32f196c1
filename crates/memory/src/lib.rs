//! Chat history stores for CosmoCat.

pub mod file_backend;
pub mod in_memory;
pub mod record;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileChatStore;
pub use in_memory::InMemoryChatStore;
pub use record::ChatRecord;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteChatStore;
