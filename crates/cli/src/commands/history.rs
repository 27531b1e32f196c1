//! `cosmocat history`: inspect stored chats.

use cosmocat_core::turn::Role;

use super::{find_chat, load_config, open_store};

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = open_store(&config.store).await?;

    let chats = store.list_chats().await?;
    if chats.is_empty() {
        println!("  No chats yet. Run `cosmocat chat` to start one.");
        return Ok(());
    }

    println!("🐾 Chats ({})", store.name());
    println!("==========");
    for chat in &chats {
        println!(
            "  {}  {:>3} turns  {}  {}",
            chat.id,
            chat.turns,
            chat.updated_at.format("%Y-%m-%d %H:%M"),
            chat.title.as_deref().unwrap_or("(untitled)")
        );
    }
    Ok(())
}

pub async fn show(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = open_store(&config.store).await?;
    let chat = find_chat(store.as_ref(), id).await?;

    let title = store.title(&chat).await?;
    println!("🐾 {}", title.as_deref().unwrap_or("(untitled)"));
    println!();

    let history = store.load_history(&chat).await?;
    if history.is_empty() {
        println!("  (no turns)");
    }
    for turn in &history {
        let speaker = match turn.role {
            Role::User => "You",
            Role::Assistant => "КосмоКэт",
            Role::Other => "?",
        };
        println!("  {speaker} > {}", turn.content);
    }
    Ok(())
}

pub async fn clear(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = open_store(&config.store).await?;
    let chat = find_chat(store.as_ref(), id).await?;

    store.clear_history(&chat).await?;
    println!("🗑️  Cleared the history of chat {chat}.");
    Ok(())
}
