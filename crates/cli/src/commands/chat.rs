//! `cosmocat chat`: interactive chat over the configured store.

use cosmocat_agent::StatsSnapshot;
use cosmocat_core::engine::Availability;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{build_assistant, find_chat, load_config, open_store};

pub async fn run(chat_id: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = open_store(&config.store).await?;
    let assistant = build_assistant(&config);

    let chat = match chat_id {
        Some(id) => find_chat(store.as_ref(), &id).await?,
        None => store.create_chat().await?,
    };

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        КосмоКэт 🐾 Interactive Chat          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Chat:    {chat}");
    println!("  Model:   {}", config.model.name);
    println!("  Store:   {}", store.name());

    eprint!("  Waking the cat up...");
    let availability = assistant.warm_up().await;
    eprint!("\r                      \r");
    match availability {
        Availability::Ready => println!("  Engine:  {} (ready)", assistant.engine_name()),
        Availability::Unavailable { reason } => {
            println!("  Engine:  {} (unavailable: {reason})", assistant.engine_name());
            println!("           Replies will come from the stock phrases.");
        }
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  Commands: /stats, /clear, exit");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "exit" | "quit" => break,
            "/stats" => print_stats(&assistant.stats())?,
            "/clear" => {
                store.clear_history(&chat).await?;
                println!("  History cleared.\n");
            }
            text => {
                eprint!("  ...");
                let result = assistant.handle_message(store.as_ref(), &chat, text).await;
                eprint!("\r     \r");
                match result {
                    Ok(reply) => {
                        println!();
                        println!("  КосмоКэт > {reply}");
                        println!();
                    }
                    Err(e) => {
                        eprintln!("  [Store Error] {e}");
                        println!();
                    }
                }
            }
        }
        prompt()?;
    }

    println!();
    println!("  Пока! 🐾");
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_stats(stats: &StatsSnapshot) -> cosmocat_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(stats)?);
    println!("  Fallbacks so far: {}", stats.fallbacks());
    println!();
    Ok(())
}
