//! `cosmocat reply`: one-shot reply to a single user message.

use cosmocat_core::turn::Turn;
use tracing::debug;

use super::{build_assistant, load_config};

pub async fn run(message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let assistant = build_assistant(&config);

    let history = [Turn::user(message)];
    let outcome = assistant.reply_outcome(&history).await;
    if let Some(reason) = outcome.fallback {
        debug!(reason = reason.as_str(), "Reply came from a fallback");
    }
    println!("{}", outcome.text);
    Ok(())
}
