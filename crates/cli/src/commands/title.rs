//! `cosmocat title`: print the title a chat would get for its first message.

use tracing::debug;

use super::{build_assistant, load_config};

pub async fn run(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let assistant = build_assistant(&config);

    let outcome = assistant.title_outcome(text).await;
    if let Some(reason) = outcome.fallback {
        debug!(reason = reason.as_str(), "Title came from a fallback");
    }
    println!("{}", outcome.text);
    Ok(())
}
