//! CosmoCat CLI, the main entry point.
//!
//! Commands:
//! - `onboard`  Write a default config file
//! - `chat`     Interactive chat backed by the configured store
//! - `reply`    One-shot reply to a single message
//! - `title`    Title for a first message
//! - `history`  List, show or clear stored chats
//! - `doctor`   Diagnose config, model cache and engine

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "cosmocat",
    about = "CosmoCat, the space cat who chats on a tiny local model",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Onboard {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Chat interactively
    Chat {
        /// Continue an existing chat instead of starting a new one
        #[arg(long = "chat")]
        chat_id: Option<String>,
    },

    /// Reply to a single message without storing anything
    Reply {
        #[arg(short, long)]
        message: String,
    },

    /// Generate a chat title for a first message
    Title { text: String },

    /// Inspect stored chats
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Diagnose configuration and model setup
    Doctor {
        /// Also try to load the model
        #[arg(long)]
        load: bool,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List chats, most recent first
    List,
    /// Print the stored turns of a chat
    Show { id: String },
    /// Forget the turns of a chat
    Clear { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard { force } => commands::onboard::run(force).await?,
        Commands::Chat { chat_id } => commands::chat::run(chat_id).await?,
        Commands::Reply { message } => commands::reply::run(&message).await?,
        Commands::Title { text } => commands::title::run(&text).await?,
        Commands::History { action } => match action {
            HistoryAction::List => commands::history::list().await?,
            HistoryAction::Show { id } => commands::history::show(&id).await?,
            HistoryAction::Clear { id } => commands::history::clear(&id).await?,
        },
        Commands::Doctor { load } => commands::doctor::run(load).await?,
    }

    Ok(())
}
