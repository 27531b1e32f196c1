//! The assistant service: the public face of the conversation pipeline.
//!
//! ```text
//! history ─▶ ContextSelector ─▶ PromptBuilder ─▶ Generator ─▶ Sanitizer ─▶ reply
//!                                                   │              │
//!                                                   └──▶ FallbackPolicy ◀──┘
//! ```
//!
//! [`Assistant`] is constructed once and shared (it is `Send + Sync`); the
//! engine inside it loads lazily on first use. `reply_to` and `title_for` are
//! total: every path, including a panic somewhere below, ends in text.

use cosmocat_config::AppConfig;
use cosmocat_core::engine::{Availability, GenerationConfig, Generator};
use cosmocat_core::error::StoreError;
use cosmocat_core::store::ChatStore;
use cosmocat_core::turn::{ConversationId, Turn};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::context::{ContextLimits, ContextSelector, PromptBuilder};
use crate::fallback::{FallbackPolicy, FallbackReason, PipelineOutcome};
use crate::generation::generate_within;
use crate::sanitizer::Sanitizer;
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::title::TitleGenerator;

pub struct Assistant {
    generator: Arc<dyn Generator>,
    selector: ContextSelector,
    prompts: PromptBuilder,
    sanitizer: Sanitizer,
    reply_config: GenerationConfig,
    deadline: Duration,
    titles: TitleGenerator,
    fallback: Arc<FallbackPolicy>,
    stats: Arc<PipelineStats>,
}

impl Assistant {
    /// Wire the pipeline around `generator` using the thresholds in `config`.
    pub fn new(generator: Arc<dyn Generator>, config: &AppConfig) -> Self {
        let stats = Arc::new(PipelineStats::new());
        let fallback = Arc::new(FallbackPolicy::new(
            config.sanitizer.reply_max_chars,
            config.sanitizer.title_max_chars,
            Arc::clone(&stats),
        ));
        let deadline = config.generation.timeout();
        let titles = TitleGenerator::new(
            Arc::clone(&generator),
            Sanitizer::title(&config.sanitizer),
            config.generation.title.clone(),
            deadline,
            Arc::clone(&fallback),
            Arc::clone(&stats),
        );

        Self {
            generator,
            selector: ContextSelector::new(ContextLimits::from_config(&config.context)),
            prompts: PromptBuilder::new(),
            sanitizer: Sanitizer::reply(&config.sanitizer),
            reply_config: config.generation.reply.clone(),
            deadline,
            titles,
            fallback,
            stats,
        }
    }

    pub fn engine_name(&self) -> &str {
        self.generator.name()
    }

    /// Initialize the engine now instead of on the first message.
    pub async fn warm_up(&self) -> Availability {
        let availability = self.generator.load().await;
        match &availability {
            Availability::Ready => info!(engine = self.generator.name(), "Engine ready"),
            Availability::Unavailable { reason } => {
                warn!(engine = self.generator.name(), %reason, "Engine unavailable, replies will use fallbacks")
            }
        }
        availability
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Reply to the conversation so far.
    pub async fn reply_to(&self, history: &[Turn]) -> String {
        self.reply_outcome(history).await.text
    }

    /// Like [`reply_to`](Self::reply_to), also telling whether a fallback was used.
    pub async fn reply_outcome(&self, history: &[Turn]) -> PipelineOutcome {
        match AssertUnwindSafe(self.generate_reply(history))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("Reply pipeline panicked");
                self.fallback.reply(FallbackReason::Failure)
            }
        }
    }

    /// A short label for a chat, from its first user message.
    pub async fn title_for(&self, first_message: &str) -> String {
        self.title_outcome(first_message).await.text
    }

    pub async fn title_outcome(&self, first_message: &str) -> PipelineOutcome {
        match AssertUnwindSafe(self.titles.title_for(first_message))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("Title pipeline panicked");
                self.fallback.title(FallbackReason::Failure)
            }
        }
    }

    /// Record a user message in `chat`, reply to it and record the reply.
    ///
    /// A chat without a title gets one from this message. Only store
    /// failures are errors; generation problems end in fallback text.
    pub async fn handle_message(
        &self,
        store: &dyn ChatStore,
        chat: &ConversationId,
        text: &str,
    ) -> Result<String, StoreError> {
        store.append_turn(chat, Turn::user(text)).await?;
        let history = store.load_history(chat).await?;

        let reply = self.reply_to(&history).await;
        store.append_turn(chat, Turn::assistant(reply.clone())).await?;

        if store.title(chat).await?.is_none() {
            let title = self.title_for(text).await;
            debug!(chat = %chat, %title, "Chat titled");
            store.set_title(chat, &title).await?;
        }

        Ok(reply)
    }

    async fn generate_reply(&self, history: &[Turn]) -> PipelineOutcome {
        let window = self.selector.select(history);
        debug!(history = history.len(), window = window.len(), "Context selected");

        let prompt = self.prompts.reply(&window);
        let raw = match generate_within(
            self.generator.as_ref(),
            &prompt,
            &self.reply_config,
            self.deadline,
        )
        .await
        {
            Ok(raw) => raw,
            Err(reason) => return self.fallback.reply(reason),
        };

        let cleaned = self.sanitizer.clean(&raw.text);
        if let Some(issue) = cleaned.rejected {
            debug!(%issue, raw_len = raw.text.len(), "Reply discarded");
            return self.fallback.reply(FallbackReason::LowQuality);
        }
        self.stats.record_reply();
        PipelineOutcome::generated(cleaned.text)
    }
}
