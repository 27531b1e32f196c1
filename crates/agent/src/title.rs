//! Chat titles from the first user message.
//!
//! Same pipeline as replies with a different prompt template, a shorter and
//! cooler sampling profile and title sanitizing rules.

use cosmocat_core::engine::{GenerationConfig, Generator};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::context::PromptBuilder;
use crate::fallback::{FallbackPolicy, FallbackReason, PipelineOutcome};
use crate::generation::generate_within;
use crate::sanitizer::Sanitizer;
use crate::stats::PipelineStats;

pub struct TitleGenerator {
    generator: Arc<dyn Generator>,
    prompts: PromptBuilder,
    sanitizer: Sanitizer,
    config: GenerationConfig,
    deadline: Duration,
    fallback: Arc<FallbackPolicy>,
    stats: Arc<PipelineStats>,
}

impl TitleGenerator {
    pub fn new(
        generator: Arc<dyn Generator>,
        sanitizer: Sanitizer,
        config: GenerationConfig,
        deadline: Duration,
        fallback: Arc<FallbackPolicy>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            generator,
            prompts: PromptBuilder::new(),
            sanitizer,
            config,
            deadline,
            fallback,
            stats,
        }
    }

    /// Produce a title. Never fails; see [`PipelineOutcome::fallback`].
    pub async fn title_for(&self, first_message: &str) -> PipelineOutcome {
        if first_message.trim().is_empty() {
            debug!("Blank first message, using a stock title");
            return self.fallback.blank_title();
        }

        let prompt = self.prompts.title(first_message);
        let raw = match generate_within(
            self.generator.as_ref(),
            &prompt,
            &self.config,
            self.deadline,
        )
        .await
        {
            Ok(raw) => raw,
            Err(reason) => return self.fallback.title(reason),
        };

        let cleaned = self.sanitizer.clean(&raw.text);
        if cleaned.is_rejected() {
            return self.fallback.title(FallbackReason::LowQuality);
        }
        self.stats.record_title();
        PipelineOutcome::generated(cleaned.text)
    }
}
