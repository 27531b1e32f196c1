//! The conversation turn pipeline, the heart of CosmoCat.
//!
//! For every user message:
//!
//! 1. **Select** a bounded window of the history (newest first, per-role caps)
//! 2. **Render** the persona preamble and the window into a prompt
//! 3. **Generate** a continuation under a deadline
//! 4. **Sanitize** it into a short, in-character reply
//! 5. **Fall back** to canned text whenever any of the above cannot deliver
//!
//! Titles go through the same steps with their own template and rules.

pub mod assistant;
pub mod context;
pub mod fallback;
mod generation;
pub mod sanitizer;
pub mod stats;
pub mod title;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assistant::Assistant;
pub use context::{ContextLimits, ContextSelector, PromptBuilder, PromptMode};
pub use fallback::{FallbackPolicy, FallbackReason, PipelineOutcome};
pub use sanitizer::{QualityIssue, SanitizedReply, Sanitizer, Stage};
pub use stats::{PipelineStats, StatsSnapshot};
pub use title::TitleGenerator;
