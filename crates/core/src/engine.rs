//! Generator trait: the abstraction over the text generation backend.
//!
//! The pipeline never talks to a model directly. It asks a [`Generator`] to
//! load (once, sticky) and then to continue a [`Prompt`] under a
//! [`GenerationConfig`]. Implementations: the Candle-backed local engine, a
//! disabled engine, and scripted mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Sampling parameters for one call-site (reply or title).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Upper bound on newly generated tokens.
    pub max_new_tokens: usize,

    /// Softmax temperature; `0.0` means greedy decoding.
    pub temperature: f64,

    /// Nucleus sampling mass.
    pub top_p: f64,

    /// Candidates kept before nucleus filtering.
    pub top_k: usize,

    /// Logit penalty for recently seen tokens (`1.0` disables it).
    pub repetition_penalty: f32,

    /// Forbid repeating any n-gram of this size (`0` disables it).
    pub no_repeat_ngram_size: usize,
}

impl GenerationConfig {
    /// Profile used for chat replies.
    pub fn reply() -> Self {
        Self {
            max_new_tokens: 80,
            temperature: 0.7,
            top_p: 0.95,
            top_k: 50,
            repetition_penalty: 1.2,
            no_repeat_ngram_size: 3,
        }
    }

    /// Profile used for chat titles: shorter and a little cooler.
    pub fn title() -> Self {
        Self {
            max_new_tokens: 16,
            temperature: 0.5,
            top_p: 0.9,
            top_k: 40,
            repetition_penalty: 1.2,
            no_repeat_ngram_size: 2,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::reply()
    }
}

/// The full text handed to the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prompt(String);

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text the model produced beyond the prompt. Never contains the prompt echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCompletion {
    pub text: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl RawCompletion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }
}

/// Result of the one-time model initialization.
///
/// `Unavailable` is sticky: once reported, it is reported for the rest of the
/// process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Ready,
    Unavailable { reason: String },
}

impl Availability {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// The core Generator trait.
#[async_trait]
pub trait Generator: Send + Sync {
    /// A human-readable name (e.g. "local", "disabled").
    fn name(&self) -> &str;

    /// Initialize the backend if it has not been initialized yet.
    ///
    /// Idempotent. Concurrent first callers wait for a single initialization
    /// and all observe its outcome.
    async fn load(&self) -> Availability;

    /// Continue `prompt`, returning only the newly generated text.
    async fn generate(
        &self,
        prompt: &Prompt,
        config: &GenerationConfig,
    ) -> std::result::Result<RawCompletion, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_profile_is_shorter_than_reply() {
        let reply = GenerationConfig::reply();
        let title = GenerationConfig::title();
        assert!(title.max_new_tokens < reply.max_new_tokens);
        assert!(title.temperature < reply.temperature);
    }

    #[test]
    fn generation_config_toml_shape() {
        let json = serde_json::to_value(GenerationConfig::reply()).unwrap();
        assert_eq!(json["max_new_tokens"], 80);
        assert_eq!(json["no_repeat_ngram_size"], 3);
    }

    #[test]
    fn availability_ready_check() {
        assert!(Availability::Ready.is_ready());
        assert!(
            !Availability::Unavailable {
                reason: "no weights".into()
            }
            .is_ready()
        );
    }
}
