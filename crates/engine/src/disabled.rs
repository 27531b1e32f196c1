//! An engine that never loads.
//!
//! Used when the binary is built without local inference. The assistant still
//! answers, purely from its fallback policy.

use async_trait::async_trait;
use cosmocat_core::engine::{Availability, GenerationConfig, Generator, Prompt, RawCompletion};
use cosmocat_core::error::EngineError;

pub struct DisabledEngine {
    reason: String,
}

impl DisabledEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for DisabledEngine {
    fn default() -> Self {
        Self::new("built without the `local` feature")
    }
}

#[async_trait]
impl Generator for DisabledEngine {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn load(&self) -> Availability {
        Availability::Unavailable {
            reason: self.reason.clone(),
        }
    }

    async fn generate(
        &self,
        _prompt: &Prompt,
        _config: &GenerationConfig,
    ) -> std::result::Result<RawCompletion, EngineError> {
        Err(EngineError::Unavailable(self.reason.clone()))
    }
}
