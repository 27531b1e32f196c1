//! One bounded call into the engine, classified for the fallback policy.

use cosmocat_core::engine::{Availability, GenerationConfig, Generator, Prompt, RawCompletion};
use cosmocat_core::error::EngineError;
use std::time::Duration;
use tracing::{debug, warn};

use crate::fallback::FallbackReason;

/// Load (once) and generate, racing both against `deadline`.
///
/// On timeout the in-flight work is abandoned, not cancelled: a blocking
/// inference keeps running to completion on its own thread and its result is
/// dropped. An interrupted first load keeps going as well and is picked up by
/// the next call.
pub(crate) async fn generate_within(
    generator: &dyn Generator,
    prompt: &Prompt,
    config: &GenerationConfig,
    deadline: Duration,
) -> Result<RawCompletion, FallbackReason> {
    let call = async {
        if let Availability::Unavailable { reason } = generator.load().await {
            debug!(engine = generator.name(), %reason, "Engine unavailable");
            return Err(EngineError::Unavailable(reason));
        }
        generator.generate(prompt, config).await
    };

    let result = match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout(format!(
            "no completion within {:.1}s",
            deadline.as_secs_f32()
        ))),
    };

    match result {
        Ok(raw) => {
            debug!(
                prompt_tokens = raw.prompt_tokens,
                completion_tokens = raw.completion_tokens,
                "Completion received"
            );
            Ok(raw)
        }
        Err(EngineError::Unavailable(_)) => Err(FallbackReason::Unavailable),
        Err(e @ EngineError::Timeout(_)) => {
            warn!(engine = generator.name(), error = %e, "Generation timed out");
            Err(FallbackReason::Timeout)
        }
        Err(e) => {
            warn!(engine = generator.name(), error = %e, "Generation failed");
            Err(FallbackReason::Failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingGenerator, HangingGenerator, UnavailableGenerator};

    fn prompt() -> Prompt {
        Prompt::new("Пользователь: Привет!\nПомощник:")
    }

    #[tokio::test]
    async fn deadline_is_reported_as_timeout() {
        let result = generate_within(
            &HangingGenerator,
            &prompt(),
            &GenerationConfig::default(),
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(result.unwrap_err(), FallbackReason::Timeout);
    }

    #[tokio::test]
    async fn errors_map_to_their_fallback_reason() {
        let config = GenerationConfig::default();
        let deadline = Duration::from_secs(5);

        let failed = generate_within(&FailingGenerator, &prompt(), &config, deadline).await;
        assert_eq!(failed.unwrap_err(), FallbackReason::Failure);

        let engine = UnavailableGenerator::default();
        let down = generate_within(&engine, &prompt(), &config, deadline).await;
        assert_eq!(down.unwrap_err(), FallbackReason::Unavailable);
    }
}
