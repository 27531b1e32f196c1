//! Scripted generators for pipeline tests.

use async_trait::async_trait;
use cosmocat_core::engine::{Availability, GenerationConfig, Generator, Prompt, RawCompletion};
use cosmocat_core::error::EngineError;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns scripted completions in order, repeating the last one.
///
/// Records every prompt it was given.
pub struct ScriptedGenerator {
    responses: Vec<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: responses.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn single(text: &str) -> Self {
        Self::new(&[text])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn load(&self) -> Availability {
        Availability::Ready
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        _config: &GenerationConfig,
    ) -> Result<RawCompletion, EngineError> {
        self.prompts.lock().unwrap().push(prompt.as_str().to_string());
        let i = self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self
            .responses
            .get(i)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default();
        Ok(RawCompletion::text(text))
    }
}

/// Loads fine, then fails every generation.
pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn load(&self) -> Availability {
        Availability::Ready
    }

    async fn generate(
        &self,
        _prompt: &Prompt,
        _config: &GenerationConfig,
    ) -> Result<RawCompletion, EngineError> {
        Err(EngineError::Inference("out of memory".into()))
    }
}

/// Never finishes generating.
pub struct HangingGenerator;

#[async_trait]
impl Generator for HangingGenerator {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn load(&self) -> Availability {
        Availability::Ready
    }

    async fn generate(
        &self,
        _prompt: &Prompt,
        _config: &GenerationConfig,
    ) -> Result<RawCompletion, EngineError> {
        futures::future::pending().await
    }
}

/// Always unavailable; counts how often it was asked to load.
#[derive(Default)]
pub struct UnavailableGenerator {
    pub loads: AtomicUsize,
    pub generates: AtomicUsize,
}

#[async_trait]
impl Generator for UnavailableGenerator {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn load(&self) -> Availability {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Availability::Unavailable {
            reason: "weights missing".into(),
        }
    }

    async fn generate(
        &self,
        _prompt: &Prompt,
        _config: &GenerationConfig,
    ) -> Result<RawCompletion, EngineError> {
        self.generates.fetch_add(1, Ordering::SeqCst);
        Err(EngineError::Unavailable("weights missing".into()))
    }
}

/// Panics inside `generate`.
pub struct PanickingGenerator;

#[async_trait]
impl Generator for PanickingGenerator {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn load(&self) -> Availability {
        Availability::Ready
    }

    async fn generate(
        &self,
        _prompt: &Prompt,
        _config: &GenerationConfig,
    ) -> Result<RawCompletion, EngineError> {
        panic!("tensor shape mismatch")
    }
}
