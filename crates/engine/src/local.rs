//! Local inference engine, runs GGUF-quantized models on the CPU.
//!
//! Uses [Candle](https://github.com/huggingface/candle) for the forward pass
//! and `tokenizers` for text <-> ids. The model is loaded once per process
//! through [`LoadOnce`]; a failed load leaves the engine unavailable for good.
//!
//! ```bash
//! cosmocat chat                                  # default preset (tinyllama)
//! COSMOCAT_MODEL=smollm:360m cosmocat chat
//! COSMOCAT_MODEL=/models/cat.gguf cosmocat chat  # tokenizer.json beside it
//! ```

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::quantized_llama as qlm;
use cosmocat_core::engine::{Availability, GenerationConfig, Generator, Prompt, RawCompletion};
use cosmocat_core::error::EngineError;
use std::sync::atomic::{AtomicU64, Ordering};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::artifacts::{self, ModelArtifacts, ModelSource};
use crate::lifecycle::{EngineState, LoadOnce};
use crate::sampling::{
    REPEAT_LAST_N, banned_ngram_tokens, mask_logits, repeat_window, truncate_prompt_tokens,
};
use crate::settings::EngineSettings;

/// A [`Generator`] backed by a quantized Llama-family model.
pub struct LocalEngine {
    settings: EngineSettings,
    model: LoadOnce<LocalModel>,
    calls: AtomicU64,
}

/// Loaded weights and tokenizer. Read-only after construction.
struct LocalModel {
    weights: qlm::ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_id: Option<u32>,
}

impl LocalEngine {
    /// Create the engine. Nothing is read from disk until the first `load`.
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            model: LoadOnce::new(),
            calls: AtomicU64::new(0),
        }
    }

    async fn ready_model(&self) -> EngineState<LocalModel> {
        let settings = self.settings.clone();
        self.model
            .get_or_load(move || LocalModel::load(&settings))
            .await
    }
}

impl LocalModel {
    /// Locate artifacts (cache first, download as a last resort) and read them.
    fn load(settings: &EngineSettings) -> Result<Self, EngineError> {
        let source = ModelSource::parse(&settings.model)?;
        info!(model = %settings.model, cache = %settings.cache_dir.display(), "Loading local model");

        match artifacts::find_cached(&source, &settings.cache_dir) {
            Some(found) => match Self::from_artifacts(&found) {
                Ok(model) => Ok(model),
                Err(e) => {
                    warn!(error = %e, path = %found.weights.display(), "Cached model artifacts are unusable");
                    Self::download_and_read(&source, settings).map_err(|download_err| {
                        warn!(error = %download_err, "Re-download failed");
                        e
                    })
                }
            },
            None => Self::download_and_read(&source, settings),
        }
    }

    fn download_and_read(
        source: &ModelSource,
        settings: &EngineSettings,
    ) -> Result<Self, EngineError> {
        let preset = match source {
            ModelSource::Preset(preset) => preset,
            ModelSource::GgufFile(path) => {
                return Err(EngineError::Artifacts(format!(
                    "'{}' or a tokenizer.json beside it is missing",
                    path.display()
                )));
            }
        };
        if !settings.allow_download {
            return Err(EngineError::Artifacts(format!(
                "'{}' is not cached in {} and downloads are disabled",
                preset.alias,
                settings.cache_dir.display()
            )));
        }
        std::fs::create_dir_all(&settings.cache_dir).map_err(|e| {
            EngineError::Artifacts(format!(
                "Cannot create model cache {}: {e}",
                settings.cache_dir.display()
            ))
        })?;
        let downloaded = artifacts::download(preset, &settings.cache_dir)?;
        Self::from_artifacts(&downloaded)
    }

    fn from_artifacts(found: &ModelArtifacts) -> Result<Self, EngineError> {
        let device = Device::Cpu;

        let tokenizer = Tokenizer::from_file(&found.tokenizer)
            .map_err(|e| EngineError::Tokenizer(format!("Failed to load tokenizer: {e}")))?;

        let mut file = std::fs::File::open(&found.weights)
            .map_err(|e| EngineError::Artifacts(format!("Failed to open model file: {e}")))?;

        let gguf = gguf_file::Content::read(&mut file)
            .map_err(|e| EngineError::Artifacts(format!("Failed to parse GGUF file: {e}")))?;

        let weights = qlm::ModelWeights::from_gguf(gguf, &mut file, &device)
            .map_err(|e| EngineError::Artifacts(format!("Failed to load model weights: {e}")))?;

        let eos_token_id = tokenizer
            .token_to_id("</s>")
            .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
            .or_else(|| tokenizer.token_to_id("<|im_end|>"))
            .or_else(|| tokenizer.token_to_id("<|eot_id|>"));

        info!(?eos_token_id, "Local model loaded successfully");

        Ok(Self {
            weights,
            tokenizer,
            device,
            eos_token_id,
        })
    }

    /// Tokenize, sample up to `max_new_tokens`, decode only the new tokens.
    fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        max_input_tokens: usize,
        seed: u64,
    ) -> Result<RawCompletion, EngineError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| EngineError::Tokenizer(format!("Tokenization failed: {e}")))?;

        // Leading special tokens (BOS) survive truncation.
        let head = encoding
            .get_special_tokens_mask()
            .iter()
            .take_while(|&&special| special == 1)
            .count();
        let mut context = truncate_prompt_tokens(encoding.get_ids(), max_input_tokens, head);
        if context.is_empty() {
            return Err(EngineError::Inference("prompt encodes to zero tokens".into()));
        }
        let prompt_tokens = context.len();

        debug!(
            prompt_tokens,
            max_new_tokens = config.max_new_tokens,
            temperature = config.temperature,
            "Starting local generation"
        );

        // A fresh copy per call: index_pos 0 on the first step resets its KV cache,
        // and the shared weights stay untouched.
        let mut weights = self.weights.clone();
        let mut logits_processor = LogitsProcessor::from_sampling(seed, sampling_mode(config));
        let mut generated: Vec<u32> = Vec::new();

        for step in 0..config.max_new_tokens {
            let (input, index_pos) = if step == 0 {
                (&context[..], 0)
            } else {
                (&context[context.len() - 1..], context.len() - 1)
            };
            let input = Tensor::new(input, &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(map_candle_err)?;

            let mut logits = weights
                .forward(&input, index_pos)
                .and_then(|l| l.squeeze(0))
                .and_then(|l| l.to_dtype(DType::F32))
                .map_err(map_candle_err)?;

            if config.repetition_penalty != 1.0 {
                logits = candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    config.repetition_penalty,
                    repeat_window(&context, REPEAT_LAST_N),
                )
                .map_err(map_candle_err)?;
            }

            let banned = banned_ngram_tokens(&context, config.no_repeat_ngram_size);
            if !banned.is_empty() {
                let mut values = logits.to_vec1::<f32>().map_err(map_candle_err)?;
                mask_logits(&mut values, &banned);
                logits = Tensor::new(values.as_slice(), &self.device).map_err(map_candle_err)?;
            }

            let next = logits_processor.sample(&logits).map_err(map_candle_err)?;
            if Some(next) == self.eos_token_id {
                break;
            }
            context.push(next);
            generated.push(next);
        }

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| EngineError::Tokenizer(format!("Detokenization failed: {e}")))?;

        debug!(completion_tokens = generated.len(), "Generation complete");

        Ok(RawCompletion {
            text,
            prompt_tokens,
            completion_tokens: generated.len(),
        })
    }
}

/// Pick the sampler for a generation profile.
fn sampling_mode(config: &GenerationConfig) -> Sampling {
    let temperature = config.temperature;
    if temperature <= 0.0 {
        return Sampling::ArgMax;
    }
    let top_p = config.top_p < 1.0 && config.top_p > 0.0;
    match (config.top_k > 0, top_p) {
        (true, true) => Sampling::TopKThenTopP {
            k: config.top_k,
            p: config.top_p,
            temperature,
        },
        (true, false) => Sampling::TopK {
            k: config.top_k,
            temperature,
        },
        (false, true) => Sampling::TopP {
            p: config.top_p,
            temperature,
        },
        (false, false) => Sampling::All { temperature },
    }
}

/// Map Candle errors to EngineError.
fn map_candle_err(e: candle_core::Error) -> EngineError {
    EngineError::Inference(format!("Candle inference error: {e}"))
}

#[async_trait]
impl Generator for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    async fn load(&self) -> Availability {
        match self.ready_model().await {
            EngineState::Ready(_) => Availability::Ready,
            EngineState::Unavailable(reason) => Availability::Unavailable { reason },
        }
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        config: &GenerationConfig,
    ) -> std::result::Result<RawCompletion, EngineError> {
        let model = match self.ready_model().await {
            EngineState::Ready(model) => model,
            EngineState::Unavailable(reason) => return Err(EngineError::Unavailable(reason)),
        };

        let seed = self
            .settings
            .seed
            .wrapping_add(self.calls.fetch_add(1, Ordering::Relaxed));
        let max_input_tokens = self.settings.max_input_tokens;
        let prompt = prompt.as_str().to_owned();
        let config = config.clone();

        // Candle is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            model.generate(&prompt, &config, max_input_tokens, seed)
        })
        .await
        .map_err(|e| EngineError::Inference(format!("Inference task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_when_temperature_is_zero() {
        let config = GenerationConfig {
            temperature: 0.0,
            ..GenerationConfig::reply()
        };
        assert!(matches!(sampling_mode(&config), Sampling::ArgMax));
    }

    #[test]
    fn reply_profile_uses_top_k_then_top_p() {
        assert!(matches!(
            sampling_mode(&GenerationConfig::reply()),
            Sampling::TopKThenTopP { k: 50, .. }
        ));
    }

    #[test]
    fn top_p_of_one_disables_nucleus() {
        let config = GenerationConfig {
            top_p: 1.0,
            top_k: 0,
            ..GenerationConfig::reply()
        };
        assert!(matches!(sampling_mode(&config), Sampling::All { .. }));
    }

    #[tokio::test]
    async fn missing_model_without_downloads_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::new(EngineSettings {
            model: "tinyllama".into(),
            cache_dir: dir.path().to_path_buf(),
            allow_download: false,
            max_input_tokens: 256,
            seed: 1,
        });

        let first = engine.load().await;
        assert!(matches!(first, Availability::Unavailable { ref reason } if reason.contains("downloads are disabled")));
        // Sticky: a second call reports the same outcome.
        assert_eq!(engine.load().await, first);

        let err = engine
            .generate(&Prompt::new("Привет"), &GenerationConfig::reply())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }

    #[tokio::test]
    async fn corrupt_cache_without_downloads_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let preset = artifacts::resolve_preset("tinyllama").unwrap();
        std::fs::write(dir.path().join(preset.gguf_file), b"not a gguf").unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), b"{}").unwrap();

        let engine = LocalEngine::new(EngineSettings {
            model: "tinyllama".into(),
            cache_dir: dir.path().to_path_buf(),
            allow_download: false,
            max_input_tokens: 256,
            seed: 1,
        });
        assert!(!engine.load().await.is_ready());
    }
}
