//! Model artifacts: presets and the local cache.
//!
//! Resolution order for a preset:
//! 1. flat files in the cache dir (`<gguf_file>` plus its tokenizer),
//! 2. the hf-hub cache layout inside the same dir (offline lookup),
//! 3. a download through hf-hub into that dir, when allowed.
//!
//! An explicit `.gguf` path is used as-is with `tokenizer.json` beside it.

use cosmocat_core::error::EngineError;
use std::path::{Path, PathBuf};

/// Friendly alias that resolves to a HuggingFace repo + filenames.
#[derive(Debug)]
pub struct ModelPreset {
    pub alias: &'static str,
    pub aliases: &'static [&'static str],
    pub repo: &'static str,
    pub gguf_file: &'static str,
    pub tokenizer_repo: &'static str,
}

impl ModelPreset {
    /// Name of the tokenizer file when stored flat next to the weights.
    pub fn flat_tokenizer_file(&self) -> String {
        format!("{}.tokenizer.json", self.gguf_file.trim_end_matches(".gguf"))
    }
}

const PRESETS: &[ModelPreset] = &[
    ModelPreset {
        alias: "tinyllama",
        aliases: &["tinyllama", "tiny-llama", "tinyllama-1.1b"],
        repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
        gguf_file: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
        tokenizer_repo: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
    },
    ModelPreset {
        alias: "smollm:135m",
        aliases: &["smollm", "smollm:135m", "smollm-135m"],
        repo: "TheBloke/SmolLM-135M-Instruct-GGUF",
        gguf_file: "smollm-135m-instruct.Q4_K_M.gguf",
        tokenizer_repo: "HuggingFaceTB/SmolLM-135M-Instruct",
    },
    ModelPreset {
        alias: "smollm:360m",
        aliases: &["smollm:360m", "smollm-360m"],
        repo: "TheBloke/SmolLM-360M-Instruct-GGUF",
        gguf_file: "smollm-360m-instruct.Q4_K_M.gguf",
        tokenizer_repo: "HuggingFaceTB/SmolLM-360M-Instruct",
    },
    ModelPreset {
        alias: "smollm:1.7b",
        aliases: &["smollm:1.7b", "smollm-1.7b"],
        repo: "TheBloke/SmolLM-1.7B-Instruct-GGUF",
        gguf_file: "smollm-1.7b-instruct.Q4_K_M.gguf",
        tokenizer_repo: "HuggingFaceTB/SmolLM-1.7B-Instruct",
    },
];

/// Look up a preset by any of its aliases (case-insensitive).
pub fn resolve_preset(name: &str) -> Option<&'static ModelPreset> {
    let name = name.to_lowercase();
    PRESETS.iter().find(|p| p.aliases.contains(&name.as_str()))
}

/// Canonical preset names, for help output.
pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|p| p.alias).collect()
}

/// Where the weights come from.
#[derive(Debug, Clone)]
pub enum ModelSource {
    GgufFile(PathBuf),
    Preset(&'static ModelPreset),
}

impl ModelSource {
    /// Interpret a configured model name.
    pub fn parse(name: &str) -> Result<Self, EngineError> {
        if name.ends_with(".gguf") {
            return Ok(Self::GgufFile(PathBuf::from(name)));
        }
        resolve_preset(name).map(Self::Preset).ok_or_else(|| {
            EngineError::ModelNotFound(format!(
                "Unknown local model '{}'. Available presets: {}. Or provide a path to a .gguf file.",
                name,
                preset_names().join(", ")
            ))
        })
    }
}

/// Resolved on-disk weights and tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
    pub weights: PathBuf,
    pub tokenizer: PathBuf,
}

/// Find artifacts without touching the network.
pub fn find_cached(source: &ModelSource, cache_dir: &Path) -> Option<ModelArtifacts> {
    match source {
        ModelSource::GgufFile(path) => {
            let tokenizer = path.with_file_name("tokenizer.json");
            (path.is_file() && tokenizer.is_file()).then(|| ModelArtifacts {
                weights: path.clone(),
                tokenizer,
            })
        }
        ModelSource::Preset(preset) => {
            find_flat(preset, cache_dir).or_else(|| find_in_hub_cache(preset, cache_dir))
        }
    }
}

fn find_flat(preset: &ModelPreset, cache_dir: &Path) -> Option<ModelArtifacts> {
    let weights = cache_dir.join(preset.gguf_file);
    if !weights.is_file() {
        return None;
    }
    [
        cache_dir.join(preset.flat_tokenizer_file()),
        cache_dir.join("tokenizer.json"),
    ]
    .into_iter()
    .find(|p| p.is_file())
    .map(|tokenizer| ModelArtifacts { weights, tokenizer })
}

#[cfg(feature = "local")]
fn find_in_hub_cache(preset: &ModelPreset, cache_dir: &Path) -> Option<ModelArtifacts> {
    let cache = hf_hub::Cache::new(cache_dir.to_path_buf());
    let weights = cache.model(preset.repo.to_string()).get(preset.gguf_file)?;
    let tokenizer = cache
        .model(preset.tokenizer_repo.to_string())
        .get("tokenizer.json")?;
    Some(ModelArtifacts { weights, tokenizer })
}

#[cfg(not(feature = "local"))]
fn find_in_hub_cache(_preset: &ModelPreset, _cache_dir: &Path) -> Option<ModelArtifacts> {
    None
}

/// Download a preset into `cache_dir` through hf-hub.
#[cfg(feature = "local")]
pub fn download(preset: &ModelPreset, cache_dir: &Path) -> Result<ModelArtifacts, EngineError> {
    use hf_hub::api::sync::ApiBuilder;
    use tracing::info;

    info!(
        repo = preset.repo,
        file = preset.gguf_file,
        cache = %cache_dir.display(),
        "Downloading model artifacts"
    );

    let api = ApiBuilder::new()
        .with_cache_dir(cache_dir.to_path_buf())
        .build()
        .map_err(|e| {
            EngineError::Network(format!("Failed to initialize HuggingFace Hub API: {e}"))
        })?;

    let weights = api
        .model(preset.repo.to_string())
        .get(preset.gguf_file)
        .map_err(|e| {
            EngineError::Network(format!(
                "Failed to download model '{}' from '{}': {e}",
                preset.gguf_file, preset.repo
            ))
        })?;

    let tokenizer = api
        .model(preset.tokenizer_repo.to_string())
        .get("tokenizer.json")
        .map_err(|e| {
            EngineError::Network(format!(
                "Failed to download tokenizer from '{}': {e}",
                preset.tokenizer_repo
            ))
        })?;

    info!(path = %weights.display(), "Model artifacts ready");
    Ok(ModelArtifacts { weights, tokenizer })
}
