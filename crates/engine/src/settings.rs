use cosmocat_config::ModelConfig;
use std::path::PathBuf;

/// What the engine needs from configuration, resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Preset alias or path to a `.gguf` file.
    pub model: String,
    pub cache_dir: PathBuf,
    pub allow_download: bool,
    /// Prompts longer than this are cut from the front.
    pub max_input_tokens: usize,
    /// Base sampling seed; each call offsets it by a call counter.
    pub seed: u64,
}

impl EngineSettings {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            model: config.name.clone(),
            cache_dir: config.cache_dir(),
            allow_download: config.allow_download,
            max_input_tokens: config.max_input_tokens,
            seed: config.seed,
        }
    }
}
