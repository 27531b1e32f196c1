//! # CosmoCat Engine
//!
//! Text generation backends behind the [`Generator`] trait.
//!
//! - [`LocalEngine`] runs a quantized model with Candle (feature `local`)
//! - [`DisabledEngine`] never loads; the assistant answers from fallbacks
//!
//! Both share the load-once lifecycle in [`lifecycle`].

pub mod artifacts;
pub mod disabled;
pub mod lifecycle;
#[cfg(feature = "local")]
pub mod local;
pub mod sampling;
pub mod settings;

pub use disabled::DisabledEngine;
pub use lifecycle::{EngineState, LoadOnce};
#[cfg(feature = "local")]
pub use local::LocalEngine;
pub use settings::EngineSettings;

use cosmocat_config::ModelConfig;
use cosmocat_core::engine::Generator;
use std::sync::Arc;

/// Build the engine this binary was compiled with.
pub fn engine_from_config(config: &ModelConfig) -> Arc<dyn Generator> {
    #[cfg(feature = "local")]
    {
        Arc::new(LocalEngine::new(EngineSettings::from_config(config)))
    }
    #[cfg(not(feature = "local"))]
    {
        // Still validates the model name so misconfiguration shows up in `doctor`.
        match artifacts::ModelSource::parse(&config.name) {
            Ok(_) => Arc::new(DisabledEngine::default()),
            Err(e) => Arc::new(DisabledEngine::new(e.to_string())),
        }
    }
}
