//! `cosmocat doctor`: diagnose configuration, model cache and engine.

use cosmocat_config::AppConfig;
use cosmocat_core::engine::Availability;
use cosmocat_engine::artifacts::{ModelSource, find_cached};

use super::build_assistant;

pub async fn run(load: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 КосмоКэт Doctor, System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults (run `cosmocat onboard`)");
        issues += 1;
    }
    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    let cache_dir = config.model.cache_dir();
    if cache_dir.is_dir() {
        println!("  ✅ Model cache: {}", cache_dir.display());
    } else {
        println!("  ⚠️  Model cache missing: {}", cache_dir.display());
        issues += 1;
    }

    match ModelSource::parse(&config.model.name) {
        Ok(source) => match find_cached(&source, &cache_dir) {
            Some(artifacts) => {
                println!("  ✅ Weights:   {}", artifacts.weights.display());
                println!("  ✅ Tokenizer: {}", artifacts.tokenizer.display());
            }
            None if config.model.allow_download => {
                println!(
                    "  ⚠️  '{}' not cached yet; it will be downloaded on first use",
                    config.model.name
                );
                issues += 1;
            }
            None => {
                println!(
                    "  ❌ '{}' not cached and downloads are disabled",
                    config.model.name
                );
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    let assistant = build_assistant(&config);
    println!("  ℹ️  Engine: {}", assistant.engine_name());

    if load {
        eprint!("  Loading the model...");
        let availability = assistant.warm_up().await;
        eprint!("\r                     \r");
        match availability {
            Availability::Ready => println!("  ✅ Engine loaded"),
            Availability::Unavailable { reason } => {
                println!("  ❌ Engine unavailable: {reason}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
