//! `cosmocat onboard`: first-time setup.

use cosmocat_config::AppConfig;

pub async fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("🐾 КосмоКэт, First-Time Setup");
    println!("=============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() && !force {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force to overwrite.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Wrote config.toml at: {}", config_path.display());

    let defaults = AppConfig::default();
    println!("\n📝 Next steps:");
    println!(
        "   1. Pick a model in [model] (default: {}), or point it at a .gguf file",
        defaults.model.name
    );
    println!(
        "   2. Run: cosmocat doctor --load   (downloads into {})",
        defaults.model.cache_dir().display()
    );
    println!("   3. Run: cosmocat chat\n");

    Ok(())
}
