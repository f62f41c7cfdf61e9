//! `draftline providers`: list registered completion providers.

use draftline_config::AppConfig;
use draftline_providers::build_from_config;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = build_from_config(&config);

    println!("Completion providers");
    println!("====================");
    for name in registry.list() {
        let marker = if name == registry.default_name() { "*" } else { " " };
        let model = config
            .providers
            .get(name)
            .and_then(|p| p.default_model.as_deref())
            .unwrap_or("-");
        println!("  {marker} {name:<12} model: {model}");
    }
    println!();
    println!("  * default (set `default_provider` or DRAFTLINE_PROVIDER)");
    println!("  Unknown names under [providers.<name>] with an api_url are");
    println!("  registered as OpenAI-compatible endpoints.");

    Ok(())
}
