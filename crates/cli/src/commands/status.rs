//! `draftline status`: show the effective configuration.

use draftline_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let timeline = &config.timeline;

    println!("Draftline Status");
    println!("================");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  Data dir:       {}", config.data_dir().display());
    println!("  Provider:       {}", config.default_provider);
    println!("  Model:          {}", config.default_model);
    println!("  API key:        {}", if config.api_key.is_some() { "set" } else { "not set" });
    println!("  Timeout:        {}s", config.request_timeout_secs);
    println!(
        "  Conformance:    {} retries from temperature {}",
        config.conformance.retry_attempts, config.conformance.base_temperature
    );
    println!("  Batch size:     {}", timeline.batch_size);
    println!("  Slice gap:      {}h", timeline.slice_gap_hours);
    println!(
        "  Major change:   >= {} words and > {}% changed or > {} spans",
        timeline.major_change.min_words,
        timeline.major_change.percent_threshold,
        timeline.major_change.span_threshold
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file, using defaults. Example:\n");
        println!("{}", AppConfig::default_toml());
    }

    Ok(())
}
