//! `draftline job <id>`: print a stored job.

use draftline_config::AppConfig;
use draftline_core::JobStore;
use draftline_store::FileStore;

pub async fn run(job_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = FileStore::new(config.data_dir());

    match store.fetch_job(job_id).await? {
        Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
        None => return Err(format!("No job '{job_id}' in {}", store.root().display()).into()),
    }

    Ok(())
}
