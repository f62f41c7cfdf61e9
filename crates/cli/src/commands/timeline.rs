//! `draftline timeline`: run one timeline job against a JSON export.

use std::sync::Arc;

use draftline_config::AppConfig;
use draftline_core::DocumentSource;
use draftline_providers::{ConformanceExecutor, build_from_config};
use draftline_store::{FileStore, JsonDocumentSource};
use draftline_timeline::TimelineAssembler;
use tracing::info;

use crate::TimelineArgs;

pub async fn run(args: TimelineArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let registry = build_from_config(&config);
    let provider_name = args
        .provider
        .unwrap_or_else(|| config.default_provider.clone());
    let provider = registry.get(&provider_name)?;
    let model = args
        .model
        .or_else(|| {
            config
                .providers
                .get(&provider_name)
                .and_then(|p| p.default_model.clone())
        })
        .unwrap_or_else(|| config.default_model.clone());

    let source = JsonDocumentSource::load(&args.input).await?;
    let revisions = source.fetch_external_revisions(&args.document).await?;

    let store = Arc::new(FileStore::new(config.data_dir()));
    let executor = ConformanceExecutor::from_config(provider, &config.conformance);
    let assembler = TimelineAssembler::new(executor, &model, store.clone(), store.clone())
        .with_config(&config.timeline);

    let job_id = args.job.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!(
        job_id = %job_id,
        provider = %provider_name,
        model = %model,
        data_dir = %store.root().display(),
        "Starting timeline job"
    );

    let timeline = assembler
        .get_document_timeline(&job_id, &args.user, &args.document, &revisions, &source)
        .await?;

    println!("{}", serde_json::to_string_pretty(&timeline)?);
    eprintln!("Job {job_id} complete: {} points", timeline.timeline_points.len());
    Ok(())
}
