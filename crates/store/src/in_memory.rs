//! In-memory stores, useful for testing and one-shot runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use draftline_core::error::PersistenceError;
use draftline_core::store::{Job, JobStatus, JobStore, TimelineStore};
use draftline_core::timeline::TimelineDocument;
use tokio::sync::RwLock;

/// Both stores in one, backed by maps.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    timelines: Arc<RwLock<HashMap<(String, String), TimelineDocument>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn timeline_count(&self) -> usize {
        self.timelines.read().await.len()
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn write_progress(
        &self,
        job_id: &str,
        timeline: &TimelineDocument,
        status: JobStatus,
    ) -> Result<(), PersistenceError> {
        let job = Job {
            id: job_id.to_string(),
            status,
            timeline: Some(timeline.clone()),
            error_message: None,
            updated_at: Utc::now(),
        };
        self.jobs.write().await.insert(job_id.to_string(), job);
        Ok(())
    }

    async fn write_failure(&self, job_id: &str, error_message: &str) -> Result<(), PersistenceError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.entry(job_id.to_string()).or_insert_with(|| Job {
            id: job_id.to_string(),
            status: JobStatus::Failed,
            timeline: None,
            error_message: None,
            updated_at: Utc::now(),
        });
        job.status = JobStatus::Failed;
        job.error_message = Some(error_message.to_string());
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn fetch_job(&self, job_id: &str) -> Result<Option<Job>, PersistenceError> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }
}

#[async_trait]
impl TimelineStore for InMemoryStore {
    async fn fetch_existing(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<Option<TimelineDocument>, PersistenceError> {
        let key = (user_id.to_string(), document_id.to_string());
        Ok(self.timelines.read().await.get(&key).cloned())
    }

    async fn persist(&self, timeline: &TimelineDocument) -> Result<(), PersistenceError> {
        let key = (timeline.user_id.clone(), timeline.document_id.clone());
        self.timelines.write().await.insert(key, timeline.clone());
        Ok(())
    }
}
