//! Persistence collaborators: the job store and the long-term timeline store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::timeline::TimelineDocument;

/// Lifecycle of a timeline job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InProgress,
    Complete,
    Failed,
}

/// A timeline job as recorded by the job store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,

    /// Partial timeline while running, final timeline once complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<TimelineDocument>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub updated_at: DateTime<Utc>,
}

/// Checkpoint store for in-flight and finished jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn write_progress(
        &self,
        job_id: &str,
        timeline: &TimelineDocument,
        status: JobStatus,
    ) -> std::result::Result<(), PersistenceError>;

    /// Mark a job failed. Any previously written timeline is kept.
    async fn write_failure(
        &self,
        job_id: &str,
        error_message: &str,
    ) -> std::result::Result<(), PersistenceError>;

    async fn fetch_job(&self, job_id: &str) -> std::result::Result<Option<Job>, PersistenceError>;
}

/// Long-term home of completed timelines.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    async fn fetch_existing(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> std::result::Result<Option<TimelineDocument>, PersistenceError>;

    async fn persist(&self, timeline: &TimelineDocument) -> std::result::Result<(), PersistenceError>;
}
