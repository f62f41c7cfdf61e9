//! File-backed stores: one pretty-printed JSON file per job and per timeline.
//!
//! Layout under the root directory:
//!
//! ```text
//! jobs/<job_id>.json
//! timelines/<user_id>/<document_id>.json
//! ```
//!
//! Every write goes to a sibling temp file first and is renamed into place,
//! so readers never observe a half-written file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use draftline_core::error::PersistenceError;
use draftline_core::store::{Job, JobStatus, JobStore, TimelineStore};
use draftline_core::timeline::TimelineDocument;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

/// Job and timeline store rooted at a directory.
pub struct FileStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles on job files.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!(root = %root.display(), "File store opened");
        Self {
            root,
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn job_path(&self, job_id: &str) -> PathBuf {
        self.root
            .join("jobs")
            .join(format!("{}.json", file_component(job_id)))
    }

    fn timeline_path(&self, user_id: &str, document_id: &str) -> PathBuf {
        self.root
            .join("timelines")
            .join(file_component(user_id))
            .join(format!("{}.json", file_component(document_id)))
    }

    async fn read_job(&self, job_id: &str) -> Result<Option<Job>, PersistenceError> {
        read_json(&self.job_path(job_id)).await
    }

    async fn write_job(&self, job: &Job) -> Result<(), PersistenceError> {
        write_json(&self.job_path(&job.id), job).await
    }
}

/// Make an id safe to use as a single path component.
fn file_component(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        format!("_{cleaned}")
    } else {
        cleaned
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(PersistenceError::Storage(format!(
                "Failed to read {}: {e}",
                path.display()
            )));
        }
    };
    Ok(Some(serde_json::from_str(&content)?))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            PersistenceError::Storage(format!("Failed to create {}: {e}", parent.display()))
        })?;
    }

    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| PersistenceError::Storage(format!("Failed to write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        PersistenceError::Storage(format!("Failed to move {} into place: {e}", path.display()))
    })?;
    Ok(())
}

#[async_trait]
impl JobStore for FileStore {
    async fn write_progress(
        &self,
        job_id: &str,
        timeline: &TimelineDocument,
        status: JobStatus,
    ) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let job = Job {
            id: job_id.to_string(),
            status,
            timeline: Some(timeline.clone()),
            error_message: None,
            updated_at: Utc::now(),
        };
        self.write_job(&job).await?;
        debug!(job_id, status = ?status, "Job progress written");
        Ok(())
    }

    async fn write_failure(&self, job_id: &str, error_message: &str) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let timeline = self.read_job(job_id).await?.and_then(|job| job.timeline);
        let job = Job {
            id: job_id.to_string(),
            status: JobStatus::Failed,
            timeline,
            error_message: Some(error_message.to_string()),
            updated_at: Utc::now(),
        };
        self.write_job(&job).await
    }

    async fn fetch_job(&self, job_id: &str) -> Result<Option<Job>, PersistenceError> {
        self.read_job(job_id).await
    }
}

#[async_trait]
impl TimelineStore for FileStore {
    async fn fetch_existing(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<Option<TimelineDocument>, PersistenceError> {
        read_json(&self.timeline_path(user_id, document_id)).await
    }

    async fn persist(&self, timeline: &TimelineDocument) -> Result<(), PersistenceError> {
        let path = self.timeline_path(&timeline.user_id, &timeline.document_id);
        write_json(&path, timeline).await?;
        debug!(path = %path.display(), "Timeline persisted");
        Ok(())
    }
}
