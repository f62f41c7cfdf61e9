//! Scripted collaborators shared by the unit tests in this crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use draftline_core::document::VersionSnapshot;
use draftline_core::error::{PersistenceError, ProviderError};
use draftline_core::provider::*;
use draftline_core::store::{Job, JobStatus, JobStore, TimelineStore};
use draftline_core::timeline::TimelineDocument;
use draftline_providers::ConformanceExecutor;

use crate::generation::Generator;

/// Answers summaries with text and outlines with schema-valid JSON.
#[derive(Default)]
pub struct ScriptedProvider {
    requests: Mutex<Vec<CompletionRequest>>,
    fail_on: Option<String>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any request whose source document contains `needle`.
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            ..Self::default()
        }
    }

    pub fn generator(provider: &Arc<Self>) -> Arc<Generator> {
        let executor = ConformanceExecutor::new(provider.clone());
        Arc::new(Generator::new(Arc::new(executor), "test-model"))
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn summary_calls(&self) -> usize {
        self.count(OutputKind::Text)
    }

    pub fn outline_calls(&self) -> usize {
        self.count(OutputKind::Json)
    }

    /// Source documents of outline requests that carried a continuity seed.
    pub fn seeded_outlines(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.output_kind == OutputKind::Json && r.prompts.len() > 1)
            .filter_map(|r| r.source_document.clone())
            .collect()
    }

    fn count(&self, kind: OutputKind) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.output_kind == kind)
            .count()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete_chat(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResult, ProviderError> {
        let source = request.source_document.clone().unwrap_or_default();
        let kind = request.output_kind;
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };

        if let Some(needle) = &self.fail_on {
            if source.contains(needle.as_str()) {
                return Err(ProviderError::ApiError {
                    status_code: 500,
                    message: format!("scripted failure on '{needle}'"),
                });
            }
        }

        let answer = match kind {
            OutputKind::Text => format!("Summary #{call}"),
            OutputKind::Json => serde_json::json!({
                "thesis": format!("Outline of: {source}"),
                "claims": [],
            })
            .to_string(),
        };

        Ok(CompletionResult {
            answer,
            usage: TokenUsage::default(),
            raw_request: serde_json::Value::Null,
            raw_response: serde_json::Value::Null,
        })
    }
}

/// Keeps every progress write so tests can inspect checkpoints.
#[derive(Default)]
pub struct RecordingJobStore {
    pub writes: Mutex<Vec<(JobStatus, TimelineDocument)>>,
    pub failures: Mutex<Vec<String>>,
}

#[async_trait]
impl JobStore for RecordingJobStore {
    async fn write_progress(
        &self,
        _job_id: &str,
        timeline: &TimelineDocument,
        status: JobStatus,
    ) -> std::result::Result<(), PersistenceError> {
        self.writes.lock().unwrap().push((status, timeline.clone()));
        Ok(())
    }

    async fn write_failure(
        &self,
        _job_id: &str,
        error_message: &str,
    ) -> std::result::Result<(), PersistenceError> {
        self.failures.lock().unwrap().push(error_message.to_string());
        Ok(())
    }

    async fn fetch_job(&self, job_id: &str) -> std::result::Result<Option<Job>, PersistenceError> {
        let writes = self.writes.lock().unwrap();
        Ok(writes.last().map(|(status, timeline)| Job {
            id: job_id.to_string(),
            status: *status,
            timeline: Some(timeline.clone()),
            error_message: None,
            updated_at: Utc::now(),
        }))
    }
}

#[derive(Default)]
pub struct MapTimelineStore {
    pub timelines: Mutex<HashMap<(String, String), TimelineDocument>>,
    pub fail_persist: bool,
}

#[async_trait]
impl TimelineStore for MapTimelineStore {
    async fn fetch_existing(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> std::result::Result<Option<TimelineDocument>, PersistenceError> {
        let key = (user_id.to_string(), document_id.to_string());
        Ok(self.timelines.lock().unwrap().get(&key).cloned())
    }

    async fn persist(&self, timeline: &TimelineDocument) -> std::result::Result<(), PersistenceError> {
        if self.fail_persist {
            return Err(PersistenceError::Storage("disk full".into()));
        }
        let key = (timeline.user_id.clone(), timeline.document_id.clone());
        self.timelines.lock().unwrap().insert(key, timeline.clone());
        Ok(())
    }
}

pub fn at(minutes: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + minutes * 60, 0).unwrap()
}

pub fn snapshot(minutes: i64, text: &str) -> VersionSnapshot {
    VersionSnapshot {
        document_id: "doc-1".into(),
        plain_text: text.into(),
        activity_id: "activity".into(),
        session_id: "session".into(),
        created_at: at(minutes),
    }
}
