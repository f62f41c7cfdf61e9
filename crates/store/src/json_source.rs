//! Document source backed by an exported JSON file.
//!
//! The export holds every snapshot and external revision the editor
//! integration collected:
//!
//! ```json
//! { "snapshots": [ ... ], "externalRevisions": [ ... ] }
//! ```

use std::path::Path;

use async_trait::async_trait;
use draftline_core::document::{DocumentSource, ExternalRevision, RevisionConverter, VersionSnapshot};
use draftline_core::error::SourceError;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentExport {
    #[serde(default)]
    pub snapshots: Vec<VersionSnapshot>,
    #[serde(default)]
    pub external_revisions: Vec<ExternalRevision>,
}

pub struct JsonDocumentSource {
    export: DocumentExport,
}

impl JsonDocumentSource {
    pub fn new(export: DocumentExport) -> Self {
        Self { export }
    }

    pub fn from_json_str(content: &str) -> Result<Self, SourceError> {
        let export: DocumentExport =
            serde_json::from_str(content).map_err(|e| SourceError::Parse(e.to_string()))?;
        Ok(Self::new(export))
    }

    pub async fn load(path: &Path) -> Result<Self, SourceError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound(path.display().to_string())
            } else {
                SourceError::Read(format!("{}: {e}", path.display()))
            }
        })?;
        let source = Self::from_json_str(&content)?;
        debug!(
            path = %path.display(),
            snapshots = source.export.snapshots.len(),
            revisions = source.export.external_revisions.len(),
            "Loaded document export"
        );
        Ok(source)
    }
}

#[async_trait]
impl RevisionConverter for JsonDocumentSource {
    /// Take text and time from the revision; everything else from `last_known`.
    async fn materialize(
        &self,
        revision: &ExternalRevision,
        last_known: &VersionSnapshot,
    ) -> Result<VersionSnapshot, SourceError> {
        let created_at = revision.modified_time.ok_or_else(|| SourceError::Materialize {
            revision_id: revision.id.clone(),
            reason: "revision has no modified time".into(),
        })?;
        let plain_text = revision.plain_text.clone().ok_or_else(|| SourceError::Materialize {
            revision_id: revision.id.clone(),
            reason: "export carries no text for this revision".into(),
        })?;

        Ok(VersionSnapshot {
            document_id: last_known.document_id.clone(),
            plain_text,
            activity_id: last_known.activity_id.clone(),
            session_id: last_known.session_id.clone(),
            created_at,
        })
    }
}

#[async_trait]
impl DocumentSource for JsonDocumentSource {
    async fn fetch_snapshots(&self, document_id: &str) -> Result<Vec<VersionSnapshot>, SourceError> {
        let mut snapshots: Vec<VersionSnapshot> = self
            .export
            .snapshots
            .iter()
            .filter(|s| s.document_id == document_id)
            .cloned()
            .collect();
        if snapshots.is_empty() && !self.export.snapshots.is_empty() {
            return Err(SourceError::NotFound(document_id.to_string()));
        }
        snapshots.sort_by_key(|s| s.created_at);
        Ok(snapshots)
    }

    async fn fetch_external_revisions(
        &self,
        _document_id: &str,
    ) -> Result<Vec<ExternalRevision>, SourceError> {
        Ok(self.export.external_revisions.clone())
    }
}
