//! Document snapshots and the document-source collaborator.
//!
//! Snapshots are produced by whatever editor integration feeds the engine;
//! they are immutable once created.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// One saved state of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    pub document_id: String,
    pub plain_text: String,
    pub activity_id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

/// A revision recorded by the editor itself, outside this system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRevision {
    pub id: String,

    /// Revisions without a timestamp cannot be placed and are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_text: Option<String>,
}

/// Turns an external revision into a snapshot.
#[async_trait]
pub trait RevisionConverter: Send + Sync {
    /// Materialize `revision`, inheriting metadata from `last_known`.
    async fn materialize(
        &self,
        revision: &ExternalRevision,
        last_known: &VersionSnapshot,
    ) -> std::result::Result<VersionSnapshot, SourceError>;
}

/// Where snapshots and external revisions come from.
#[async_trait]
pub trait DocumentSource: RevisionConverter {
    /// All snapshots of a document, ordered by `created_at` ascending.
    async fn fetch_snapshots(
        &self,
        document_id: &str,
    ) -> std::result::Result<Vec<VersionSnapshot>, SourceError>;

    async fn fetch_external_revisions(
        &self,
        document_id: &str,
    ) -> std::result::Result<Vec<ExternalRevision>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_without_time_deserializes() {
        let rev: ExternalRevision = serde_json::from_str(r#"{"id":"r1"}"#).unwrap();
        assert_eq!(rev.id, "r1");
        assert!(rev.modified_time.is_none());
        assert!(rev.plain_text.is_none());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snap = VersionSnapshot {
            document_id: "doc".into(),
            plain_text: "hello".into(),
            activity_id: "a1".into(),
            session_id: "s1".into(),
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
        };
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("documentId"));
        assert!(json.contains("plainText"));
        assert!(json.contains("1970-01-01T00:00:00Z"));
    }
}
