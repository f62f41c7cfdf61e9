//! Timeline domain model: slices, points, keyframes and the timeline document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::VersionSnapshot;

/// Why a slice boundary was placed where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SliceStartReason {
    Start,
    NewActivity,
    TimeDifference,
    EditedOutsideOfSystem,
}

/// A contiguous run of snapshots between two segmentation boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    pub start_reason: SliceStartReason,
    pub snapshots: Vec<VersionSnapshot>,
}

impl Slice {
    pub fn first(&self) -> Option<&VersionSnapshot> {
        self.snapshots.first()
    }

    pub fn last(&self) -> Option<&VersionSnapshot> {
        self.snapshots.last()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.first().map(|s| s.created_at)
    }

    /// The timeline point for this slice, built from its end-of-episode state.
    pub fn to_point(&self) -> Option<TimelinePoint> {
        self.last()
            .map(|version| TimelinePoint::new(self.start_reason, version.clone()))
    }
}

/// Generation progress of one half of a timeline point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    #[default]
    InProgress,
    Completed,
}

impl GenerationStatus {
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

/// One annotated position in a document's authorship timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    #[serde(rename = "type")]
    pub kind: SliceStartReason,
    pub version_time: DateTime<Utc>,
    pub version: VersionSnapshot,
    #[serde(default)]
    pub change_summary: String,
    #[serde(default)]
    pub change_summary_status: GenerationStatus,
    #[serde(default)]
    pub reverse_outline: String,
    #[serde(default)]
    pub reverse_outline_status: GenerationStatus,
}

impl TimelinePoint {
    pub fn new(kind: SliceStartReason, version: VersionSnapshot) -> Self {
        Self {
            kind,
            version_time: version.created_at,
            version,
            change_summary: String::new(),
            change_summary_status: GenerationStatus::InProgress,
            reverse_outline: String::new(),
            reverse_outline_status: GenerationStatus::InProgress,
        }
    }

    pub fn text(&self) -> &str {
        &self.version.plain_text
    }

    pub fn has_outline(&self) -> bool {
        !self.reverse_outline.is_empty()
    }

    /// Whether either half still needs generating.
    pub fn is_pending(&self) -> bool {
        !self.change_summary_status.is_completed() || !self.reverse_outline_status.is_completed()
    }

    /// Same underlying document version as `other`.
    pub fn same_version(&self, other: &TimelinePoint) -> bool {
        self.version.document_id == other.version.document_id
            && self.version_time == other.version_time
    }
}

/// A cached structural-outline anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyframe {
    pub time: DateTime<Utc>,
    pub reverse_outline: String,
}

/// A document's full authorship timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDocument {
    pub document_id: String,
    pub user_id: String,
    pub timeline_points: Vec<TimelinePoint>,
}

impl TimelineDocument {
    /// Build a document with its points sorted by `version_time`.
    pub fn new(
        document_id: impl Into<String>,
        user_id: impl Into<String>,
        mut timeline_points: Vec<TimelinePoint>,
    ) -> Self {
        timeline_points.sort_by_key(|p| p.version_time);
        Self {
            document_id: document_id.into(),
            user_id: user_id.into(),
            timeline_points,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.timeline_points.iter().all(|p| !p.is_pending())
    }
}
