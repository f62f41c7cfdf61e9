use chrono::DateTime;
use draftline_core::document::VersionSnapshot;
use draftline_core::timeline::{GenerationStatus, SliceStartReason, TimelineDocument, TimelinePoint};

pub fn sample_timeline() -> TimelineDocument {
    let version = VersionSnapshot {
        document_id: "doc-1".into(),
        plain_text: "A finished essay".into(),
        activity_id: "activity".into(),
        session_id: "session".into(),
        created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
    };
    let mut point = TimelinePoint::new(SliceStartReason::Start, version);
    point.change_summary = "Wrote the first draft".into();
    point.change_summary_status = GenerationStatus::Completed;
    point.reverse_outline = r#"{"thesis":"t","claims":[]}"#.into();
    point.reverse_outline_status = GenerationStatus::Completed;
    TimelineDocument::new("doc-1", "user-1", vec![point])
}
