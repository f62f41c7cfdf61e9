//! Version slicing: splits a snapshot history into editing episodes.
//!
//! A new slice starts when the activity or session changes, or when the
//! author was idle for longer than the configured gap. Gaps whose texts do
//! not line up are then reconciled against revisions recorded outside the
//! system.

use chrono::{DateTime, Duration, Utc};
use draftline_core::document::{ExternalRevision, RevisionConverter, VersionSnapshot};
use draftline_core::error::SourceError;
use draftline_core::timeline::{Slice, SliceStartReason};
use tracing::{debug, warn};

const DEFAULT_GAP_HOURS: i64 = 8;

/// Partitions ordered snapshots into slices.
#[derive(Debug, Clone)]
pub struct VersionSlicer {
    gap: Duration,
}

impl Default for VersionSlicer {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_GAP_HOURS))
    }
}

impl VersionSlicer {
    pub fn new(gap: Duration) -> Self {
        Self { gap }
    }

    /// Out-of-range gaps are clamped to `1..=MAX_SLICE_GAP_HOURS`.
    pub fn from_config(config: &draftline_config::TimelineConfig) -> Self {
        let hours = config
            .slice_gap_hours
            .clamp(1, draftline_config::MAX_SLICE_GAP_HOURS);
        Self::new(Duration::hours(hours))
    }

    /// Split `versions` (ordered by `created_at`) at activity changes and idle gaps.
    pub fn segment(&self, versions: &[VersionSnapshot]) -> Vec<Slice> {
        let mut slices = Vec::new();
        let mut current = Slice {
            start_reason: SliceStartReason::Start,
            snapshots: Vec::new(),
        };

        for version in versions {
            let reason = current.last().and_then(|previous| self.boundary(previous, version));
            if let Some(reason) = reason {
                let closed = std::mem::replace(
                    &mut current,
                    Slice {
                        start_reason: reason,
                        snapshots: Vec::new(),
                    },
                );
                slices.push(closed);
            }
            current.snapshots.push(version.clone());
        }

        if !current.snapshots.is_empty() {
            slices.push(current);
        }
        slices
    }

    fn boundary(&self, previous: &VersionSnapshot, next: &VersionSnapshot) -> Option<SliceStartReason> {
        if previous.activity_id != next.activity_id || previous.session_id != next.session_id {
            Some(SliceStartReason::NewActivity)
        } else if next.created_at - previous.created_at > self.gap {
            Some(SliceStartReason::TimeDifference)
        } else {
            None
        }
    }

    /// Segment `versions` and add a slice for every gap explained by external revisions.
    ///
    /// The result is sorted by each slice's start time.
    pub async fn slice<C>(
        &self,
        versions: &[VersionSnapshot],
        revisions: &[ExternalRevision],
        converter: &C,
    ) -> std::result::Result<Vec<Slice>, SourceError>
    where
        C: RevisionConverter + ?Sized,
    {
        let mut slices = self.segment(versions);
        if slices.is_empty() {
            return Ok(slices);
        }

        let mut timed: Vec<(DateTime<Utc>, &ExternalRevision)> = revisions
            .iter()
            .filter_map(|revision| match revision.modified_time {
                Some(time) => Some((time, revision)),
                None => {
                    warn!(revision_id = %revision.id, "Skipping external revision without modified time");
                    None
                }
            })
            .collect();
        timed.sort_by_key(|(time, _)| *time);

        let mut reconciled = Vec::new();

        for pair in slices.windows(2) {
            let (Some(before), Some(after)) = (pair[0].last(), pair[1].first()) else {
                continue;
            };
            if before.plain_text == after.plain_text {
                continue;
            }

            let matched: Vec<&ExternalRevision> = timed
                .iter()
                .filter(|(time, _)| *time > before.created_at && *time < after.created_at)
                .map(|(_, revision)| *revision)
                .collect();

            if let Some(slice) = materialize_slice(&matched, before, converter).await? {
                reconciled.push(slice);
            }
        }

        if let Some(tail) = slices.last().and_then(Slice::last) {
            let matched: Vec<&ExternalRevision> = timed
                .iter()
                .filter(|(time, _)| *time > tail.created_at)
                .map(|(_, revision)| *revision)
                .collect();

            if let Some(slice) = materialize_slice(&matched, tail, converter).await? {
                reconciled.push(slice);
            }
        }

        if !reconciled.is_empty() {
            debug!(count = reconciled.len(), "Added slices for external edits");
        }

        slices.extend(reconciled);
        slices.sort_by_key(Slice::start_time);
        Ok(slices)
    }
}

async fn materialize_slice<C>(
    revisions: &[&ExternalRevision],
    last_known: &VersionSnapshot,
    converter: &C,
) -> std::result::Result<Option<Slice>, SourceError>
where
    C: RevisionConverter + ?Sized,
{
    if revisions.is_empty() {
        return Ok(None);
    }

    let mut snapshots = Vec::with_capacity(revisions.len());
    for revision in revisions {
        snapshots.push(converter.materialize(revision, last_known).await?);
    }

    Ok(Some(Slice {
        start_reason: SliceStartReason::EditedOutsideOfSystem,
        snapshots,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CopyConverter;

    #[async_trait]
    impl RevisionConverter for CopyConverter {
        async fn materialize(
            &self,
            revision: &ExternalRevision,
            last_known: &VersionSnapshot,
        ) -> std::result::Result<VersionSnapshot, SourceError> {
            Ok(VersionSnapshot {
                document_id: last_known.document_id.clone(),
                plain_text: revision.plain_text.clone().unwrap_or_default(),
                activity_id: last_known.activity_id.clone(),
                session_id: last_known.session_id.clone(),
                created_at: revision.modified_time.unwrap(),
            })
        }
    }

    fn at(hours: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::hours(hours)
    }

    fn snap(hours: i64, activity: &str, session: &str, text: &str) -> VersionSnapshot {
        VersionSnapshot {
            document_id: "doc".into(),
            plain_text: text.into(),
            activity_id: activity.into(),
            session_id: session.into(),
            created_at: at(hours),
        }
    }

    fn revision(id: &str, hours: Option<i64>, text: &str) -> ExternalRevision {
        ExternalRevision {
            id: id.into(),
            modified_time: hours.map(at),
            plain_text: Some(text.into()),
        }
    }

    fn reasons(slices: &[Slice]) -> Vec<SliceStartReason> {
        slices.iter().map(|s| s.start_reason).collect()
    }

    #[test]
    fn splits_on_activity_session_and_gap() {
        let versions = vec![
            snap(0, "a1", "s1", "one"),
            snap(1, "a1", "s1", "two"),
            snap(2, "a2", "s1", "three"),
            snap(3, "a2", "s2", "four"),
            snap(20, "a2", "s2", "five"),
            snap(21, "a2", "s2", "six"),
        ];
        let slices = VersionSlicer::default().segment(&versions);

        assert_eq!(
            reasons(&slices),
            vec![
                SliceStartReason::Start,
                SliceStartReason::NewActivity,
                SliceStartReason::NewActivity,
                SliceStartReason::TimeDifference,
            ]
        );
        assert_eq!(slices[0].snapshots.len(), 2);
        assert_eq!(slices[3].snapshots.len(), 2);
    }

    #[test]
    fn gap_of_exactly_the_limit_does_not_split() {
        let versions = vec![snap(0, "a", "s", "x"), snap(8, "a", "s", "y")];
        assert_eq!(VersionSlicer::default().segment(&versions).len(), 1);
    }

    #[test]
    fn segmentation_preserves_order_and_is_repeatable() {
        let versions: Vec<VersionSnapshot> = (0..12)
            .map(|i| snap(i * 3, if i % 4 == 0 { "a" } else { "b" }, "s", &format!("t{i}")))
            .collect();
        let slicer = VersionSlicer::default();

        let first = slicer.segment(&versions);
        let flattened: Vec<VersionSnapshot> =
            first.iter().flat_map(|s| s.snapshots.clone()).collect();
        assert_eq!(flattened, versions);
        assert_eq!(first, slicer.segment(&versions));
    }

    #[tokio::test]
    async fn empty_history_yields_no_slices() {
        let revisions = vec![revision("r1", Some(5), "outside")];
        let slices = VersionSlicer::default()
            .slice(&[], &revisions, &CopyConverter)
            .await
            .unwrap();
        assert!(slices.is_empty());
    }

    #[tokio::test]
    async fn mismatched_gap_gets_external_slice() {
        let versions = vec![
            snap(0, "a1", "s1", "draft"),
            snap(10, "a2", "s1", "draft edited elsewhere"),
        ];
        let revisions = vec![
            revision("r2", Some(6), "draft edited"),
            revision("r1", Some(4), "draft e"),
            revision("early", Some(-1), "ignored"),
        ];

        let slices = VersionSlicer::default()
            .slice(&versions, &revisions, &CopyConverter)
            .await
            .unwrap();

        assert_eq!(
            reasons(&slices),
            vec![
                SliceStartReason::Start,
                SliceStartReason::EditedOutsideOfSystem,
                SliceStartReason::NewActivity,
            ]
        );
        let external = &slices[1];
        assert_eq!(external.snapshots.len(), 2);
        assert_eq!(external.snapshots[0].plain_text, "draft e");
        assert_eq!(external.last().unwrap().plain_text, "draft edited");
        assert_eq!(external.last().unwrap().activity_id, "a1");
    }

    #[tokio::test]
    async fn matching_texts_skip_reconciliation() {
        let versions = vec![snap(0, "a1", "s1", "same"), snap(10, "a2", "s1", "same")];
        let revisions = vec![revision("r1", Some(5), "different")];

        let slices = VersionSlicer::default()
            .slice(&versions, &revisions, &CopyConverter)
            .await
            .unwrap();
        assert_eq!(slices.len(), 2);
    }

    #[tokio::test]
    async fn tail_revisions_are_appended() {
        let versions = vec![snap(0, "a", "s", "start")];
        let revisions = vec![revision("r1", Some(30), "finished elsewhere")];

        let slices = VersionSlicer::default()
            .slice(&versions, &revisions, &CopyConverter)
            .await
            .unwrap();

        assert_eq!(reasons(&slices), vec![SliceStartReason::Start, SliceStartReason::EditedOutsideOfSystem]);
        assert_eq!(slices[1].last().unwrap().plain_text, "finished elsewhere");
    }

    #[tokio::test]
    async fn untimestamped_revision_is_skipped() {
        let versions = vec![snap(0, "a", "s", "start")];
        let revisions = vec![revision("r1", None, "floating")];

        let slices = VersionSlicer::default()
            .slice(&versions, &revisions, &CopyConverter)
            .await
            .unwrap();
        assert_eq!(slices.len(), 1);
    }

    #[tokio::test]
    async fn configured_gap_is_respected() {
        let config = draftline_config::TimelineConfig {
            slice_gap_hours: 2,
            ..Default::default()
        };
        let versions = vec![snap(0, "a", "s", "x"), snap(3, "a", "s", "y")];
        let slices = VersionSlicer::from_config(&config)
            .slice(&versions, &[], &CopyConverter)
            .await
            .unwrap();
        assert_eq!(reasons(&slices), vec![SliceStartReason::Start, SliceStartReason::TimeDifference]);
    }

    #[test]
    fn oversized_gap_is_clamped() {
        let config = draftline_config::TimelineConfig {
            slice_gap_hours: i64::MAX,
            ..Default::default()
        };
        let slicer = VersionSlicer::from_config(&config);
        assert_eq!(slicer.gap, Duration::hours(draftline_config::MAX_SLICE_GAP_HOURS));
    }
}
