//! The timeline assembler: slices a document's history, merges it with any
//! stored timeline, and fills in summaries and outlines batch by batch,
//! checkpointing progress to the job store after every batch.

use std::sync::Arc;

use draftline_core::document::{DocumentSource, ExternalRevision};
use draftline_core::error::{ProviderError, Result, TimelineError};
use draftline_core::store::{JobStatus, JobStore, TimelineStore};
use draftline_core::timeline::{GenerationStatus, Slice, TimelineDocument, TimelinePoint};
use draftline_providers::ConformanceExecutor;
use futures::future::{join, join_all};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::diff::MajorChangeThresholds;
use crate::generation::Generator;
use crate::keyframes::{KeyframeIndex, KeyframeSelector};
use crate::slicer::VersionSlicer;

pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Generated halves for one point; `None` means the half was already complete.
struct PointUpdate {
    index: usize,
    change_summary: Option<String>,
    reverse_outline: Option<String>,
}

/// Builds and incrementally completes authorship timelines.
///
/// Constructed once with its collaborators and reused across jobs.
pub struct TimelineAssembler {
    generator: Arc<Generator>,
    selector: KeyframeSelector,
    slicer: VersionSlicer,
    timeline_store: Arc<dyn TimelineStore>,
    job_store: Arc<dyn JobStore>,
    batch_size: usize,
}

impl TimelineAssembler {
    pub fn new(
        executor: ConformanceExecutor,
        model: impl Into<String>,
        timeline_store: Arc<dyn TimelineStore>,
        job_store: Arc<dyn JobStore>,
    ) -> Self {
        let generator = Arc::new(Generator::new(Arc::new(executor), model));
        Self {
            selector: KeyframeSelector::new(generator.clone(), MajorChangeThresholds::default()),
            generator,
            slicer: VersionSlicer::default(),
            timeline_store,
            job_store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Apply batch size, slice gap and major-change thresholds from config.
    pub fn with_config(self, config: &draftline_config::TimelineConfig) -> Self {
        self.with_batch_size(config.batch_size)
            .with_slicer(VersionSlicer::from_config(config))
            .with_thresholds(MajorChangeThresholds::from(&config.major_change))
    }

    /// K: points taken from each end of the pending list per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_slicer(mut self, slicer: VersionSlicer) -> Self {
        self.slicer = slicer;
        self
    }

    pub fn with_thresholds(mut self, thresholds: MajorChangeThresholds) -> Self {
        self.selector = KeyframeSelector::new(self.generator.clone(), thresholds);
        self
    }

    /// Build or resume the timeline for one document.
    ///
    /// On failure the job is marked FAILED with the error's message before
    /// the error is returned. Batches checkpointed earlier stay in the job.
    pub async fn get_document_timeline(
        &self,
        job_id: &str,
        user_id: &str,
        document_id: &str,
        external_revisions: &[ExternalRevision],
        source: &dyn DocumentSource,
    ) -> Result<TimelineDocument> {
        let span = info_span!("timeline_job", job_id = %job_id, user_id = %user_id, document_id = %document_id);

        async move {
            match self
                .assemble(job_id, user_id, document_id, external_revisions, source)
                .await
            {
                Ok(timeline) => Ok(timeline),
                Err(e) => {
                    error!(error = %e, "Timeline job failed");
                    if let Err(write_err) = self.job_store.write_failure(job_id, &e.to_string()).await {
                        error!(error = %write_err, "Failed to record job failure");
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn assemble(
        &self,
        job_id: &str,
        user_id: &str,
        document_id: &str,
        external_revisions: &[ExternalRevision],
        source: &dyn DocumentSource,
    ) -> Result<TimelineDocument> {
        // ── Slicing ──
        let versions = source.fetch_snapshots(document_id).await?;
        let slices = self
            .slicer
            .slice(&versions, external_revisions, source)
            .await?;
        let fresh: Vec<TimelinePoint> = slices.iter().filter_map(Slice::to_point).collect();
        info!(
            snapshots = versions.len(),
            slices = slices.len(),
            "Sliced document history"
        );

        // ── Merge with the stored timeline ──
        let existing = self
            .timeline_store
            .fetch_existing(user_id, document_id)
            .await?;
        let mut points = merge_existing(fresh, existing.as_ref());
        points.sort_by_key(|p| p.version_time);

        // ── Keyframes ──
        let keyframes = self.selector.generate_keyframes(&points).await?;

        // ── Generation ──
        let limit = points.len() / self.batch_size + 1;
        let mut iterations = 0;
        let mut pending = self.restrict(pending_indices(&points));

        while !pending.is_empty() {
            iterations += 1;
            if iterations > limit {
                return Err(TimelineError::LoopExceeded { iterations, limit });
            }

            debug!(iteration = iterations, batch = pending.len(), "Generating batch");

            let results = join_all(
                pending
                    .iter()
                    .map(|&index| self.generate_point(&points, index, &keyframes)),
            )
            .await;
            let updates = results
                .into_iter()
                .collect::<std::result::Result<Vec<_>, ProviderError>>()?;

            for update in updates {
                apply_update(&mut points[update.index], update);
            }
            backfill_outlines(&mut points);

            let remaining = pending_indices(&points);
            info!(
                iteration = iterations,
                generated = pending.len(),
                remaining = remaining.len(),
                "Batch complete"
            );

            if !remaining.is_empty() {
                let progress = TimelineDocument::new(document_id, user_id, points.clone());
                self.job_store
                    .write_progress(job_id, &progress, JobStatus::InProgress)
                    .await?;
            }
            pending = self.restrict(remaining);
        }

        // ── Finish ──
        backfill_outlines(&mut points);
        let timeline = TimelineDocument::new(document_id, user_id, points);
        self.job_store
            .write_progress(job_id, &timeline, JobStatus::Complete)
            .await?;

        if let Err(e) = self.timeline_store.persist(&timeline).await {
            warn!(error = %e, "Failed to persist completed timeline");
        }

        info!(points = timeline.timeline_points.len(), "Timeline complete");
        Ok(timeline)
    }

    /// Keep the first K and last K pending points when there are more than 2K.
    fn restrict(&self, pending: Vec<usize>) -> Vec<usize> {
        let k = self.batch_size;
        if pending.len() <= 2 * k {
            return pending;
        }
        let mut restricted = pending[..k].to_vec();
        restricted.extend_from_slice(&pending[pending.len() - k..]);
        restricted
    }

    /// Produce whichever halves of `points[index]` are still incomplete.
    async fn generate_point(
        &self,
        points: &[TimelinePoint],
        index: usize,
        keyframes: &KeyframeIndex,
    ) -> std::result::Result<PointUpdate, ProviderError> {
        let point = &points[index];
        let previous_text = match index {
            0 => "",
            _ => points[index - 1].text(),
        };

        let summary = async {
            if point.change_summary_status.is_completed() {
                return Ok(None);
            }
            self.generator
                .change_summary(previous_text, point.text())
                .await
                .map(Some)
        };

        let outline = async {
            if point.reverse_outline_status.is_completed() {
                return Ok(None);
            }
            if let Some(keyframe) = keyframes.exact(point.version_time) {
                return Ok(Some(keyframe.reverse_outline.clone()));
            }
            if point.text() == previous_text {
                // Deferred: filled from a twin point once one has an outline.
                return Ok(Some(String::new()));
            }
            let seed = keyframes
                .keyframe_for_time(point.version_time)
                .map(|k| k.reverse_outline.as_str());
            self.generator
                .reverse_outline(point.text(), seed)
                .await
                .map(Some)
        };

        let (change_summary, reverse_outline) = join(summary, outline).await;
        Ok(PointUpdate {
            index,
            change_summary: change_summary?,
            reverse_outline: reverse_outline?,
        })
    }
}

/// Replace fresh points with stored ones for the same document version.
fn merge_existing(
    fresh: Vec<TimelinePoint>,
    existing: Option<&TimelineDocument>,
) -> Vec<TimelinePoint> {
    let Some(existing) = existing else {
        return fresh;
    };

    let mut reused = 0;
    let merged: Vec<TimelinePoint> = fresh
        .into_iter()
        .map(|point| {
            match existing
                .timeline_points
                .iter()
                .find(|stored| stored.same_version(&point))
            {
                Some(stored) => {
                    reused += 1;
                    stored.clone()
                }
                None => point,
            }
        })
        .collect();

    debug!(reused, total = merged.len(), "Merged stored timeline");
    merged
}

fn pending_indices(points: &[TimelinePoint]) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_pending())
        .map(|(i, _)| i)
        .collect()
}

fn apply_update(point: &mut TimelinePoint, update: PointUpdate) {
    if let Some(summary) = update.change_summary {
        point.change_summary = summary;
        point.change_summary_status = GenerationStatus::Completed;
    }
    if let Some(outline) = update.reverse_outline {
        if !outline.is_empty() {
            point.reverse_outline = outline;
        }
        point.reverse_outline_status = GenerationStatus::Completed;
    }
}

/// Give outline-less points the outline of any point with identical text.
fn backfill_outlines(points: &mut [TimelinePoint]) {
    for i in 0..points.len() {
        if points[i].has_outline() {
            continue;
        }
        let twin = points
            .iter()
            .find(|other| other.has_outline() && other.text() == points[i].text())
            .map(|other| other.reverse_outline.clone());
        if let Some(outline) = twin {
            points[i].reverse_outline = outline;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::NO_CHANGES_SUMMARY;
    use crate::test_helpers::*;
    use async_trait::async_trait;
    use draftline_core::document::{RevisionConverter, VersionSnapshot};
    use draftline_core::error::SourceError;
    use draftline_core::timeline::SliceStartReason;

    /// Serves a fixed snapshot list. Each snapshot gets its own activity so
    /// every snapshot becomes its own slice.
    struct FixedSource {
        snapshots: Vec<VersionSnapshot>,
    }

    impl FixedSource {
        fn distinct(texts: &[&str]) -> Self {
            let snapshots = texts
                .iter()
                .enumerate()
                .map(|(i, text)| {
                    let mut snap = snapshot(i as i64, text);
                    snap.activity_id = format!("activity-{i}");
                    snap
                })
                .collect();
            Self { snapshots }
        }
    }

    #[async_trait]
    impl RevisionConverter for FixedSource {
        async fn materialize(
            &self,
            revision: &ExternalRevision,
            last_known: &VersionSnapshot,
        ) -> std::result::Result<VersionSnapshot, SourceError> {
            Err(SourceError::Materialize {
                revision_id: revision.id.clone(),
                reason: format!("not supported after {}", last_known.created_at),
            })
        }
    }

    #[async_trait]
    impl DocumentSource for FixedSource {
        async fn fetch_snapshots(
            &self,
            _document_id: &str,
        ) -> std::result::Result<Vec<VersionSnapshot>, SourceError> {
            Ok(self.snapshots.clone())
        }

        async fn fetch_external_revisions(
            &self,
            _document_id: &str,
        ) -> std::result::Result<Vec<ExternalRevision>, SourceError> {
            Ok(vec![])
        }
    }

    struct Harness {
        provider: Arc<ScriptedProvider>,
        jobs: Arc<RecordingJobStore>,
        timelines: Arc<MapTimelineStore>,
        assembler: TimelineAssembler,
    }

    fn harness(provider: ScriptedProvider, timelines: MapTimelineStore) -> Harness {
        let provider = Arc::new(provider);
        let jobs = Arc::new(RecordingJobStore::default());
        let timelines = Arc::new(timelines);
        let assembler = TimelineAssembler::new(
            ConformanceExecutor::new(provider.clone()),
            "test-model",
            timelines.clone(),
            jobs.clone(),
        );
        Harness {
            provider,
            jobs,
            timelines,
            assembler,
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Draft number {i}")).collect()
    }

    #[test]
    fn restrict_keeps_both_ends() {
        let h = harness(ScriptedProvider::new(), MapTimelineStore::default());
        let assembler = h.assembler.with_batch_size(2);
        assert_eq!(assembler.restrict((0..4).collect()), vec![0, 1, 2, 3]);
        assert_eq!(assembler.restrict((0..7).collect()), vec![0, 1, 5, 6]);
    }

    #[test]
    fn backfill_copies_from_identical_text() {
        let mut points = vec![
            TimelinePoint::new(SliceStartReason::Start, snapshot(0, "same")),
            TimelinePoint::new(SliceStartReason::NewActivity, snapshot(1, "same")),
        ];
        points[1].reverse_outline = "outline".into();
        backfill_outlines(&mut points);
        assert_eq!(points[0].reverse_outline, "outline");
    }

    #[tokio::test]
    async fn batches_large_histories_with_checkpoints() {
        let h = harness(ScriptedProvider::new(), MapTimelineStore::default());
        let texts = texts(16);
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let source = FixedSource::distinct(&refs);

        let timeline = h
            .assembler
            .get_document_timeline("job-1", "user-1", "doc-1", &[], &source)
            .await
            .unwrap();

        assert!(timeline.is_complete());
        assert_eq!(timeline.timeline_points.len(), 16);

        let writes = h.jobs.writes.lock().unwrap();
        assert_eq!(writes.len(), 2);

        let (status, first) = &writes[0];
        assert_eq!(*status, JobStatus::InProgress);
        for (i, point) in first.timeline_points.iter().enumerate() {
            assert_eq!(point.is_pending(), (5..=10).contains(&i), "point {i}");
        }

        let (status, last) = &writes[1];
        assert_eq!(*status, JobStatus::Complete);
        assert!(last.is_complete());

        assert_eq!(h.provider.summary_calls(), 16);
        assert_eq!(h.provider.outline_calls(), 16);

        // Only the first point is a keyframe; every later outline is seeded by it.
        let mut seeded = h.provider.seeded_outlines();
        seeded.sort();
        let mut expected = texts[1..].to_vec();
        expected.sort();
        assert_eq!(seeded, expected);
        assert!(h.timelines.timelines.lock().unwrap().contains_key(&("user-1".to_string(), "doc-1".to_string())));
    }

    #[tokio::test]
    async fn stored_timeline_is_reused_without_calls() {
        let texts = texts(4);
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let source = FixedSource::distinct(&refs);

        let first = harness(ScriptedProvider::new(), MapTimelineStore::default());
        let stored = first
            .assembler
            .get_document_timeline("job-1", "user-1", "doc-1", &[], &source)
            .await
            .unwrap();

        let timelines = MapTimelineStore::default();
        timelines
            .timelines
            .lock()
            .unwrap()
            .insert(("user-1".into(), "doc-1".into()), stored.clone());
        let second = harness(ScriptedProvider::new(), timelines);

        let timeline = second
            .assembler
            .get_document_timeline("job-2", "user-1", "doc-1", &[], &source)
            .await
            .unwrap();

        assert_eq!(timeline, stored);
        assert_eq!(second.provider.total_calls(), 0);
        let writes = second.jobs.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, JobStatus::Complete);
    }

    #[tokio::test]
    async fn only_incomplete_half_is_generated() {
        let source = FixedSource::distinct(&["first", "second"]);

        let mut stored_points: Vec<TimelinePoint> = source
            .snapshots
            .iter()
            .map(|s| TimelinePoint::new(SliceStartReason::Start, s.clone()))
            .collect();
        for point in &mut stored_points {
            point.change_summary = "kept summary".into();
            point.change_summary_status = GenerationStatus::Completed;
        }
        let timelines = MapTimelineStore::default();
        timelines.timelines.lock().unwrap().insert(
            ("user-1".into(), "doc-1".into()),
            TimelineDocument::new("doc-1", "user-1", stored_points),
        );
        let h = harness(ScriptedProvider::new(), timelines);

        let timeline = h
            .assembler
            .get_document_timeline("job-1", "user-1", "doc-1", &[], &source)
            .await
            .unwrap();

        assert_eq!(h.provider.summary_calls(), 0);
        assert_eq!(h.provider.outline_calls(), 2);
        assert!(timeline.timeline_points.iter().all(|p| p.change_summary == "kept summary"));
        assert!(timeline.is_complete());
    }

    #[tokio::test]
    async fn stored_points_are_matched_by_version_time() {
        let texts = texts(4);
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let source = FixedSource::distinct(&refs);

        // Stored history lacks t0 and t2, so positions no longer line up.
        let stored_points: Vec<TimelinePoint> = [1, 3]
            .iter()
            .map(|&i| {
                let mut point =
                    TimelinePoint::new(SliceStartReason::NewActivity, source.snapshots[i].clone());
                point.change_summary = format!("stored summary {i}");
                point.change_summary_status = GenerationStatus::Completed;
                point.reverse_outline = format!("stored outline {i}");
                point.reverse_outline_status = GenerationStatus::Completed;
                point
            })
            .collect();
        let timelines = MapTimelineStore::default();
        timelines.timelines.lock().unwrap().insert(
            ("user-1".into(), "doc-1".into()),
            TimelineDocument::new("doc-1", "user-1", stored_points.clone()),
        );
        let h = harness(ScriptedProvider::new(), timelines);

        let timeline = h
            .assembler
            .get_document_timeline("job-1", "user-1", "doc-1", &[], &source)
            .await
            .unwrap();

        let points = &timeline.timeline_points;
        assert_eq!(points.len(), 4);
        assert_eq!(points[1], stored_points[0]);
        assert_eq!(points[3], stored_points[1]);
        for i in [0, 2] {
            assert_eq!(points[i].version_time, at(i as i64));
            assert!(!points[i].change_summary.starts_with("stored"), "point {i}");
            assert!(!points[i].reverse_outline.starts_with("stored"), "point {i}");
        }

        // t0 is the keyframe; t2 needs its own outline. Both need summaries.
        assert_eq!(h.provider.summary_calls(), 2);
        assert_eq!(h.provider.outline_calls(), 2);
        assert!(timeline.is_complete());
    }

    #[tokio::test]
    async fn identical_versions_share_outline() {
        let h = harness(ScriptedProvider::new(), MapTimelineStore::default());
        let source = FixedSource::distinct(&["An essay", "An essay", "An essay, revised"]);

        let timeline = h
            .assembler
            .get_document_timeline("job-1", "user-1", "doc-1", &[], &source)
            .await
            .unwrap();

        let points = &timeline.timeline_points;
        assert_eq!(points[1].change_summary, NO_CHANGES_SUMMARY);
        assert_eq!(points[1].reverse_outline, points[0].reverse_outline);
        assert!(points[1].has_outline());
        assert_eq!(h.provider.summary_calls(), 2);
        assert_eq!(h.provider.outline_calls(), 2);
    }

    #[tokio::test]
    async fn provider_failure_marks_job_failed() {
        let h = harness(ScriptedProvider::failing_on("broken"), MapTimelineStore::default());
        let source = FixedSource::distinct(&["fine", "broken draft"]);

        let err = h
            .assembler
            .get_document_timeline("job-1", "user-1", "doc-1", &[], &source)
            .await
            .unwrap_err();

        assert!(matches!(err, TimelineError::Provider(ProviderError::ApiError { .. })));
        let failures = h.jobs.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0], err.to_string());
        assert!(h.timelines.timelines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn persist_failure_does_not_fail_job() {
        let timelines = MapTimelineStore {
            fail_persist: true,
            ..Default::default()
        };
        let h = harness(ScriptedProvider::new(), timelines);
        let source = FixedSource::distinct(&["one", "two"]);

        let timeline = h
            .assembler
            .get_document_timeline("job-1", "user-1", "doc-1", &[], &source)
            .await
            .unwrap();

        assert!(timeline.is_complete());
        let writes = h.jobs.writes.lock().unwrap();
        assert_eq!(writes.last().unwrap().0, JobStatus::Complete);
    }

    #[tokio::test]
    async fn empty_history_completes_immediately() {
        let h = harness(ScriptedProvider::new(), MapTimelineStore::default());
        let source = FixedSource::distinct(&[]);

        let timeline = h
            .assembler
            .get_document_timeline("job-1", "user-1", "doc-1", &[], &source)
            .await
            .unwrap();

        assert!(timeline.timeline_points.is_empty());
        assert_eq!(h.provider.total_calls(), 0);
        assert_eq!(h.jobs.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn source_error_is_recorded() {
        let h = harness(ScriptedProvider::new(), MapTimelineStore::default());
        let source = FixedSource::distinct(&["a"]);
        let revisions = vec![ExternalRevision {
            id: "ext-1".into(),
            modified_time: Some(at(30)),
            plain_text: Some("edited elsewhere".into()),
        }];

        let err = h
            .assembler
            .get_document_timeline("job-1", "user-1", "doc-1", &revisions, &source)
            .await
            .unwrap_err();

        assert!(matches!(err, TimelineError::Source(SourceError::Materialize { .. })));
        assert_eq!(h.jobs.failures.lock().unwrap().len(), 1);
    }
}
