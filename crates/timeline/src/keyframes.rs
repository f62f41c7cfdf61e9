//! Keyframes: the sparse set of points whose reverse outline is built from
//! scratch. Every other point's outline is generated against the nearest
//! earlier keyframe for continuity.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use draftline_core::error::ProviderError;
use draftline_core::timeline::{Keyframe, TimelinePoint};
use futures::future::join_all;
use tracing::{debug, info};

use crate::diff::{MajorChangeThresholds, text_major_change};
use crate::generation::Generator;

/// Keyframes sorted ascending by time.
#[derive(Debug, Clone, Default)]
pub struct KeyframeIndex {
    keyframes: Vec<Keyframe>,
}

impl KeyframeIndex {
    pub fn new(mut keyframes: Vec<Keyframe>) -> Self {
        keyframes.sort_by_key(|k| k.time);
        Self { keyframes }
    }

    /// The latest keyframe not after `time`.
    pub fn keyframe_for_time(&self, time: DateTime<Utc>) -> Option<&Keyframe> {
        self.keyframes.iter().rev().find(|k| k.time <= time)
    }

    /// The keyframe taken at exactly `time`.
    pub fn exact(&self, time: DateTime<Utc>) -> Option<&Keyframe> {
        self.keyframes.iter().find(|k| k.time == time)
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keyframe> {
        self.keyframes.iter()
    }
}

/// How one keyframe gets its outline.
enum Plan<'a> {
    Reuse(Keyframe),
    Generate {
        time: DateTime<Utc>,
        text: &'a str,
        seed: Option<String>,
    },
}

/// Picks keyframes and produces their outlines.
pub struct KeyframeSelector {
    generator: Arc<Generator>,
    thresholds: MajorChangeThresholds,
}

impl KeyframeSelector {
    pub fn new(generator: Arc<Generator>, thresholds: MajorChangeThresholds) -> Self {
        Self {
            generator,
            thresholds,
        }
    }

    /// Build the keyframe index for `points` (sorted by `version_time`).
    ///
    /// The first point with text or an outline is always a keyframe; later
    /// points become keyframes when their text changed majorly. Existing
    /// outlines are reused; missing ones are generated concurrently.
    pub async fn generate_keyframes(
        &self,
        points: &[TimelinePoint],
    ) -> std::result::Result<KeyframeIndex, ProviderError> {
        let Some(first) = points
            .iter()
            .position(|p| !p.text().is_empty() || p.has_outline())
        else {
            return Ok(KeyframeIndex::default());
        };

        let mut plans = vec![plan_for(&points[first], None)];
        let mut known_outline = reused_outline(&plans[0]);

        for pair in points[first..].windows(2) {
            let (previous, point) = (&pair[0], &pair[1]);
            if !text_major_change(previous.text(), point.text(), &self.thresholds) {
                continue;
            }
            let plan = plan_for(point, known_outline.clone());
            if let Some(outline) = reused_outline(&plan) {
                known_outline = Some(outline);
            }
            plans.push(plan);
        }

        let to_generate = plans
            .iter()
            .filter(|p| matches!(p, Plan::Generate { .. }))
            .count();
        debug!(
            keyframes = plans.len(),
            generating = to_generate,
            "Selected keyframes"
        );

        let results = join_all(plans.into_iter().map(|plan| async move {
            let keyframe = match plan {
                Plan::Reuse(keyframe) => keyframe,
                Plan::Generate { time, text, seed } => Keyframe {
                    time,
                    reverse_outline: self.generator.reverse_outline(text, seed.as_deref()).await?,
                },
            };
            Ok::<Keyframe, ProviderError>(keyframe)
        }))
        .await;

        let keyframes = results.into_iter().collect::<std::result::Result<Vec<_>, _>>()?;

        if to_generate > 0 {
            info!(generated = to_generate, total = keyframes.len(), "Generated keyframe outlines");
        }

        Ok(KeyframeIndex::new(keyframes))
    }
}

fn plan_for(point: &TimelinePoint, seed: Option<String>) -> Plan<'_> {
    if point.has_outline() {
        Plan::Reuse(Keyframe {
            time: point.version_time,
            reverse_outline: point.reverse_outline.clone(),
        })
    } else {
        Plan::Generate {
            time: point.version_time,
            text: point.text(),
            seed,
        }
    }
}

fn reused_outline(plan: &Plan<'_>) -> Option<String> {
    match plan {
        Plan::Reuse(keyframe) => Some(keyframe.reverse_outline.clone()),
        Plan::Generate { .. } => None,
    }
}
