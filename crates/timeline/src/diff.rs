//! Word-level change statistics and the major-change predicate.
//!
//! Uses `similar`'s word tokenizer, which yields word and whitespace tokens.
//! Tokens are grouped into runs of the same tag ("parts"); a part weighs as
//! many words as it has single-space separated fields, so an inserted or
//! deleted run also carries the separator that joins it to its neighbour.

use similar::{ChangeTag, TextDiff};

/// Counts derived from a word diff of two texts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub changed_words: usize,
    pub total_words: usize,
    /// Contiguous inserted or deleted runs.
    pub change_spans: usize,
}

impl DiffStats {
    pub fn percent_changed(&self) -> f64 {
        if self.total_words == 0 {
            return 0.0;
        }
        self.changed_words as f64 / self.total_words as f64 * 100.0
    }
}

/// When a change between two versions is big enough to warrant a new keyframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MajorChangeThresholds {
    /// Texts shorter than this never count as a major change.
    pub min_words: usize,
    pub percent_threshold: f64,
    pub span_threshold: usize,
}

impl Default for MajorChangeThresholds {
    fn default() -> Self {
        Self {
            min_words: 100,
            percent_threshold: 20.0,
            span_threshold: 100,
        }
    }
}

impl From<&draftline_config::MajorChangeConfig> for MajorChangeThresholds {
    fn from(config: &draftline_config::MajorChangeConfig) -> Self {
        Self {
            min_words: config.min_words,
            percent_threshold: config.percent_threshold,
            span_threshold: config.span_threshold,
        }
    }
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Diff two texts word by word after whitespace normalization.
pub fn word_diff(previous: &str, current: &str) -> DiffStats {
    let previous = normalize_whitespace(previous);
    let current = normalize_whitespace(current);
    let diff = TextDiff::from_words(previous.as_str(), current.as_str());

    let mut parts: Vec<(ChangeTag, String)> = Vec::new();
    for change in diff.iter_all_changes() {
        match parts.last_mut() {
            Some((tag, value)) if *tag == change.tag() => value.push_str(change.value()),
            _ => parts.push((change.tag(), change.value().to_string())),
        }
    }

    let mut stats = DiffStats::default();
    for (tag, value) in &parts {
        let words = value.split(' ').count();
        stats.total_words += words;
        if *tag != ChangeTag::Equal {
            stats.changed_words += words;
            stats.change_spans += 1;
        }
    }
    stats
}

/// Whether `current` differs from `previous` enough to need a fresh outline.
pub fn text_major_change(previous: &str, current: &str, thresholds: &MajorChangeThresholds) -> bool {
    if current.split_whitespace().count() < thresholds.min_words {
        return false;
    }

    let stats = word_diff(previous, current);
    stats.percent_changed() > thresholds.percent_threshold
        || stats.change_spans > thresholds.span_threshold
}
