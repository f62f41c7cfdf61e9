//! # Draftline Timeline
//!
//! The timeline engine: slices a document's snapshot history into editing
//! episodes, picks keyframes whose outlines anchor the rest, and assembles
//! the annotated timeline batch by batch.

pub mod assembler;
pub mod diff;
pub mod generation;
pub mod keyframes;
pub mod slicer;

#[cfg(test)]
mod test_helpers;

pub use assembler::TimelineAssembler;
pub use diff::{DiffStats, MajorChangeThresholds, text_major_change, word_diff};
pub use generation::{Generator, NO_CHANGES_SUMMARY, outline_schema};
pub use keyframes::{KeyframeIndex, KeyframeSelector};
pub use slicer::VersionSlicer;
