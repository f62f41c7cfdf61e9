//! # Draftline Core
//!
//! Domain types, collaborator traits, and error definitions for the Draftline
//! authorship timeline engine. This crate does **no I/O**: it
//! defines the model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (completion backends, document sources, job and
//! timeline stores) is a trait here. Implementations live in their respective
//! crates, so the engine can be driven by real backends or by test doubles.

pub mod document;
pub mod error;
pub mod provider;
pub mod store;
pub mod timeline;

// Re-export key types at crate root for ergonomics
pub use document::{DocumentSource, ExternalRevision, RevisionConverter, VersionSnapshot};
pub use error::{PersistenceError, ProviderError, Result, SourceError, TimelineError};
pub use provider::{
    CompletionProvider, CompletionRequest, CompletionResult, OutputKind, PromptSegment, Role,
    TokenUsage,
};
pub use store::{Job, JobStatus, JobStore, TimelineStore};
pub use timeline::{
    GenerationStatus, Keyframe, Slice, SliceStartReason, TimelineDocument, TimelinePoint,
};
