//! Reference collaborator implementations for Draftline.
//!
//! In-memory and file-backed job/timeline stores, plus a document source
//! reading a JSON export.

pub mod file_backend;
pub mod in_memory;
pub mod json_source;

#[cfg(test)]
mod test_support;

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;
pub use json_source::{DocumentExport, JsonDocumentSource};
