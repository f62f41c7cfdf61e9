//! Completion provider backends for Draftline.
//!
//! All backends implement `draftline_core::CompletionProvider`.
//! The registry selects a backend by name; the conformance executor wraps
//! whichever one is selected.

pub mod anthropic;
pub mod conformance;
pub mod openai_compat;
pub mod registry;

pub use anthropic::AnthropicProvider;
pub use conformance::{ConformanceExecutor, strip_json_fence};
pub use openai_compat::OpenAiCompatProvider;
pub use registry::{ProviderRegistry, build_from_config};
