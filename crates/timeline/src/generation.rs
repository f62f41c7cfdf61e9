//! Change-summary and reverse-outline generation.
//!
//! Builds the completion requests for both halves of a timeline point and
//! runs them through the conformance executor. Outlines are JSON validated
//! against [`outline_schema`]; summaries are plain text.

use std::sync::Arc;

use draftline_core::error::ProviderError;
use draftline_core::provider::{CompletionRequest, PromptSegment};
use draftline_providers::ConformanceExecutor;
use tracing::debug;

/// Summary used when a version's text is identical to its predecessor's.
pub const NO_CHANGES_SUMMARY: &str = "No changes from previous version";

const SUMMARY_SYSTEM_ROLE: &str = "You are a writing tutor reviewing the revision history of a \
student's document. You describe what changed between two saved versions.";

const OUTLINE_SYSTEM_ROLE: &str = "You are a writing tutor producing reverse outlines. A reverse \
outline lists the document's thesis and, in order, each claim it makes with the evidence offered \
for that claim.";

/// JSON Schema every reverse outline must satisfy.
pub fn outline_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["thesis", "claims"],
        "properties": {
            "thesis": { "type": "string" },
            "claims": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["claim", "evidence"],
                    "properties": {
                        "claim": { "type": "string" },
                        "evidence": { "type": "array", "items": { "type": "string" } }
                    }
                }
            }
        }
    })
}

/// Request for a short description of how `current` differs from `previous`.
pub fn change_summary_request(model: &str, previous: &str, current: &str) -> CompletionRequest {
    let previous_prompt = if previous.is_empty() {
        "There is no previous version; the document below is the first saved draft.".to_string()
    } else {
        format!("Previous version:\n\n{previous}")
    };

    CompletionRequest::new(model)
        .with_system_role(SUMMARY_SYSTEM_ROLE)
        .with_source_document(current)
        .with_prompt(PromptSegment::user(previous_prompt))
        .with_prompt(PromptSegment::user("Current version:").with_source_document())
        .with_prompt(PromptSegment::user(
            "Summarize the changes from the previous version to the current version.",
        ))
        .with_format_hint("Answer in two or three plain sentences without headings or lists.")
}

/// Request for a structured reverse outline of `text`.
///
/// `seed` is an outline of an earlier version, passed for continuity.
pub fn reverse_outline_request(model: &str, text: &str, seed: Option<&str>) -> CompletionRequest {
    let mut request = CompletionRequest::new(model)
        .with_system_role(OUTLINE_SYSTEM_ROLE)
        .with_source_document(text);

    if let Some(seed) = seed {
        request = request.with_prompt(PromptSegment::user(format!(
            "Here is the reverse outline of an earlier version of this document. Keep its \
             wording wherever the document has not changed:\n\n{seed}"
        )));
    }

    request
        .with_prompt(PromptSegment::user("Write the reverse outline of this document:").with_source_document())
        .expect_json(Some(outline_schema()))
}

/// Generates both halves of a timeline point through one executor.
pub struct Generator {
    executor: Arc<ConformanceExecutor>,
    model: String,
}

impl Generator {
    pub fn new(executor: Arc<ConformanceExecutor>, model: impl Into<String>) -> Self {
        Self {
            executor,
            model: model.into(),
        }
    }

    /// Summarize the change from `previous` to `current`.
    ///
    /// Identical texts get [`NO_CHANGES_SUMMARY`] without a provider call.
    pub async fn change_summary(
        &self,
        previous: &str,
        current: &str,
    ) -> std::result::Result<String, ProviderError> {
        if previous == current {
            return Ok(NO_CHANGES_SUMMARY.to_string());
        }

        let result = self
            .executor
            .complete(change_summary_request(&self.model, previous, current))
            .await?;
        debug!(tokens = result.usage.total, "Generated change summary");
        Ok(result.answer.trim().to_string())
    }

    pub async fn reverse_outline(
        &self,
        text: &str,
        seed: Option<&str>,
    ) -> std::result::Result<String, ProviderError> {
        let result = self
            .executor
            .complete(reverse_outline_request(&self.model, text, seed))
            .await?;
        debug!(tokens = result.usage.total, seeded = seed.is_some(), "Generated reverse outline");
        Ok(result.answer)
    }
}
