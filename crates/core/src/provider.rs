//! The CompletionProvider trait: the abstraction over AI text-completion backends.
//!
//! A provider turns a generic [`CompletionRequest`] into a single answer.
//! Each backend adapter owns the translation to and from its own wire format;
//! callers only ever see the shapes defined here.
//!
//! Implementations: OpenAI-compatible endpoints, Anthropic Messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Who a prompt segment is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One ordered piece of prompt content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSegment {
    pub text: String,
    pub role: Role,

    /// Append the request's source document to this segment when rendering.
    #[serde(default)]
    pub include_source_document: bool,
}

impl PromptSegment {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: Role::User,
            include_source_document: false,
        }
    }

    pub fn with_source_document(mut self) -> Self {
        self.include_source_document = true;
        self
    }

    /// The segment text with the source document appended if requested.
    pub fn render(&self, source_document: Option<&str>) -> String {
        match (self.include_source_document, source_document) {
            (true, Some(doc)) => format!("{}\n\n{}", self.text, doc),
            _ => self.text.clone(),
        }
    }
}

/// The shape the answer must take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputKind {
    #[default]
    Text,
    Json,
}

/// A provider-agnostic completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    /// System instruction, sent the way the backend expects system prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_role: Option<String>,

    /// Ordered prompt segments.
    pub prompts: Vec<PromptSegment>,

    #[serde(default)]
    pub output_kind: OutputKind,

    /// JSON Schema the answer must satisfy (only meaningful for JSON output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,

    /// Free-form description of the expected answer format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format_hint: Option<String>,

    /// A prior answer to continue from, sent as an assistant turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_output: Option<String>,

    /// The model to use (e.g. "gpt-4o-mini", "claude-sonnet-4").
    pub target_model: String,

    #[serde(default)]
    pub allow_web_search: bool,

    /// Document text appended to segments flagged `include_source_document`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document: Option<String>,

    /// Sampling temperature; `None` leaves the backend default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(target_model: impl Into<String>) -> Self {
        Self {
            system_role: None,
            prompts: Vec::new(),
            output_kind: OutputKind::Text,
            response_schema: None,
            response_format_hint: None,
            previous_output: None,
            target_model: target_model.into(),
            allow_web_search: false,
            source_document: None,
            temperature: None,
        }
    }

    pub fn with_system_role(mut self, system_role: impl Into<String>) -> Self {
        self.system_role = Some(system_role.into());
        self
    }

    pub fn with_prompt(mut self, prompt: PromptSegment) -> Self {
        self.prompts.push(prompt);
        self
    }

    pub fn with_source_document(mut self, document: impl Into<String>) -> Self {
        self.source_document = Some(document.into());
        self
    }

    /// Require a JSON answer, optionally validated against `schema`.
    pub fn expect_json(mut self, schema: Option<serde_json::Value>) -> Self {
        self.output_kind = OutputKind::Json;
        self.response_schema = schema;
        self
    }

    pub fn with_format_hint(mut self, hint: impl Into<String>) -> Self {
        self.response_format_hint = Some(hint.into());
        self
    }

    /// Prompt segments rendered with the source document applied.
    pub fn rendered_prompts(&self) -> Vec<(Role, String)> {
        self.prompts
            .iter()
            .map(|p| (p.role, p.render(self.source_document.as_deref())))
            .collect()
    }
}

/// Token accounting. `-1` means the backend did not report the figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: i64,
    pub completion: i64,
    pub total: i64,
}

impl Default for TokenUsage {
    fn default() -> Self {
        Self {
            prompt: -1,
            completion: -1,
            total: -1,
        }
    }
}

/// A completed answer plus the raw exchange for auditing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    pub answer: String,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default)]
    pub raw_request: serde_json::Value,
    #[serde(default)]
    pub raw_response: serde_json::Value,
}

/// The core CompletionProvider trait.
///
/// Every backend implements this trait; the timeline engine calls
/// `complete_chat()` without knowing which one is behind it.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// The registry key for this provider (e.g., "openai", "anthropic").
    fn name(&self) -> &str;

    /// Send a request and get a complete answer.
    async fn complete_chat(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResult, ProviderError>;
}
