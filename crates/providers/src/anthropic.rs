//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly (not an OpenAI-compatible proxy).
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - JSON output requested through the system prompt, carrying the schema
//!   or format hint, since the Messages API has no native JSON mode

use std::time::Duration;

use async_trait::async_trait;
use draftline_core::error::ProviderError;
use draftline_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with the default 30s timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_timeout(api_key, Duration::from_secs(30))
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Build the top-level system prompt.
    /// System-role segments and JSON instructions are folded in here.
    fn build_system(request: &CompletionRequest) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();

        if let Some(system) = &request.system_role {
            parts.push(system.clone());
        }

        for (role, text) in request.rendered_prompts() {
            if role == Role::System {
                parts.push(text);
            }
        }

        if request.output_kind == OutputKind::Json {
            let mut instruction = String::from("Respond with a single valid JSON value and nothing else.");
            if let Some(schema) = &request.response_schema {
                instruction.push_str(&format!(" The JSON must conform to this JSON Schema: {schema}"));
            }
            parts.push(instruction);
        }

        if let Some(hint) = &request.response_format_hint {
            parts.push(hint.clone());
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Convert prompt segments to Anthropic messages.
    fn to_api_messages(request: &CompletionRequest) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = request
            .rendered_prompts()
            .into_iter()
            .filter_map(|(role, text)| match role {
                Role::User => Some(AnthropicMessage {
                    role: "user".into(),
                    content: text,
                }),
                Role::Assistant => Some(AnthropicMessage {
                    role: "assistant".into(),
                    content: text,
                }),
                Role::System => None, // handled separately
            })
            .collect();

        if let Some(previous) = &request.previous_output {
            result.push(AnthropicMessage {
                role: "assistant".into(),
                content: previous.clone(),
            });
        }

        result
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.target_model,
            "messages": Self::to_api_messages(request),
            "max_tokens": self.max_tokens,
        });

        if let Some(system) = Self::build_system(request) {
            body["system"] = serde_json::json!(system);
        }

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        body
    }

    fn parse_response(
        raw_request: serde_json::Value,
        raw_response: serde_json::Value,
    ) -> std::result::Result<CompletionResult, ProviderError> {
        let resp: AnthropicResponse = serde_json::from_value(raw_response.clone()).map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse Anthropic response: {e}"))
        })?;

        let answer = resp
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        let usage = resp
            .usage
            .map(|u| TokenUsage {
                prompt: u.input_tokens.unwrap_or(-1),
                completion: u.output_tokens.unwrap_or(-1),
                total: match (u.input_tokens, u.output_tokens) {
                    (Some(input), Some(output)) => input + output,
                    _ => -1,
                },
            })
            .unwrap_or_default();

        Ok(CompletionResult {
            answer,
            usage,
            raw_request,
            raw_response,
        })
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete_chat(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResult, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(&request);

        debug!(provider = "anthropic", model = %request.target_model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid Anthropic API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let raw_response: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        Self::parse_response(body, raw_response)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: Option<i64>,
    #[serde(default)]
    output_tokens: Option<i64>,
}
