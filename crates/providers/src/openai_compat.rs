//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, DeepSeek, Groq, Together AI,
//! and any endpoint exposing `/v1/chat/completions`.
//!
//! JSON output is requested through `response_format`: a `json_schema`
//! format when the request carries a schema, `json_object` otherwise.

use std::time::Duration;

use async_trait::async_trait;
use draftline_core::error::ProviderError;
use draftline_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider with the default 30s timeout.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_timeout(name, base_url, api_key, Duration::from_secs(30))
    }

    pub fn with_timeout(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert a completion request into chat messages.
    fn to_api_messages(request: &CompletionRequest) -> Vec<ApiMessage> {
        let mut messages = Vec::new();

        let mut system = request.system_role.clone().unwrap_or_default();
        if let Some(hint) = &request.response_format_hint {
            if !system.is_empty() {
                system.push_str("\n\n");
            }
            system.push_str(hint);
        }
        if !system.is_empty() {
            messages.push(ApiMessage {
                role: "system".into(),
                content: Some(system),
            });
        }

        for (role, text) in request.rendered_prompts() {
            messages.push(ApiMessage {
                role: match role {
                    Role::System => "system".into(),
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                },
                content: Some(text),
            });
        }

        if let Some(previous) = &request.previous_output {
            messages.push(ApiMessage {
                role: "assistant".into(),
                content: Some(previous.clone()),
            });
        }

        messages
    }

    /// The `response_format` body field for JSON requests.
    fn response_format(request: &CompletionRequest) -> Option<serde_json::Value> {
        if request.output_kind != OutputKind::Json {
            return None;
        }
        Some(match &request.response_schema {
            Some(schema) => serde_json::json!({
                "type": "json_schema",
                "json_schema": { "name": "response", "schema": schema },
            }),
            None => serde_json::json!({ "type": "json_object" }),
        })
    }

    fn build_body(request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.target_model,
            "messages": Self::to_api_messages(request),
            "stream": false,
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        if let Some(format) = Self::response_format(request) {
            body["response_format"] = format;
        }

        body
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete_chat(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResult, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            provider = %self.name,
            model = %request.target_model,
            output = ?request.output_kind,
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
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

impl OpenAiCompatProvider {
    fn parse_response(
        raw_request: serde_json::Value,
        raw_response: serde_json::Value,
    ) -> std::result::Result<CompletionResult, ProviderError> {
        let api_response: ApiResponse = serde_json::from_value(raw_response.clone())
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        let answer = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                prompt: u.prompt_tokens.unwrap_or(-1),
                completion: u.completion_tokens.unwrap_or(-1),
                total: u.total_tokens.unwrap_or(-1),
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

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: Option<i64>,
    #[serde(default)]
    completion_tokens: Option<i64>,
    #[serde(default)]
    total_tokens: Option<i64>,
}
