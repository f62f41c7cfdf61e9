//! Conformance retry: re-asks a provider until its JSON answer validates.
//!
//! JSON requests are retried with a slowly rising temperature until the
//! answer parses (and satisfies the request's schema, when one is given).
//! An empty answer aborts immediately; transport errors propagate as-is.

use std::sync::Arc;

use draftline_config::TEMPERATURE_STEP;
use draftline_core::error::ProviderError;
use draftline_core::provider::*;
use jsonschema::JSONSchema;
use tracing::{debug, warn};

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_TEMPERATURE: f32 = 0.1;

/// Wraps a provider with the JSON conformance retry loop.
pub struct ConformanceExecutor {
    provider: Arc<dyn CompletionProvider>,
    retry_attempts: u32,
    base_temperature: f32,
}

impl ConformanceExecutor {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_temperature: DEFAULT_BASE_TEMPERATURE,
        }
    }

    pub fn from_config(
        provider: Arc<dyn CompletionProvider>,
        config: &draftline_config::ConformanceConfig,
    ) -> Self {
        Self::new(provider)
            .with_retry_attempts(config.retry_attempts)
            .with_base_temperature(config.base_temperature)
    }

    /// Extra attempts allowed after the first non-conformant answer.
    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    pub fn with_base_temperature(mut self, base_temperature: f32) -> Self {
        self.base_temperature = base_temperature;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn temperature_for_attempt(&self, attempt: u32) -> f32 {
        self.base_temperature + attempt as f32 * TEMPERATURE_STEP
    }

    /// Run a request; JSON requests go through the retry loop.
    pub async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResult, ProviderError> {
        match request.output_kind {
            OutputKind::Text => {
                let result = self.provider.complete_chat(request).await?;
                self.ensure_answer(&result)?;
                Ok(result)
            }
            OutputKind::Json => self.complete_json(request).await,
        }
    }

    async fn complete_json(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResult, ProviderError> {
        let validator = match &request.response_schema {
            Some(schema) => Some(JSONSchema::compile(schema).map_err(|e| {
                ProviderError::Conformance {
                    provider: self.provider_name().to_string(),
                    attempts: 0,
                    reason: format!("invalid response schema: {e}"),
                }
            })?),
            None => None,
        };

        let total_attempts = self.retry_attempts + 1;
        let mut last_reason = String::new();

        for attempt in 0..total_attempts {
            let mut attempt_request = request.clone();
            let temperature = self.temperature_for_attempt(attempt);
            attempt_request.temperature = Some(temperature);

            debug!(
                provider = %self.provider_name(),
                attempt,
                temperature,
                "Requesting JSON completion"
            );

            let mut result = self.provider.complete_chat(attempt_request).await?;
            self.ensure_answer(&result)?;

            let candidate = strip_json_fence(&result.answer);
            match validate_answer(candidate, validator.as_ref()) {
                Ok(()) => {
                    result.answer = candidate.to_string();
                    return Ok(result);
                }
                Err(reason) => {
                    warn!(
                        provider = %self.provider_name(),
                        attempt,
                        remaining = total_attempts - attempt - 1,
                        reason = %reason,
                        "Non-conformant JSON answer"
                    );
                    last_reason = reason;
                }
            }
        }

        Err(ProviderError::Conformance {
            provider: self.provider_name().to_string(),
            attempts: total_attempts,
            reason: last_reason,
        })
    }

    fn ensure_answer(&self, result: &CompletionResult) -> std::result::Result<(), ProviderError> {
        if result.answer.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.provider_name().to_string(),
            });
        }
        Ok(())
    }
}

/// Strip a markdown code fence (```` ```json ... ``` ````) around an answer.
///
/// Answers that already parse as JSON, or carry no fence, are returned
/// trimmed; backticks inside JSON string values are left alone.
pub fn strip_json_fence(answer: &str) -> &str {
    let trimmed = answer.trim();
    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return trimmed;
    }
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    let after_open = &trimmed[open + 3..];
    let body = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open.trim_start_matches("json"),
    };

    match body.rfind("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

fn validate_answer(candidate: &str, schema: Option<&JSONSchema>) -> Result<(), String> {
    let value: serde_json::Value =
        serde_json::from_str(candidate).map_err(|e| format!("invalid JSON: {e}"))?;

    if let Some(schema) = schema {
        if let Err(errors) = schema.validate(&value) {
            let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
            return Err(format!("schema violation: {}", messages.join("; ")));
        }
    }

    Ok(())
}
