//! Name-keyed catalogue of completion backends.
//!
//! Built once at process start from configuration and handed to whoever
//! needs a provider; there is no global provider state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use draftline_core::error::ProviderError;
use draftline_core::provider::CompletionProvider;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Provider names with a built-in OpenAI-compatible endpoint.
pub const OPENAI_COMPATIBLE: &[&str] = &[
    "openai", "openrouter", "ollama", "deepseek", "groq", "together", "vllm",
];

/// Name-keyed completion providers.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn CompletionProvider>>,
    default_provider: String,
}

impl ProviderRegistry {
    /// Create a new registry with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn CompletionProvider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::NotConfigured(format!("Unknown provider '{name}'")))
    }

    /// Get the default provider.
    pub fn default_provider(&self) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        self.get(&self.default_provider)
    }

    pub fn default_name(&self) -> &str {
        &self.default_provider
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build the registry from configuration.
///
/// Every well-known backend is registered; per-provider config overrides
/// the key and base URL, and unknown names in config are treated as
/// OpenAI-compatible endpoints.
pub fn build_from_config(config: &draftline_config::AppConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new(&config.default_provider);
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let mut names: Vec<String> = OPENAI_COMPATIBLE.iter().map(|s| s.to_string()).collect();
    names.push("anthropic".into());
    for name in config.providers.keys() {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }

    for name in names {
        let provider_config = config.providers.get(&name);

        let api_key = provider_config
            .and_then(|p| p.api_key.clone())
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let api_url = provider_config.and_then(|p| p.api_url.clone());

        let provider: Arc<dyn CompletionProvider> = if name == "anthropic" {
            let mut p = AnthropicProvider::with_timeout(&api_key, timeout);
            if let Some(url) = api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        } else {
            let base_url = api_url.unwrap_or_else(|| default_base_url(&name));
            Arc::new(OpenAiCompatProvider::with_timeout(
                &name, base_url, &api_key, timeout,
            ))
        };

        registry.register(name, provider);
    }

    registry
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
