//! Error types for the Draftline domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`TimelineError`] is the
//! top-level error surfaced by a timeline assembly run.

use thiserror::Error;

/// The top-level error type for a timeline assembly run.
#[derive(Debug, Error)]
pub enum TimelineError {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Document source errors ---
    #[error("Document source error: {0}")]
    Source(#[from] SourceError),

    // --- Persistence errors ---
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Timeline generation exceeded {limit} iterations (reached {iterations})")]
    LoopExceeded { iterations: usize, limit: usize },
}

/// Result type alias using [`TimelineError`].
pub type Result<T> = std::result::Result<T, TimelineError>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The backend answered with nothing. Never retried.
    #[error("Provider '{provider}' returned an empty response")]
    EmptyResponse { provider: String },

    /// No schema-conformant JSON after every retry attempt.
    #[error("Provider '{provider}' gave no conformant JSON after {attempts} attempts: {reason}")]
    Conformance {
        provider: String,
        attempts: u32,
        reason: String,
    },

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Failed to read document source: {0}")]
    Read(String),

    #[error("Failed to parse document source: {0}")]
    Parse(String),

    #[error("Failed to materialize external revision {revision_id}: {reason}")]
    Materialize { revision_id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
