//! LLM Provider Abstraction
//!
//! Anything that can turn a prompt plus an output grammar into text.
//! The pipeline only talks to this trait, so tests swap in scripted
//! providers and the demo can run without an inference server.

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by provider operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Provider errors. None of these reach players: the pipeline turns every
/// failure into a fallback result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Transport failure (connect, timeout, reset)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-2xx response
    #[error("Provider returned status {0}")]
    Status(u16),

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Provider could not be reached
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Text generation backend.
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for `prompt`, constrained by a GBNF `grammar`.
    fn generate<'a>(&'a self, prompt: &'a str, grammar: &'a str) -> BoxFuture<'a, Result<String, LlmError>>;

    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Readiness probe.
    fn is_available(&self) -> BoxFuture<'_, bool>;
}
