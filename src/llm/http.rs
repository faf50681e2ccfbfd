//! HTTP Provider
//!
//! Talks to a llama.cpp-style inference server:
//! `POST {base}/completion` for generation and `GET {base}/health` as the
//! readiness probe.

use std::time::Duration;
use reqwest::Client;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::llm::provider::{BoxFuture, LlmError, LlmProvider};

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    n_predict: u32,
    stop: &'a [String],
    grammar: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

/// Provider backed by an HTTP inference server.
#[derive(Debug, Clone)]
pub struct HttpLlmProvider {
    client: Client,
    base_url: String,
    config: LlmConfig,
}

impl HttpLlmProvider {
    /// Build a provider; the request timeout comes from `config`.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
        })
    }

    /// Completion endpoint.
    pub fn completion_url(&self) -> String {
        format!("{}/completion", self.base_url)
    }

    /// Health endpoint.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    fn request_body<'a>(&'a self, prompt: &'a str, grammar: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            prompt,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            top_k: self.config.top_k,
            n_predict: self.config.n_predict,
            stop: &self.config.stop,
            grammar,
            stream: false,
        }
    }

    async fn complete(&self, prompt: &str, grammar: &str) -> Result<String, LlmError> {
        let resp = self
            .client
            .post(self.completion_url())
            .json(&self.request_body(prompt, grammar))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::Unavailable(e.to_string())
                } else {
                    LlmError::Http(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LlmError::Status(status.as_u16()));
        }

        let body: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        Ok(body.content)
    }
}

impl LlmProvider for HttpLlmProvider {
    fn generate<'a>(&'a self, prompt: &'a str, grammar: &'a str) -> BoxFuture<'a, Result<String, LlmError>> {
        Box::pin(self.complete(prompt, grammar))
    }

    fn name(&self) -> &str {
        "llama-http"
    }

    fn is_available(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self.client.get(self.health_url()).send().await {
                Ok(resp) => resp.status().is_success(),
                Err(e) => {
                    debug!("Health probe failed: {}", e);
                    false
                }
            }
        })
    }
}
