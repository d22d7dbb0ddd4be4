//! Common interface over the LLM providers used for synthesis, grounded
//! search, and content narrowing.

pub mod anthropic;
pub mod gemini;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;

/// Token usage reported by a provider for one call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Per-model USD pricing, per million tokens.
#[derive(Debug, Clone, Copy)]
pub struct ModelRates {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl ModelRates {
    pub fn cost_usd(&self, usage: TokenUsage) -> f64 {
        (usage.input_tokens as f64 / 1_000_000.0) * self.input_per_mtok
            + (usage.output_tokens as f64 / 1_000_000.0) * self.output_per_mtok
    }
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 4_096,
            temperature: 0.2,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: TokenUsage,
    pub cost_usd: f64,
}

#[derive(Debug, Error)]
pub enum LlmError {
    /// Bad or missing credentials. Never retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider quota or rate limit. Retried with backoff.
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unparseable response: {0}")]
    Parse(String),
}

impl LlmError {
    /// Transient errors are retried; auth and parse failures surface
    /// immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited(_) | LlmError::Timeout | LlmError::Network(_) => true,
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::Auth(_) | LlmError::Parse(_) => false,
        }
    }
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Common interface for LLM providers.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model_id(&self) -> &str;

    async fn complete(&self, request: LlmRequest) -> LlmResult<LlmResponse>;
}

/// Resolve a model identifier to a configured client: Claude ids go to
/// the Anthropic API, Gemini ids to Google. `None` when the identifier is
/// unknown or the matching credential is absent.
pub fn client_for_model(model: &str) -> Option<std::sync::Arc<dyn LlmClient>> {
    if model.starts_with("claude") {
        AnthropicClient::from_env(model).map(|c| std::sync::Arc::new(c) as _)
    } else if model.starts_with("gemini") {
        GeminiClient::from_env(model).map(|c| std::sync::Arc::new(c) as _)
    } else {
        None
    }
}

/// Bounded exponential backoff around a fallible call. Non-retryable
/// errors and exhaustion both surface the last error.
pub async fn with_backoff<T, F, Fut>(max_attempts: u32, base_delay: Duration, mut call: F) -> LlmResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = LlmResult<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < max_attempts => {
                let delay = base_delay * 2u32.saturating_pow(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "LLM call failed, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn retryability_policy() {
        assert!(LlmError::RateLimited("quota".into()).is_retryable());
        assert!(LlmError::Timeout.is_retryable());
        assert!(
            LlmError::Api {
                status: 503,
                message: "overloaded".into()
            }
            .is_retryable()
        );
        assert!(
            !LlmError::Api {
                status: 400,
                message: "bad request".into()
            }
            .is_retryable()
        );
        assert!(!LlmError::Auth("bad key".into()).is_retryable());
        assert!(!LlmError::Parse("garbage".into()).is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(3, Duration::from_millis(100), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::Timeout)
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auth_errors_surface_immediately() {
        let calls = AtomicU32::new(0);
        let result: LlmResult<()> = with_backoff(5, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Auth("invalid key".into())) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rates_compute_cost() {
        let rates = ModelRates {
            input_per_mtok: 3.0,
            output_per_mtok: 15.0,
        };
        let cost = rates.cost_usd(TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 200_000,
        });
        assert!((cost - 6.0).abs() < 1e-9);
    }
}
