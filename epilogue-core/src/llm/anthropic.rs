//! Anthropic Messages API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{LlmClient, LlmError, LlmRequest, LlmResponse, LlmResult, ModelRates, TokenUsage};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    rates: ModelRates,
    base_url: String,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let rates = Self::rates_for(&model);
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model,
            rates,
            base_url: API_URL.to_string(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Option<Self> {
        let key = std::env::var(epilogue_config::credentials::ANTHROPIC_API_KEY).ok()?;
        if key.trim().is_empty() {
            return None;
        }
        Some(Self::new(key, model))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn rates_for(model: &str) -> ModelRates {
        // Opus-class pricing when the id says so, Sonnet-class otherwise.
        if model.contains("opus") {
            ModelRates {
                input_per_mtok: 15.0,
                output_per_mtok: 75.0,
            }
        } else if model.contains("haiku") {
            ModelRates {
                input_per_mtok: 0.80,
                output_per_mtok: 4.0,
            }
        } else {
            ModelRates {
                input_per_mtok: 3.0,
                output_per_mtok: 15.0,
            }
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<LlmResponse> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }

        debug!(model = %self.model, "calling Anthropic messages API");
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let raw = response
            .text()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if status != 200 {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&raw)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| raw.clone());
            return Err(match status {
                401 | 403 => LlmError::Auth(message),
                429 => LlmError::RateLimited(message),
                _ => LlmError::Api { status, message },
            });
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&raw).map_err(|e| LlmError::Parse(e.to_string()))?;
        let text = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(LlmError::Parse("response contained no text blocks".into()));
        }

        let usage = TokenUsage {
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        };
        Ok(LlmResponse {
            text,
            usage,
            cost_usd: self.rates.cost_usd(usage),
        })
    }
}
