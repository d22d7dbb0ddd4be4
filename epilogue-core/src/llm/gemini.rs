//! Gemini generateContent client, optionally with grounded web search.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{LlmClient, LlmError, LlmRequest, LlmResponse, LlmResult, ModelRates, TokenUsage};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    rates: ModelRates,
    grounded_search: bool,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("grounded_search", &self.grounded_search)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            rates: ModelRates {
                input_per_mtok: 1.25,
                output_per_mtok: 10.0,
            },
            grounded_search: false,
            base_url: API_BASE.to_string(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Option<Self> {
        let key = std::env::var(epilogue_config::credentials::GEMINI_API_KEY).ok()?;
        if key.trim().is_empty() {
            return None;
        }
        Some(Self::new(key, model))
    }

    /// Enable the google_search tool so answers are grounded in live web
    /// results.
    pub fn with_grounded_search(mut self) -> Self {
        self.grounded_search = true;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<LlmResponse> {
        let mut body = json!({
            "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
            "generationConfig": {
                "maxOutputTokens": request.max_tokens,
                "temperature": request.temperature,
            },
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        if self.grounded_search {
            body["tools"] = json!([{"google_search": {}}]);
        }

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        debug!(model = %self.model, grounded = self.grounded_search, "calling Gemini generateContent");
        let response = self
            .client
            .post(&url)
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
            return Err(match status {
                400 | 401 | 403 => LlmError::Auth(raw),
                429 => LlmError::RateLimited(raw),
                _ => LlmError::Api {
                    status,
                    message: raw,
                },
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&raw).map_err(|e| LlmError::Parse(e.to_string()))?;
        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if text.is_empty() {
            return Err(LlmError::Parse("response contained no candidates".into()));
        }

        let usage = parsed
            .usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();
        Ok(LlmResponse {
            text,
            usage,
            cost_usd: self.rates.cost_usd(usage),
        })
    }
}
