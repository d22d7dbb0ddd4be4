//! LLM sources: grounded-search Gemini and Claude. Both emit structured
//! death snippets rather than scraped prose, and both bill per call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use epilogue_model::{
    Actor, LookupErrorKind, LookupOutcome, RawDeathSnippet, ReliabilityTier, SnippetPayload,
    SourceAttribution, SourceCategory, SourceDescriptor, SourceFamily, SourceType,
};

use crate::error::Result;
use crate::llm::{AnthropicClient, GeminiClient, LlmClient, LlmError, LlmRequest};
use crate::synth::parse::from_llm_text;

const AI_SOURCE_TIMEOUT_MS: u64 = 60_000;

/// The shape both AI sources ask for.
#[derive(Debug, Default, Deserialize)]
struct AiDeathAnswer {
    #[serde(default)]
    circumstances: Option<String>,
    #[serde(default)]
    rumored_circumstances: Option<String>,
    #[serde(default)]
    location_of_death: Option<String>,
    #[serde(default)]
    notable_factors: Vec<String>,
    #[serde(default)]
    related_celebrities: Vec<String>,
    #[serde(default)]
    additional_context: Option<String>,
    /// Self-reported grounding: "sources" or "memory".
    #[serde(default)]
    basis: Option<String>,
}

fn death_prompt(actor: &Actor) -> String {
    let identity = match (actor.birth_year(), actor.death_year()) {
        (Some(b), Some(d)) => format!("{} ({b}-{d})", actor.name),
        (_, Some(d)) => format!("{} (died {d})", actor.name),
        _ => actor.name.clone(),
    };
    format!(
        "What is known about the death of the actor {identity}? Report only what \
         you can support; use null for anything unknown rather than guessing. Keep \
         verified circumstances and rumors strictly separate.\n\
         Respond with JSON only:\n\
         {{\"circumstances\": string|null, \"rumored_circumstances\": string|null, \
         \"location_of_death\": string|null, \"notable_factors\": [string], \
         \"related_celebrities\": [string], \"additional_context\": string|null, \
         \"basis\": \"sources\"|\"memory\"}}"
    )
}

fn answer_to_outcome(
    descriptor: &SourceDescriptor,
    answer: AiDeathAnswer,
    cost_usd: f64,
    model_id: &str,
) -> LookupOutcome {
    let empty = answer.circumstances.is_none()
        && answer.rumored_circumstances.is_none()
        && answer.location_of_death.is_none()
        && answer.additional_context.is_none();
    if empty {
        return LookupOutcome::Miss {
            source_type: descriptor.source_type,
            kind: LookupErrorKind::NotFound,
            message: "model reported nothing verifiable".into(),
            cost_usd,
        };
    }

    // Answers the model says are grounded in live sources rate higher
    // than pure recall.
    let confidence = if answer.basis.as_deref() == Some("sources") {
        0.75
    } else {
        0.55
    };

    let mut attribution =
        SourceAttribution::new(descriptor.source_type, descriptor.tier, confidence)
            .with_cost(cost_usd);
    attribution.meta.publication = Some(model_id.to_string());
    attribution.meta.content_type = Some("llm_answer".to_string());

    LookupOutcome::Hit {
        attribution,
        payload: SnippetPayload::Death(RawDeathSnippet {
            circumstances: answer.circumstances,
            rumored_circumstances: answer.rumored_circumstances,
            notable_factors: answer.notable_factors,
            location_of_death: answer.location_of_death,
            additional_context: answer.additional_context,
            related_celebrities: answer.related_celebrities,
        }),
    }
}

fn miss_from_llm(descriptor: &SourceDescriptor, err: &LlmError) -> LookupOutcome {
    let kind = match err {
        LlmError::RateLimited(_) => LookupErrorKind::RateLimited,
        LlmError::Auth(_) => LookupErrorKind::NotConfigured,
        LlmError::Timeout => LookupErrorKind::Timeout,
        _ => LookupErrorKind::UpstreamError,
    };
    LookupOutcome::miss(descriptor.source_type, kind, err.to_string())
}

pub struct GeminiSearchSource {
    descriptor: SourceDescriptor,
    client: Option<Arc<GeminiClient>>,
}

impl std::fmt::Debug for GeminiSearchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSearchSource")
            .field("configured", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

impl GeminiSearchSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "gemini_search",
                SourceType::GeminiSearch,
                SourceFamily::Ai,
                SourceCategory::Ai,
                ReliabilityTier::Ai,
            )
            .with_cost(0.02)
            .with_min_delay_ms(1_000)
            .with_timeout_ms(AI_SOURCE_TIMEOUT_MS),
            client: GeminiClient::from_env("gemini-2.5-flash")
                .map(|c| Arc::new(c.with_grounded_search())),
        }
    }
}

impl Default for GeminiSearchSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Source for GeminiSearchSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        self.client.is_some()
    }

    async fn perform_lookup(
        &self,
        actor: &Actor,
        _ctx: &super::LookupContext,
    ) -> Result<LookupOutcome> {
        let Some(client) = &self.client else {
            return Ok(LookupOutcome::miss(
                SourceType::GeminiSearch,
                LookupErrorKind::NotConfigured,
                "GEMINI_API_KEY is not set",
            ));
        };

        let request = LlmRequest::new(death_prompt(actor)).with_max_tokens(1_024);
        let response = match client.complete(request).await {
            Ok(response) => response,
            Err(err) => return Ok(miss_from_llm(&self.descriptor, &err)),
        };

        let answer: AiDeathAnswer = match from_llm_text(&response.text) {
            Ok(answer) => answer,
            Err(err) => {
                return Ok(LookupOutcome::Miss {
                    source_type: SourceType::GeminiSearch,
                    kind: LookupErrorKind::UpstreamError,
                    message: format!("unparseable model answer: {err}"),
                    cost_usd: response.cost_usd,
                });
            }
        };
        Ok(answer_to_outcome(
            &self.descriptor,
            answer,
            response.cost_usd,
            client.model_id(),
        ))
    }
}

pub struct ClaudeSource {
    descriptor: SourceDescriptor,
    client: Option<Arc<AnthropicClient>>,
}

impl std::fmt::Debug for ClaudeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeSource")
            .field("configured", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

impl ClaudeSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "claude_ai",
                SourceType::ClaudeAi,
                SourceFamily::Ai,
                SourceCategory::Ai,
                ReliabilityTier::Ai,
            )
            .with_cost(0.05)
            .with_min_delay_ms(1_000)
            .with_timeout_ms(AI_SOURCE_TIMEOUT_MS),
            client: AnthropicClient::from_env("claude-sonnet-4-5").map(Arc::new),
        }
    }
}

impl Default for ClaudeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Source for ClaudeSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        self.client.is_some()
    }

    async fn perform_lookup(
        &self,
        actor: &Actor,
        _ctx: &super::LookupContext,
    ) -> Result<LookupOutcome> {
        let Some(client) = &self.client else {
            return Ok(LookupOutcome::miss(
                SourceType::ClaudeAi,
                LookupErrorKind::NotConfigured,
                "ANTHROPIC_API_KEY is not set",
            ));
        };

        let request = LlmRequest::new(death_prompt(actor))
            .with_system(
                "You are a careful film historian. You never invent facts; \
                 when you are not sure, you answer null."
                    .to_string(),
            )
            .with_max_tokens(1_024);
        let response = match client.complete(request).await {
            Ok(response) => response,
            Err(err) => return Ok(miss_from_llm(&self.descriptor, &err)),
        };

        let answer: AiDeathAnswer = match from_llm_text(&response.text) {
            Ok(answer) => answer,
            Err(err) => {
                return Ok(LookupOutcome::Miss {
                    source_type: SourceType::ClaudeAi,
                    kind: LookupErrorKind::UpstreamError,
                    message: format!("unparseable model answer: {err}"),
                    cost_usd: response.cost_usd,
                });
            }
        };
        Ok(answer_to_outcome(
            &self.descriptor,
            answer,
            response.cost_usd,
            client.model_id(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> SourceDescriptor {
        SourceDescriptor::new(
            "claude_ai",
            SourceType::ClaudeAi,
            SourceFamily::Ai,
            SourceCategory::Ai,
            ReliabilityTier::Ai,
        )
        .with_cost(0.05)
    }

    #[test]
    fn empty_answers_are_not_found_but_still_billed() {
        let outcome = answer_to_outcome(&descriptor(), AiDeathAnswer::default(), 0.04, "m");
        match outcome {
            LookupOutcome::Miss { kind, cost_usd, .. } => {
                assert_eq!(kind, LookupErrorKind::NotFound);
                assert_eq!(cost_usd, 0.04);
            }
            LookupOutcome::Hit { .. } => panic!("expected a miss"),
        }
    }

    #[test]
    fn grounded_answers_rate_higher_than_recall() {
        let grounded = answer_to_outcome(
            &descriptor(),
            AiDeathAnswer {
                circumstances: Some("Died of cancer.".into()),
                basis: Some("sources".into()),
                ..Default::default()
            },
            0.04,
            "m",
        );
        let recalled = answer_to_outcome(
            &descriptor(),
            AiDeathAnswer {
                circumstances: Some("Died of cancer.".into()),
                basis: Some("memory".into()),
                ..Default::default()
            },
            0.04,
            "m",
        );
        match (grounded, recalled) {
            (
                LookupOutcome::Hit { attribution: g, .. },
                LookupOutcome::Hit { attribution: r, .. },
            ) => assert!(g.confidence > r.confidence),
            _ => panic!("expected two hits"),
        }
    }

    #[test]
    fn prompt_carries_identity_and_null_rule() {
        let actor = Actor {
            id: 1,
            external_id: 1,
            name: "John Wayne".into(),
            birthday: chrono::NaiveDate::from_ymd_opt(1907, 5, 26),
            deathday: chrono::NaiveDate::from_ymd_opt(1979, 6, 11),
            place_of_birth: None,
            cause_of_death: None,
            popularity: None,
            biography: None,
        };
        let prompt = death_prompt(&actor);
        assert!(prompt.contains("John Wayne (1907-1979)"));
        assert!(prompt.contains("null"));
        assert!(prompt.contains("JSON only"));
    }
}
