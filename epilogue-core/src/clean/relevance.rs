//! LLM-assisted content narrowing for long, noisy pages.

use serde::Deserialize;
use tracing::debug;

use epilogue_model::Actor;

use crate::llm::{LlmClient, LlmRequest, LlmResult};

/// How much of the page is actually about the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    High,
    Medium,
    Low,
    None,
}

#[derive(Debug, Clone)]
pub struct BiographicalExtract {
    pub text: String,
    pub relevance: Relevance,
    pub cost_usd: f64,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    relevance: Relevance,
    #[serde(default)]
    extracted_text: String,
}

/// Narrow a long article to only the passages about the actor. Callers
/// skip the snippet entirely when relevance comes back `None`.
pub async fn extract_biographical(
    llm: &dyn LlmClient,
    text: &str,
    actor: &Actor,
) -> LlmResult<BiographicalExtract> {
    let prompt = format!(
        "The following text was scraped from a web page. Extract only the passages \
         that are biographical information about the actor {name}{years}. Discard \
         navigation, ads, and text about other people.\n\
         Respond with JSON only: {{\"relevance\": \"high|medium|low|none\", \
         \"extracted_text\": \"...\"}}. Use relevance \"none\" when the page does \
         not discuss {name} at all.\n\n---\n{text}",
        name = actor.name,
        years = match (actor.birth_year(), actor.death_year()) {
            (Some(b), Some(d)) => format!(" ({b}-{d})"),
            _ => String::new(),
        },
    );

    let response = llm
        .complete(LlmRequest::new(prompt).with_max_tokens(2_048))
        .await?;
    let parsed: ExtractResponse = crate::synth::parse::from_llm_text(&response.text)
        .map_err(|e| crate::llm::LlmError::Parse(e.to_string()))?;

    debug!(actor = %actor.name, relevance = ?parsed.relevance, "content narrowing complete");
    Ok(BiographicalExtract {
        text: parsed.extracted_text,
        relevance: parsed.relevance,
        cost_usd: response.cost_usd,
    })
}
