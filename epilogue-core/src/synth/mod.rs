//! The synthesis pass: fuse accumulated raw snippets into one structured
//! record through the configured LLM.

pub mod parse;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use epilogue_model::{Actor, DeathRecord, FieldConfidence, RawSourceSnippet};

use crate::error::{EnrichError, Result};
use crate::llm::{LlmClient, LlmRequest, with_backoff};

/// Above this many out-of-vocabulary factors the model clearly ignored the
/// vocabulary and the whole response is rejected.
const MAX_REJECTED_FACTORS: usize = 4;

const SYNTHESIS_MAX_TOKENS: u32 = 4_096;
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// One synthesis attempt. Cost is reported even when the outcome is an
/// error: there is no refund on a failed synthesis, and the batch ledger
/// needs the spend either way. Rejected factors are likewise recorded
/// regardless of acceptance.
#[derive(Debug)]
pub struct SynthesisAttempt {
    pub cost_usd: f64,
    pub rejected_factors: Vec<String>,
    pub outcome: Result<DeathRecord>,
}

pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("model", &self.llm.model_id())
            .finish_non_exhaustive()
    }
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    /// Synthesize a record from the snippets the orchestrator accumulated.
    /// The snippets arrive in pipeline order; re-rank by reliability so
    /// the model reads the best material first.
    pub async fn synthesize(&self, actor: &Actor, snippets: &[RawSourceSnippet]) -> SynthesisAttempt {
        let mut ordered: Vec<&RawSourceSnippet> = snippets.iter().collect();
        ordered.sort_by(|a, b| {
            b.attribution
                .reliability_score
                .total_cmp(&a.attribution.reliability_score)
                .then_with(|| b.attribution.confidence.total_cmp(&a.attribution.confidence))
        });

        let ordered_owned: Vec<RawSourceSnippet> = ordered.into_iter().cloned().collect();
        let user_prompt = prompt::build_prompt(actor, &ordered_owned);
        debug!(
            actor = %actor.name,
            snippets = ordered_owned.len(),
            model = self.llm.model_id(),
            "synthesizing"
        );

        let request = LlmRequest::new(user_prompt)
            .with_system(prompt::SYNTHESIS_SYSTEM.to_string())
            .with_max_tokens(SYNTHESIS_MAX_TOKENS);
        let response = match with_backoff(RETRY_ATTEMPTS, RETRY_BASE_DELAY, || {
            self.llm.complete(request.clone())
        })
        .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(actor = %actor.name, error = %err, "synthesis LLM call failed");
                return SynthesisAttempt {
                    cost_usd: 0.0,
                    rejected_factors: Vec::new(),
                    outcome: Err(EnrichError::Llm(err)),
                };
            }
        };
        let cost_usd = response.cost_usd;

        let parsed: parse::SynthesisResponse = match parse::from_llm_text(&response.text) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(actor = %actor.name, error = %err, "synthesis response unparseable");
                return SynthesisAttempt {
                    cost_usd,
                    rejected_factors: Vec::new(),
                    outcome: Err(err),
                };
            }
        };

        let (mut record, rejected_factors) = parse::into_record(parsed);
        let rejected_factors_count = rejected_factors.len();
        if rejected_factors_count > MAX_REJECTED_FACTORS {
            return SynthesisAttempt {
                cost_usd,
                rejected_factors,
                outcome: Err(EnrichError::SynthesisFailed(format!(
                    "{rejected_factors_count} unrecognized notable factors: model ignored the vocabulary"
                ))),
            };
        }

        derive_missing_confidences(&mut record, &ordered_owned);
        info!(
            actor = %actor.name,
            substantive = record.has_substantive_content,
            cost_usd,
            "synthesis complete"
        );
        SynthesisAttempt {
            cost_usd,
            rejected_factors,
            outcome: Ok(record),
        }
    }
}

/// When the model leaves a confidence null, derive it from the strongest
/// contributing snippet.
fn derive_missing_confidences(record: &mut DeathRecord, snippets: &[RawSourceSnippet]) {
    let strongest = snippets
        .iter()
        .map(|s| s.attribution.confidence)
        .fold(0.0_f64, f64::max);
    let derived = FieldConfidence::from_score(strongest);

    if record.circumstances.is_some() {
        record.cause_confidence.get_or_insert(derived);
        record.details_confidence.get_or_insert(derived);
    }
    record.birthday_confidence.get_or_insert(derived);
    record.deathday_confidence.get_or_insert(derived);
}
