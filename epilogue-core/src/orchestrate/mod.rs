//! The per-actor and per-batch orchestration loop: prioritized source
//! iteration under cost ceilings, family-diversity early stop, and
//! cancellation.

mod progress;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use epilogue_config::EnrichmentOptions;
use epilogue_model::{
    Actor, EnrichmentOutcome, EnrichmentStats, ExitReason, LookupOutcome, RawSourceSnippet,
    RunStats, SourceAttempt, SourceCategory, SourceFamily,
};

use crate::sources::{LookupContext, SourceRegistry};
use crate::synth::Synthesizer;

pub use progress::{NullProgress, ProgressEvent, ProgressSink};

/// Only sources at or above this reliability can count toward early stop.
/// Deliberately separate from the snippet-confidence threshold: a strong
/// hit from a weak source proves nothing, and neither does a weak hit
/// from a strong source.
const QUALIFYING_RELIABILITY: f64 = 0.7;

pub const NO_DATA_ERROR: &str = "no data";
pub const SYNTHESIS_FAILED_ERROR: &str = "sources collected but synthesis failed";
pub const INTERRUPTED_ERROR: &str = "interrupted";

/// Everything a batch run returns: per-actor outcomes plus the run ledger.
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: BTreeMap<i64, EnrichmentOutcome>,
    pub stats: RunStats,
}

pub struct Orchestrator {
    registry: SourceRegistry,
    synthesizer: Synthesizer,
    options: EnrichmentOptions,
    ctx: LookupContext,
    progress: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("sources", &self.registry.len())
            .field("model", &self.synthesizer.model_id())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        registry: SourceRegistry,
        synthesizer: Synthesizer,
        options: EnrichmentOptions,
        ctx: LookupContext,
    ) -> Self {
        Self {
            registry,
            synthesizer,
            options,
            ctx,
            progress: Arc::new(NullProgress),
        }
    }

    /// Composition-root constructor: build the pipeline and the synthesis
    /// client from the resolved options.
    pub fn from_options(
        options: EnrichmentOptions,
        fetcher: Arc<crate::fetch::HttpFetcher>,
        cache: Arc<dyn crate::cache::Cache>,
    ) -> crate::error::Result<Self> {
        let llm = crate::llm::client_for_model(&options.synthesis_model).ok_or_else(|| {
            crate::error::EnrichError::InvalidInput(format!(
                "no credentials for synthesis model {}",
                options.synthesis_model
            ))
        })?;
        let ctx = LookupContext {
            fetcher,
            cache,
            cleaner_llm: options.ai_cleaning.then(|| llm.clone()),
        };
        let registry = SourceRegistry::from_options(&options);
        Ok(Self::new(registry, Synthesizer::new(llm), options, ctx))
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn source_count(&self) -> usize {
        self.registry.len()
    }

    /// Pipeline names in execution order; stable for a fixed configuration.
    pub fn source_names(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    /// Enrich one actor: collect snippets source by source, then
    /// synthesize. Source failures never abort; they are recorded in the
    /// attempt log and skipped.
    pub async fn enrich(&self, actor: &Actor, cancel: &CancellationToken) -> EnrichmentOutcome {
        let started = Instant::now();
        if let Err(err) = actor.validate_for_death_enrichment() {
            return EnrichmentOutcome::empty(actor.id, err.to_string());
        }

        let mut raw_sources = Vec::new();
        let mut attempts: Vec<SourceAttempt> = Vec::new();
        let mut rejected_factors = Vec::new();
        let mut qualifying_families: HashSet<SourceFamily> = HashSet::new();
        let mut cost_usd = 0.0_f64;
        let mut interrupted = false;
        let mut stopped_early = false;

        for source in self.registry.sources() {
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            let descriptor = source.descriptor();
            if cost_usd >= self.options.cost_limits.max_cost_per_actor {
                debug!(
                    actor = %actor.name,
                    cost_usd,
                    "per-actor cost ceiling reached, stopping collection"
                );
                break;
            }

            // Early stop ends collection, with one exemption: the book
            // trio is cheap and disproportionately useful for narrative,
            // so it always runs.
            if stopped_early && descriptor.category != SourceCategory::Books {
                continue;
            }

            let call_started = Instant::now();
            let outcome = source.lookup(actor, &self.ctx).await;
            let duration_ms = call_started.elapsed().as_millis() as u64;
            cost_usd += outcome.cost_usd();

            self.progress.on_event(&ProgressEvent::SourceCompleted {
                actor_id: actor.id,
                source: descriptor.source_type,
                succeeded: outcome.is_hit(),
            });

            match outcome {
                LookupOutcome::Hit {
                    attribution,
                    payload,
                } => {
                    attempts.push(SourceAttempt {
                        source_type: descriptor.source_type,
                        succeeded: true,
                        error_kind: None,
                        error_message: None,
                        duration_ms,
                        cost_usd: attribution.cost_usd,
                    });

                    let qualifies = attribution.confidence >= self.options.confidence_threshold
                        && attribution.reliability_score >= QUALIFYING_RELIABILITY;
                    if qualifies {
                        qualifying_families.insert(descriptor.family);
                    }
                    raw_sources.push(RawSourceSnippet {
                        attribution,
                        payload,
                    });

                    if !stopped_early
                        && qualifying_families.len()
                            >= self.options.early_stop_source_count as usize
                    {
                        debug!(
                            actor = %actor.name,
                            families = qualifying_families.len(),
                            "early stop: enough independent families"
                        );
                        stopped_early = true;
                    }
                }
                LookupOutcome::Miss {
                    kind,
                    message,
                    cost_usd: miss_cost,
                    ..
                } => {
                    attempts.push(SourceAttempt {
                        source_type: descriptor.source_type,
                        succeeded: false,
                        error_kind: Some(kind),
                        error_message: Some(message),
                        duration_ms,
                        cost_usd: miss_cost,
                    });
                }
            }
        }

        let sources_attempted = attempts.len() as u32;
        let sources_succeeded = attempts.iter().filter(|a| a.succeeded).count() as u32;

        let mut error = None;
        let mut record = None;

        if interrupted {
            error = Some(INTERRUPTED_ERROR.to_string());
        } else if raw_sources.is_empty() {
            // Nothing to synthesize from; the synthesizer is not called.
            error = Some(NO_DATA_ERROR.to_string());
        } else if cancel.is_cancelled() {
            error = Some(INTERRUPTED_ERROR.to_string());
        } else {
            self.progress.on_event(&ProgressEvent::Synthesizing {
                actor_id: actor.id,
                snippet_count: raw_sources.len(),
            });
            let attempt = self.synthesizer.synthesize(actor, &raw_sources).await;
            cost_usd += attempt.cost_usd;
            rejected_factors = attempt.rejected_factors;
            match attempt.outcome {
                Ok(synthesized) => record = Some(synthesized),
                Err(err) => {
                    warn!(actor = %actor.name, error = %err, "synthesis failed; raw sources retained");
                    error = Some(SYNTHESIS_FAILED_ERROR.to_string());
                }
            }
        }

        self.progress.on_event(&ProgressEvent::ActorFinished {
            actor_id: actor.id,
            enriched: record.is_some(),
            cost_usd,
        });

        EnrichmentOutcome {
            actor_id: actor.id,
            record,
            raw_sources,
            attempts,
            rejected_factors,
            stats: EnrichmentStats {
                sources_attempted,
                sources_succeeded,
                total_cost_usd: cost_usd,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
            error,
        }
    }

    /// Enrich a batch sequentially under the total cost ceiling. Partial
    /// completion is a first-class outcome, reported via the exit reason.
    pub async fn enrich_batch(
        &self,
        actors: &[Actor],
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut results = BTreeMap::new();
        let mut stats = RunStats::new();
        let total = actors.len();

        for (position, actor) in actors.iter().enumerate() {
            if cancel.is_cancelled() {
                stats.exit_reason = ExitReason::Interrupted;
                info!(processed = stats.actors_processed, "batch interrupted");
                break;
            }

            self.progress.on_event(&ProgressEvent::ActorStarted {
                actor_id: actor.id,
                actor_name: actor.name.clone(),
                position: position + 1,
                total,
            });

            let outcome = self.enrich(actor, cancel).await;
            stats.actors_processed += 1;
            if outcome.record.is_some() {
                stats.actors_enriched += 1;
            }
            for attempt in &outcome.attempts {
                stats.add_source_cost(attempt.source_type, attempt.cost_usd);
            }
            // Synthesis spend has no source row; add the remainder.
            let attempt_cost: f64 = outcome.attempts.iter().map(|a| a.cost_usd).sum();
            stats.total_cost_usd += outcome.stats.total_cost_usd - attempt_cost;

            results.insert(actor.id, outcome);

            if stats.total_cost_usd >= self.options.cost_limits.max_total_cost {
                stats.exit_reason = ExitReason::CostLimit;
                info!(
                    total_cost = stats.total_cost_usd,
                    processed = stats.actors_processed,
                    "batch cost ceiling reached"
                );
                break;
            }
        }

        info!(
            processed = stats.actors_processed,
            enriched = stats.actors_enriched,
            total_cost = stats.total_cost_usd,
            exit = stats.exit_reason.as_str(),
            "batch complete"
        );
        BatchOutcome { results, stats }
    }
}
