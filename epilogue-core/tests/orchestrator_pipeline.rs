//! End-to-end orchestration behavior over scripted sources: ordering,
//! early stop, cost ceilings, cancellation, and error containment.

mod common;

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use common::{
    MockBehavior, MockSource, ScriptedLlm, VALID_SYNTHESIS_JSON, actor_with_id, john_wayne,
    lookup_context,
};
use epilogue_config::{CostLimits, EnrichmentOptions, SourceCategories};
use epilogue_core::cache::MemoryCache;
use epilogue_core::orchestrate::{Orchestrator, ProgressEvent, ProgressSink};
use epilogue_core::sources::{Source, SourceRegistry};
use epilogue_core::synth::Synthesizer;
use epilogue_model::{
    ExitReason, LookupErrorKind, ReliabilityTier, SourceCategory, SourceFamily, SourceType,
};

type CallLog = Arc<Mutex<Vec<&'static str>>>;

fn free_source(
    name: &'static str,
    source_type: SourceType,
    family: SourceFamily,
    category: SourceCategory,
    tier: ReliabilityTier,
    behavior: MockBehavior,
    log: &CallLog,
) -> Arc<dyn Source> {
    MockSource::new(name, source_type, family, category, tier, behavior, log.clone())
}

fn hit(confidence: f64) -> MockBehavior {
    MockBehavior::Hit {
        confidence,
        cost_usd: 0.0,
    }
}

fn orchestrator(
    roster: Vec<Arc<dyn Source>>,
    options: EnrichmentOptions,
    llm: Arc<ScriptedLlm>,
) -> Orchestrator {
    let registry = SourceRegistry::from_sources(roster, &options.source_categories);
    let cache = Arc::new(MemoryCache::new());
    Orchestrator::new(
        registry,
        Synthesizer::new(llm),
        options,
        lookup_context(cache),
    )
}

#[tokio::test]
async fn happy_path_two_free_sources() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let roster = vec![
        free_source(
            "wikidata",
            SourceType::Wikidata,
            SourceFamily::Wikimedia,
            SourceCategory::Free,
            ReliabilityTier::StructuredData,
            hit(0.8),
            &log,
        ),
        free_source(
            "wikipedia",
            SourceType::Wikipedia,
            SourceFamily::Wikimedia,
            SourceCategory::Free,
            ReliabilityTier::SecondaryCompilation,
            hit(0.8),
            &log,
        ),
    ];
    let llm = ScriptedLlm::ok(VALID_SYNTHESIS_JSON, 0.01);
    let orch = orchestrator(roster, EnrichmentOptions::default(), llm.clone());

    let outcome = orch.enrich(&john_wayne(), &CancellationToken::new()).await;

    assert!(outcome.record.is_some());
    assert!(outcome.error.is_none());
    assert_eq!(outcome.raw_sources.len(), 2);
    assert_eq!(outcome.stats.sources_attempted, 2);
    assert_eq!(outcome.stats.sources_succeeded, 2);
    assert_eq!(llm.call_count(), 1);
    assert_eq!(*log.lock().unwrap(), vec!["wikidata", "wikipedia"]);
}

#[tokio::test]
async fn source_names_are_stable_and_ordered() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let roster = |log: &CallLog| -> Vec<Arc<dyn Source>> {
        vec![
            free_source(
                "wikipedia",
                SourceType::Wikipedia,
                SourceFamily::Wikimedia,
                SourceCategory::Free,
                ReliabilityTier::SecondaryCompilation,
                hit(0.8),
                log,
            ),
            free_source(
                "duckduckgo",
                SourceType::DuckDuckGo,
                SourceFamily::DuckDuckGo,
                SourceCategory::WebSearch,
                ReliabilityTier::WebSearch,
                hit(0.8),
                log,
            ),
            free_source(
                "open_library",
                SourceType::OpenLibrary,
                SourceFamily::OpenLibrary,
                SourceCategory::Books,
                ReliabilityTier::Archival,
                hit(0.8),
                log,
            ),
            free_source(
                "wikidata",
                SourceType::Wikidata,
                SourceFamily::Wikimedia,
                SourceCategory::Free,
                ReliabilityTier::StructuredData,
                hit(0.8),
                log,
            ),
        ]
    };
    let llm = ScriptedLlm::ok(VALID_SYNTHESIS_JSON, 0.01);
    let orch = orchestrator(roster(&log), EnrichmentOptions::default(), llm.clone());

    // Category order first (free -> books -> web_search), names within.
    assert_eq!(
        orch.source_names(),
        vec!["wikidata", "wikipedia", "open_library", "duckduckgo"]
    );
    assert_eq!(orch.source_count(), 4);

    let again = orchestrator(roster(&log), EnrichmentOptions::default(), llm);
    assert_eq!(again.source_names(), orch.source_names());
}

#[tokio::test]
async fn disabled_categories_never_lookup() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let roster = vec![
        free_source(
            "wikidata",
            SourceType::Wikidata,
            SourceFamily::Wikimedia,
            SourceCategory::Free,
            ReliabilityTier::StructuredData,
            hit(0.8),
            &log,
        ),
        free_source(
            "duckduckgo",
            SourceType::DuckDuckGo,
            SourceFamily::DuckDuckGo,
            SourceCategory::WebSearch,
            ReliabilityTier::WebSearch,
            hit(0.8),
            &log,
        ),
    ];
    let options = EnrichmentOptions {
        source_categories: SourceCategories {
            web_search: false,
            ..SourceCategories::default()
        },
        ..Default::default()
    };
    let llm = ScriptedLlm::ok(VALID_SYNTHESIS_JSON, 0.01);
    let orch = orchestrator(roster, options, llm);

    let outcome = orch.enrich(&john_wayne(), &CancellationToken::new()).await;

    assert!(outcome.record.is_some());
    assert_eq!(*log.lock().unwrap(), vec!["wikidata"]);
    assert!(!orch.source_names().contains(&"duckduckgo"));
}

#[tokio::test]
async fn early_stop_counts_families_once_and_spares_books() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let roster = vec![
        free_source(
            "wikidata",
            SourceType::Wikidata,
            SourceFamily::Wikimedia,
            SourceCategory::Free,
            ReliabilityTier::StructuredData,
            hit(0.8),
            &log,
        ),
        free_source(
            "wikipedia",
            SourceType::Wikipedia,
            SourceFamily::Wikimedia,
            SourceCategory::Free,
            ReliabilityTier::SecondaryCompilation,
            hit(0.8),
            &log,
        ),
        free_source(
            "britannica",
            SourceType::Britannica,
            SourceFamily::Britannica,
            SourceCategory::Reference,
            ReliabilityTier::SecondaryCompilation,
            hit(0.8),
            &log,
        ),
        // Sorts after britannica within the reference category.
        free_source(
            "celebrity_bio",
            SourceType::BiographyCom,
            SourceFamily::BiographyCom,
            SourceCategory::Reference,
            ReliabilityTier::SecondaryCompilation,
            hit(0.8),
            &log,
        ),
        free_source(
            "google_books",
            SourceType::GoogleBooks,
            SourceFamily::GoogleBooks,
            SourceCategory::Books,
            ReliabilityTier::Archival,
            hit(0.8),
            &log,
        ),
        free_source(
            "open_library",
            SourceType::OpenLibrary,
            SourceFamily::OpenLibrary,
            SourceCategory::Books,
            ReliabilityTier::Archival,
            hit(0.8),
            &log,
        ),
        free_source(
            "duckduckgo",
            SourceType::DuckDuckGo,
            SourceFamily::DuckDuckGo,
            SourceCategory::WebSearch,
            ReliabilityTier::WebSearch,
            hit(0.8),
            &log,
        ),
        free_source(
            "trove",
            SourceType::Trove,
            SourceFamily::Trove,
            SourceCategory::Archives,
            ReliabilityTier::Archival,
            hit(0.8),
            &log,
        ),
    ];
    let options = EnrichmentOptions {
        early_stop_source_count: 3,
        ..Default::default()
    };
    let llm = ScriptedLlm::ok(VALID_SYNTHESIS_JSON, 0.01);
    let orch = orchestrator(roster, options, llm);

    let outcome = orch.enrich(&john_wayne(), &CancellationToken::new()).await;

    // wikidata+wikipedia share a family (counts once), britannica makes 2,
    // celebrity_bio makes 3 -> stop. Books still run; search and archives
    // sources do not.
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "wikidata",
            "wikipedia",
            "britannica",
            "celebrity_bio",
            "google_books",
            "open_library"
        ]
    );
    assert_eq!(outcome.raw_sources.len(), 6);
}

#[tokio::test]
async fn low_reliability_hits_do_not_trigger_early_stop() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let roster = vec![
        // Confident hit from a web-search source: reliability 0.50 < 0.7.
        free_source(
            "duckduckgo",
            SourceType::DuckDuckGo,
            SourceFamily::DuckDuckGo,
            SourceCategory::WebSearch,
            ReliabilityTier::WebSearch,
            hit(0.8),
            &log,
        ),
        free_source(
            "trove",
            SourceType::Trove,
            SourceFamily::Trove,
            SourceCategory::Archives,
            ReliabilityTier::Archival,
            hit(0.8),
            &log,
        ),
    ];
    let options = EnrichmentOptions {
        early_stop_source_count: 1,
        ..Default::default()
    };
    let llm = ScriptedLlm::ok(VALID_SYNTHESIS_JSON, 0.01);
    let orch = orchestrator(roster, options, llm);

    orch.enrich(&john_wayne(), &CancellationToken::new()).await;

    // Had duckduckgo qualified, trove would have been skipped.
    assert_eq!(*log.lock().unwrap(), vec!["duckduckgo", "trove"]);
}

#[tokio::test]
async fn low_confidence_hits_do_not_trigger_early_stop() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let roster = vec![
        free_source(
            "wikidata",
            SourceType::Wikidata,
            SourceFamily::Wikimedia,
            SourceCategory::Free,
            ReliabilityTier::StructuredData,
            hit(0.3),
            &log,
        ),
        free_source(
            "trove",
            SourceType::Trove,
            SourceFamily::Trove,
            SourceCategory::Archives,
            ReliabilityTier::Archival,
            hit(0.8),
            &log,
        ),
    ];
    let options = EnrichmentOptions {
        early_stop_source_count: 1,
        confidence_threshold: 0.4,
        ..Default::default()
    };
    let llm = ScriptedLlm::ok(VALID_SYNTHESIS_JSON, 0.01);
    let orch = orchestrator(roster, options, llm);

    orch.enrich(&john_wayne(), &CancellationToken::new()).await;

    assert_eq!(*log.lock().unwrap(), vec!["wikidata", "trove"]);
}

#[tokio::test]
async fn per_actor_cost_ceiling_stops_collection() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let roster = vec![
        free_source(
            "wikidata",
            SourceType::Wikidata,
            SourceFamily::Wikimedia,
            SourceCategory::Free,
            ReliabilityTier::StructuredData,
            MockBehavior::Hit {
                confidence: 0.8,
                cost_usd: 0.60,
            },
            &log,
        ),
        free_source(
            "trove",
            SourceType::Trove,
            SourceFamily::Trove,
            SourceCategory::Archives,
            ReliabilityTier::Archival,
            hit(0.8),
            &log,
        ),
    ];
    let options = EnrichmentOptions {
        cost_limits: CostLimits {
            max_cost_per_actor: 0.50,
            max_total_cost: 100.0,
        },
        ..Default::default()
    };
    let llm = ScriptedLlm::ok(VALID_SYNTHESIS_JSON, 0.01);
    let orch = orchestrator(roster, options, llm);

    let outcome = orch.enrich(&john_wayne(), &CancellationToken::new()).await;

    assert_eq!(*log.lock().unwrap(), vec!["wikidata"]);
    assert_eq!(outcome.stats.sources_attempted, 1);
}

#[tokio::test]
async fn source_errors_are_contained() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let roster = vec![
        free_source(
            "wikidata",
            SourceType::Wikidata,
            SourceFamily::Wikimedia,
            SourceCategory::Free,
            ReliabilityTier::StructuredData,
            MockBehavior::Error,
            &log,
        ),
        free_source(
            "wikipedia",
            SourceType::Wikipedia,
            SourceFamily::Wikimedia,
            SourceCategory::Free,
            ReliabilityTier::SecondaryCompilation,
            hit(0.8),
            &log,
        ),
    ];
    let llm = ScriptedLlm::ok(VALID_SYNTHESIS_JSON, 0.01);
    let orch = orchestrator(roster, EnrichmentOptions::default(), llm);

    let outcome = orch.enrich(&john_wayne(), &CancellationToken::new()).await;

    assert_eq!(*log.lock().unwrap(), vec!["wikidata", "wikipedia"]);
    assert_eq!(outcome.stats.sources_attempted, 2);
    assert_eq!(outcome.stats.sources_succeeded, 1);
    assert_eq!(outcome.raw_sources.len(), 1);
    assert!(outcome.record.is_some());

    let failed = &outcome.attempts[0];
    assert!(!failed.succeeded);
    assert_eq!(failed.error_kind, Some(LookupErrorKind::UpstreamError));
}

#[tokio::test]
async fn empty_raw_sources_skip_synthesis() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let roster = vec![free_source(
        "wikidata",
        SourceType::Wikidata,
        SourceFamily::Wikimedia,
        SourceCategory::Free,
        ReliabilityTier::StructuredData,
        MockBehavior::Miss(LookupErrorKind::NotFound),
        &log,
    )];
    let llm = ScriptedLlm::ok(VALID_SYNTHESIS_JSON, 0.01);
    let orch = orchestrator(roster, EnrichmentOptions::default(), llm.clone());

    let outcome = orch.enrich(&john_wayne(), &CancellationToken::new()).await;

    assert!(outcome.record.is_none());
    assert_eq!(outcome.error.as_deref(), Some("no data"));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn batch_cost_ceiling_sets_cost_limit_exit() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let roster = vec![free_source(
        "wikidata",
        SourceType::Wikidata,
        SourceFamily::Wikimedia,
        SourceCategory::Free,
        ReliabilityTier::StructuredData,
        hit(0.8),
        &log,
    )];
    let options = EnrichmentOptions {
        cost_limits: CostLimits {
            max_cost_per_actor: 100.0,
            max_total_cost: 10.0,
        },
        ..Default::default()
    };
    // Each synthesis costs $6.00.
    let llm = ScriptedLlm::ok(VALID_SYNTHESIS_JSON, 6.0);
    let orch = orchestrator(roster, options, llm);

    let actors = vec![
        actor_with_id(1, "John Wayne"),
        actor_with_id(2, "Maureen O'Hara"),
        actor_with_id(3, "Ward Bond"),
    ];
    let batch = orch.enrich_batch(&actors, &CancellationToken::new()).await;

    assert_eq!(batch.results.len(), 2);
    assert!(batch.results.values().all(|o| o.record.is_some()));
    assert!(!batch.results.contains_key(&3));
    assert_eq!(batch.stats.exit_reason, ExitReason::CostLimit);
    assert!(batch.stats.total_cost_usd >= 10.0);
}

struct CancelAfter {
    finished: Mutex<u32>,
    after: u32,
    token: CancellationToken,
}

impl ProgressSink for CancelAfter {
    fn on_event(&self, event: &ProgressEvent) {
        if let ProgressEvent::ActorFinished { .. } = event {
            let mut finished = self.finished.lock().unwrap();
            *finished += 1;
            if *finished >= self.after {
                self.token.cancel();
            }
        }
    }
}

#[tokio::test]
async fn cancellation_between_actors_returns_partial_batch() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let roster = vec![free_source(
        "wikidata",
        SourceType::Wikidata,
        SourceFamily::Wikimedia,
        SourceCategory::Free,
        ReliabilityTier::StructuredData,
        hit(0.8),
        &log,
    )];
    let token = CancellationToken::new();
    let sink = Arc::new(CancelAfter {
        finished: Mutex::new(0),
        after: 2,
        token: token.clone(),
    });
    let llm = ScriptedLlm::ok(VALID_SYNTHESIS_JSON, 0.01);
    let orch =
        orchestrator(roster, EnrichmentOptions::default(), llm).with_progress(sink);

    let actors: Vec<_> = (1..=5)
        .map(|id| actor_with_id(id, &format!("Actor {id}")))
        .collect();
    let batch = orch.enrich_batch(&actors, &token).await;

    assert_eq!(batch.results.len(), 2);
    assert!(batch.results.contains_key(&1));
    assert!(batch.results.contains_key(&2));
    assert_eq!(batch.stats.exit_reason, ExitReason::Interrupted);
}
