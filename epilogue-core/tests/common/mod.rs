//! Shared fixtures for the orchestration integration tests: scripted
//! sources, a scripted synthesis LLM, an in-memory store, and a cache
//! that can be made to fail invalidation.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use epilogue_core::cache::{Cache, MemoryCache};
use epilogue_core::error::{EnrichError, Result};
use epilogue_core::fetch::HttpFetcher;
use epilogue_core::llm::{LlmClient, LlmRequest, LlmResponse, LlmResult, TokenUsage};
use epilogue_core::sources::{LookupContext, Source};
use epilogue_core::store::{ActorStore, EnrichmentCriteria, EnrichmentWrite, WriteMode};
use epilogue_model::{
    Actor, LookupErrorKind, LookupOutcome, RawBiographySnippet, RejectedFactor, ReliabilityTier,
    SnippetPayload, SourceAttribution, SourceCategory, SourceDescriptor, SourceFamily, SourceType,
};

pub fn john_wayne() -> Actor {
    Actor {
        id: 1,
        external_id: 4165,
        name: "John Wayne".into(),
        birthday: NaiveDate::from_ymd_opt(1907, 5, 26),
        deathday: NaiveDate::from_ymd_opt(1979, 6, 11),
        place_of_birth: Some("Winterset, Iowa, USA".into()),
        cause_of_death: None,
        popularity: Some(12.3),
        biography: None,
    }
}

pub fn actor_with_id(id: i64, name: &str) -> Actor {
    Actor {
        id,
        name: name.to_string(),
        ..john_wayne()
    }
}

/// What a scripted source does when called.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Hit { confidence: f64, cost_usd: f64 },
    Miss(LookupErrorKind),
    Error,
}

/// A source with fixed metadata and scripted behavior; every call is
/// appended to the shared log so tests can assert order and omission.
pub struct MockSource {
    descriptor: SourceDescriptor,
    behavior: MockBehavior,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl MockSource {
    pub fn new(
        name: &'static str,
        source_type: SourceType,
        family: SourceFamily,
        category: SourceCategory,
        tier: ReliabilityTier,
        behavior: MockBehavior,
        log: Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            descriptor: SourceDescriptor::new(name, source_type, family, category, tier)
                .with_min_delay_ms(0),
            behavior,
            log,
        })
    }
}

#[async_trait]
impl Source for MockSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn perform_lookup(&self, _actor: &Actor, _ctx: &LookupContext) -> Result<LookupOutcome> {
        self.log.lock().unwrap().push(self.descriptor.name);
        match &self.behavior {
            MockBehavior::Hit {
                confidence,
                cost_usd,
            } => {
                let attribution = SourceAttribution::new(
                    self.descriptor.source_type,
                    self.descriptor.tier,
                    *confidence,
                )
                .with_cost(*cost_usd);
                Ok(LookupOutcome::Hit {
                    attribution,
                    payload: SnippetPayload::Biography(RawBiographySnippet {
                        text: format!("Material from {}.", self.descriptor.name),
                    }),
                })
            }
            MockBehavior::Miss(kind) => Ok(LookupOutcome::miss(
                self.descriptor.source_type,
                *kind,
                "scripted miss",
            )),
            MockBehavior::Error => Err(EnrichError::Internal("scripted source error".into())),
        }
    }
}

/// Scripted synthesis model: fixed response text and per-call cost, with
/// a call counter.
pub struct ScriptedLlm {
    pub response: Mutex<LlmResult<String>>,
    pub cost_per_call: f64,
    pub calls: Mutex<u32>,
}

impl ScriptedLlm {
    pub fn ok(text: &str, cost_per_call: f64) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(text.to_string())),
            cost_per_call,
            calls: Mutex::new(0),
        })
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, _request: LlmRequest) -> LlmResult<LlmResponse> {
        *self.calls.lock().unwrap() += 1;
        match &*self.response.lock().unwrap() {
            Ok(text) => Ok(LlmResponse {
                text: text.clone(),
                usage: TokenUsage {
                    input_tokens: 2_000,
                    output_tokens: 800,
                },
                cost_usd: self.cost_per_call,
            }),
            Err(err) => Err(clone_llm_error(err)),
        }
    }
}

fn clone_llm_error(err: &epilogue_core::llm::LlmError) -> epilogue_core::llm::LlmError {
    use epilogue_core::llm::LlmError;
    match err {
        LlmError::Auth(m) => LlmError::Auth(m.clone()),
        LlmError::RateLimited(m) => LlmError::RateLimited(m.clone()),
        LlmError::Timeout => LlmError::Timeout,
        LlmError::Api { status, message } => LlmError::Api {
            status: *status,
            message: message.clone(),
        },
        LlmError::Network(m) => LlmError::Network(m.clone()),
        LlmError::Parse(m) => LlmError::Parse(m.clone()),
    }
}

/// A synthesis response that parses and validates cleanly.
pub const VALID_SYNTHESIS_JSON: &str = r#"{
    "circumstances": "He died of stomach cancer on June 11, 1979 at the UCLA Medical Center after a long illness, surrounded by his family; the diagnosis had been public since the previous year and his final months were widely covered.",
    "rumored_circumstances": null,
    "location_of_death": "Los Angeles, California",
    "cause_confidence": "high",
    "details_confidence": "high",
    "notable_factors": ["posthumous_fame"],
    "last_project": "The Shootist",
    "posthumous_releases": [],
    "career_status_at_death": "retired",
    "related_celebrities": ["Maureen O'Hara"],
    "related_deaths": null,
    "narrative": null
}"#;

/// In-memory store that records every write.
#[derive(Default)]
pub struct RecordingStore {
    pub production_writes: Mutex<Vec<EnrichmentWrite>>,
    pub staging_writes: Mutex<Vec<EnrichmentWrite>>,
    pub rejected: Mutex<Vec<RejectedFactor>>,
    pub names: Mutex<HashMap<String, i64>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_known_name(self: Arc<Self>, name: &str, id: i64) -> Arc<Self> {
        self.names.lock().unwrap().insert(name.to_lowercase(), id);
        self
    }
}

#[async_trait]
impl ActorStore for RecordingStore {
    async fn load_actor(&self, _id: i64) -> Result<Option<Actor>> {
        Ok(None)
    }

    async fn load_actors_for_enrichment(
        &self,
        _criteria: &EnrichmentCriteria,
        _limit: i64,
    ) -> Result<Vec<Actor>> {
        Ok(Vec::new())
    }

    async fn write_enrichment(&self, mode: WriteMode, write: &EnrichmentWrite) -> Result<()> {
        match mode {
            WriteMode::Production => self.production_writes.lock().unwrap().push(write.clone()),
            WriteMode::Staging => self.staging_writes.lock().unwrap().push(write.clone()),
        }
        Ok(())
    }

    async fn resolve_actors_by_name(&self, names: &[String]) -> Result<HashMap<String, i64>> {
        let known = self.names.lock().unwrap();
        Ok(names
            .iter()
            .filter_map(|n| known.get(&n.to_lowercase()).map(|id| (n.clone(), *id)))
            .collect())
    }

    async fn record_rejected_factors(&self, rows: &[RejectedFactor]) -> Result<()> {
        self.rejected.lock().unwrap().extend_from_slice(rows);
        Ok(())
    }
}

/// Cache wrapper whose invalidation paths can be switched to fail.
pub struct FlakyCache {
    inner: MemoryCache,
    pub fail_invalidation: Mutex<bool>,
    pub invalidated: Mutex<Vec<String>>,
    pub invalidated_patterns: Mutex<Vec<String>>,
}

impl FlakyCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryCache::new(),
            fail_invalidation: Mutex::new(false),
            invalidated: Mutex::new(Vec::new()),
            invalidated_patterns: Mutex::new(Vec::new()),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail_invalidation.lock().unwrap() = failing;
    }
}

#[async_trait]
impl Cache for FlakyCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn invalidate(&self, keys: &[String]) -> Result<()> {
        let failing = { *self.fail_invalidation.lock().unwrap() };
        if failing {
            return Err(EnrichError::CacheUnavailable("scripted outage".into()));
        }
        self.invalidated
            .lock()
            .unwrap()
            .extend(keys.iter().cloned());
        self.inner.invalidate(keys).await
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<()> {
        let failing = { *self.fail_invalidation.lock().unwrap() };
        if failing {
            return Err(EnrichError::CacheUnavailable("scripted outage".into()));
        }
        self.invalidated_patterns
            .lock()
            .unwrap()
            .push(pattern.to_string());
        self.inner.invalidate_pattern(pattern).await
    }
}

pub fn lookup_context(cache: Arc<dyn Cache>) -> LookupContext {
    LookupContext {
        fetcher: Arc::new(HttpFetcher::with_default_transport()),
        cache,
        cleaner_llm: None,
    }
}
