//! The uniform source contract and the shared lookup template.
//!
//! Concrete sources implement only [`Source::perform_lookup`] plus their
//! static descriptor; caching, rate limiting, the call deadline, and
//! error containment live in [`RegisteredSource::lookup`], which the
//! orchestrator calls.

pub mod ai;
pub mod archives;
pub mod books;
pub mod editorial;
pub mod encyclopedia;
pub mod matching;
pub mod registry;
pub mod search;
pub mod structured;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use epilogue_model::{
    Actor, LookupErrorKind, LookupOutcome, RawBiographySnippet, SnippetPayload,
    SourceAttribution, SourceDescriptor,
};

use crate::cache::{Cache, CacheKeys, get_json, set_json};
use crate::clean::{self, Relevance, biographical_confidence};
use crate::error::Result;
use crate::fetch::{FetchError, FetchSpec, HttpFetcher};
use crate::llm::LlmClient;

pub use registry::SourceRegistry;

/// How long memoized lookups live. A day is long enough to make batch
/// re-runs cheap and short enough to pick up fresh obituaries.
const LOOKUP_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Shared collaborators handed to every lookup.
pub struct LookupContext {
    pub fetcher: Arc<HttpFetcher>,
    pub cache: Arc<dyn Cache>,
    /// Present when LLM-assisted content narrowing is enabled.
    pub cleaner_llm: Option<Arc<dyn LlmClient>>,
}

impl std::fmt::Debug for LookupContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupContext")
            .field("ai_cleaning", &self.cleaner_llm.is_some())
            .finish_non_exhaustive()
    }
}

/// The contract every concrete source implements.
#[async_trait]
pub trait Source: Send + Sync {
    fn descriptor(&self) -> &SourceDescriptor;

    /// True iff required credentials/environment are present. Unavailable
    /// sources are omitted from the pipeline at construction.
    fn is_available(&self) -> bool {
        true
    }

    /// The raw lookup, without caching, rate limiting, or deadline.
    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome>;
}

/// Cooperative inter-call spacing. Holding the lock across the sleep
/// serializes concurrent callers of the same source instance.
#[derive(Debug)]
pub struct RateGate {
    min_delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_call: Mutex::new(None),
        }
    }

    pub async fn wait_turn(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// A source wired into the pipeline: the shared template around
/// `perform_lookup`.
pub struct RegisteredSource {
    inner: Arc<dyn Source>,
    gate: RateGate,
}

impl std::fmt::Debug for RegisteredSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSource")
            .field("name", &self.inner.descriptor().name)
            .finish_non_exhaustive()
    }
}

impl RegisteredSource {
    pub fn new(inner: Arc<dyn Source>) -> Self {
        let gate = RateGate::new(Duration::from_millis(inner.descriptor().min_delay_ms));
        Self { inner, gate }
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        self.inner.descriptor()
    }

    /// The single call the orchestrator makes.
    ///
    /// Cache probe, then the rate gate, then the deadline-bounded lookup.
    /// Source panics are not caught, but every error return is contained
    /// here as a `Miss`; the orchestrator never sees a source error.
    pub async fn lookup(&self, actor: &Actor, ctx: &LookupContext) -> LookupOutcome {
        let descriptor = self.inner.descriptor();
        let cache_key = CacheKeys::lookup(descriptor.source_type, actor.id);

        match get_json::<LookupOutcome>(ctx.cache.as_ref(), &cache_key).await {
            Ok(Some(cached)) => {
                debug!(source = descriptor.name, actor = %actor.name, "lookup served from cache");
                return cached.without_cost();
            }
            Ok(None) => {}
            Err(err) => {
                // A read-path cache failure is a slow path, not a failure.
                warn!(source = descriptor.name, error = %err, "lookup cache probe failed");
            }
        }

        self.gate.wait_turn().await;

        let deadline = Duration::from_millis(descriptor.request_timeout_ms);
        let outcome = match tokio::time::timeout(deadline, self.inner.perform_lookup(actor, ctx))
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!(source = descriptor.name, actor = %actor.name, error = %err, "lookup failed");
                LookupOutcome::miss(
                    descriptor.source_type,
                    LookupErrorKind::UpstreamError,
                    err.to_string(),
                )
            }
            Err(_elapsed) => LookupOutcome::miss(
                descriptor.source_type,
                LookupErrorKind::Timeout,
                format!("no response within {}ms", descriptor.request_timeout_ms),
            ),
        };

        let cacheable = match &outcome {
            LookupOutcome::Hit { .. } => true,
            LookupOutcome::Miss { kind, .. } => kind.is_definitive(),
        };
        if cacheable
            && let Err(err) =
                set_json(ctx.cache.as_ref(), &cache_key, &outcome, Some(LOOKUP_CACHE_TTL)).await
        {
            warn!(source = descriptor.name, error = %err, "lookup cache store failed");
        }

        outcome
    }
}

/// Shared scrape path: fetch (optionally via archive on block), clean,
/// gate on length, optionally narrow with the LLM, score confidence.
pub(crate) async fn scrape_to_snippet(
    descriptor: &SourceDescriptor,
    actor: &Actor,
    ctx: &LookupContext,
    url: &str,
    min_content_len: usize,
) -> LookupOutcome {
    let spec = FetchSpec::with_timeout_ms(descriptor.request_timeout_ms);
    let fetched = if descriptor.archive_fallback {
        ctx.fetcher.fetch_with_archive_fallback(url, &spec).await
    } else {
        ctx.fetcher.fetch_page(url, &spec).await
    };

    let page = match fetched {
        Ok(outcome) => outcome,
        Err(err) => return miss_from_fetch(descriptor, err),
    };

    let cleaned = clean::mechanical_pre_clean(&page.content);
    if cleaned.text.len() < min_content_len {
        return LookupOutcome::miss(
            descriptor.source_type,
            LookupErrorKind::ContentTooShort,
            format!("{} chars after cleaning", cleaned.text.len()),
        );
    }
    if !matching::page_mentions(actor, &cleaned.text) {
        return LookupOutcome::miss(
            descriptor.source_type,
            LookupErrorKind::ContentIrrelevant,
            "page does not mention the subject",
        );
    }

    let mut text = cleaned.text;
    let mut cleaning_cost = 0.0;
    if let Some(llm) = &ctx.cleaner_llm {
        match clean::extract_biographical(llm.as_ref(), &text, actor).await {
            Ok(extract) => {
                cleaning_cost = extract.cost_usd;
                if extract.relevance == Relevance::None {
                    return LookupOutcome::Miss {
                        source_type: descriptor.source_type,
                        kind: LookupErrorKind::ContentIrrelevant,
                        message: "LLM narrowing found no biographical content".into(),
                        cost_usd: cleaning_cost,
                    };
                }
                if !extract.text.trim().is_empty() {
                    text = extract.text;
                }
            }
            Err(err) => {
                // Narrowing is best-effort; fall back to the mechanical text.
                warn!(source = descriptor.name, error = %err, "LLM narrowing failed");
            }
        }
    }

    let confidence = biographical_confidence(&text);
    if confidence <= 0.0 {
        return LookupOutcome::Miss {
            source_type: descriptor.source_type,
            kind: LookupErrorKind::ContentIrrelevant,
            message: "no biographical signals in cleaned text".into(),
            cost_usd: cleaning_cost,
        };
    }

    let mut attribution =
        SourceAttribution::new(descriptor.source_type, descriptor.tier, confidence)
            .with_cost(descriptor.estimated_cost_per_query + cleaning_cost);
    attribution.meta.domain = url::Url::parse(&page.final_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()));
    attribution.meta.url = Some(page.final_url);
    attribution.meta.article_title = page.title.or(cleaned.title);
    attribution.meta.publication = cleaned.publication;
    attribution.meta.content_type = Some("text/html".to_string());

    LookupOutcome::Hit {
        attribution,
        payload: SnippetPayload::Biography(RawBiographySnippet { text }),
    }
}

pub(crate) fn miss_from_fetch(descriptor: &SourceDescriptor, err: FetchError) -> LookupOutcome {
    LookupOutcome::miss(descriptor.source_type, err.lookup_kind(), err.to_string())
}
