//! Core library for the Epilogue enrichment pipeline.
//!
//! Three subsystems live here: the source abstraction with its rate-limited
//! fetch layer ([`sources`], [`fetch`], [`cache`], [`clean`]), the
//! per-actor/per-batch orchestrator ([`orchestrate`]), and the synthesis +
//! write-back pipeline ([`synth`], [`write`], [`store`]).

pub mod cache;
pub mod clean;
pub mod error;
pub mod fetch;
pub mod llm;
pub mod orchestrate;
pub mod sources;
pub mod store;
pub mod synth;
pub mod write;

pub use cache::{Cache, CacheKeys, MemoryCache, RedisCache};
pub use error::{EnrichError, Result};
pub use fetch::{FetchError, FetchOutcome, HttpFetcher, HttpTransport, ReqwestTransport};
pub use orchestrate::{BatchOutcome, Orchestrator, ProgressEvent, ProgressSink};
pub use sources::{LookupContext, Source, SourceRegistry};
pub use store::{ActorStore, EnrichmentCriteria, PostgresActorStore, WriteMode};
pub use synth::Synthesizer;
pub use write::EnrichmentWriter;
