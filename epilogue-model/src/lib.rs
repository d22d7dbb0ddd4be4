//! Core data model definitions shared across Epilogue crates.

pub mod actor;
pub mod enrichment;
pub mod error;
pub mod lookup;
pub mod source;
pub mod stats;

// Intentionally curated re-exports for downstream consumers.
pub use actor::Actor;
pub use enrichment::{
    DeathRecord, EnrichmentOutcome, EnrichmentStats, FieldConfidence, NotableFactor,
    RelatedCelebrity, SourceAttempt,
};
pub use error::{ModelError, Result as ModelResult};
pub use lookup::{
    AttributionMeta, LookupErrorKind, LookupOutcome, RawBiographySnippet, RawDeathSnippet,
    RawSourceSnippet, SnippetPayload, SourceAttribution,
};
pub use source::{
    ReliabilityTier, SourceCategory, SourceDescriptor, SourceFamily, SourceType,
};
pub use stats::{ExitReason, RejectedFactor, RunStats};
