//! Configuration models and environment overlay for the Epilogue pipeline.

pub mod credentials;
pub mod models;

pub use credentials::{all_present, env_present};
pub use models::{
    CostLimits, EnrichmentOptions, RawEnrichmentOptions, SourceCategories,
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_EARLY_STOP_SOURCE_COUNT,
    DEFAULT_MAX_COST_PER_ACTOR, DEFAULT_MAX_TOTAL_COST, DEFAULT_SYNTHESIS_MODEL,
};
