//! Narrow persistence contract the core talks to. The production
//! implementation is Postgres; tests substitute their own.

mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use epilogue_model::{Actor, DeathRecord, RejectedFactor};

use crate::error::Result;

pub use postgres::PostgresActorStore;

/// How a finished record lands in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Update live actor columns and upsert the circumstances row in one
    /// transaction; the writer invalidates cache afterwards.
    Production,
    /// Insert into the review table keyed by the run id; production
    /// columns and cache are untouched until a reviewer promotes the row.
    Staging,
}

/// Selection criteria for batch loading.
#[derive(Debug, Clone)]
pub enum EnrichmentCriteria {
    MissingCircumstances,
    ByIds(Vec<i64>),
    ByExternalIds(Vec<i64>),
    TopBilledInYear {
        year: i32,
        max_billing: i32,
        top_movies: i32,
    },
}

/// Everything one write needs. `source_version` keys idempotency: the
/// same actor enriched from the same sources and model writes the same
/// row.
#[derive(Debug, Clone)]
pub struct EnrichmentWrite {
    pub actor_id: i64,
    pub record: DeathRecord,
    /// The consumed snippets, archived as one opaque JSON document.
    pub raw_sources: serde_json::Value,
    pub source_version: String,
    pub run_id: Uuid,
}

#[async_trait]
pub trait ActorStore: Send + Sync {
    async fn load_actor(&self, id: i64) -> Result<Option<Actor>>;

    async fn load_actors_for_enrichment(
        &self,
        criteria: &EnrichmentCriteria,
        limit: i64,
    ) -> Result<Vec<Actor>>;

    async fn write_enrichment(&self, mode: WriteMode, write: &EnrichmentWrite) -> Result<()>;

    /// Case-insensitive name resolution; unresolved names are absent from
    /// the returned map.
    async fn resolve_actors_by_name(&self, names: &[String]) -> Result<HashMap<String, i64>>;

    async fn record_rejected_factors(&self, rows: &[RejectedFactor]) -> Result<()>;
}
