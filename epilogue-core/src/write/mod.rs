//! Write-back: map a synthesized record into the store, then keep the
//! cache honest.
//!
//! The one hard invariant here: a production write is not done until the
//! actor's cached read-path entries are gone. A cache that cannot be
//! invalidated fails the write.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::{debug, error, info};
use uuid::Uuid;

use epilogue_model::{Actor, EnrichmentOutcome, RejectedFactor};

use crate::cache::{Cache, CacheKeys};
use crate::error::{EnrichError, Result};
use crate::store::{ActorStore, EnrichmentWrite, WriteMode};

pub struct EnrichmentWriter {
    store: Arc<dyn ActorStore>,
    cache: Arc<dyn Cache>,
    mode: WriteMode,
    run_id: Uuid,
}

impl std::fmt::Debug for EnrichmentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentWriter")
            .field("mode", &self.mode)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

impl EnrichmentWriter {
    pub fn new(store: Arc<dyn ActorStore>, cache: Arc<dyn Cache>, mode: WriteMode) -> Self {
        Self {
            store,
            cache,
            mode,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Persist one actor's enrichment. No-op (Ok) when the outcome holds
    /// no record; rejected-factor telemetry is appended either way.
    pub async fn write(
        &self,
        actor: &Actor,
        outcome: &EnrichmentOutcome,
        synthesis_model: &str,
    ) -> Result<()> {
        self.record_rejected_factors(actor, outcome).await?;

        let Some(record) = &outcome.record else {
            debug!(actor_id = actor.id, "nothing to write");
            return Ok(());
        };
        let mut record = record.clone();

        // Resolve related celebrities to internal ids where the store
        // knows the name; unresolved names are kept as-is.
        let names: Vec<String> = record
            .related_celebrities
            .iter()
            .map(|c| c.name.clone())
            .collect();
        if !names.is_empty() {
            let resolved = self.store.resolve_actors_by_name(&names).await?;
            for celebrity in &mut record.related_celebrities {
                celebrity.actor_id = resolved.get(&celebrity.name).copied();
            }
        }

        let write = EnrichmentWrite {
            actor_id: actor.id,
            source_version: source_version(synthesis_model, outcome),
            raw_sources: serde_json::to_value(&outcome.raw_sources)?,
            record,
            run_id: self.run_id,
        };
        self.store.write_enrichment(self.mode, &write).await?;

        if self.mode == WriteMode::Production {
            self.invalidate_actor(actor.id).await?;
        }
        Ok(())
    }

    /// Cache invalidation after a production write. Failure here is fatal
    /// by design: the transaction has committed, so the caller must retry
    /// or reconcile rather than serve stale reads.
    async fn invalidate_actor(&self, actor_id: i64) -> Result<()> {
        let keys = vec![
            CacheKeys::actor_profile(actor_id),
            CacheKeys::actor_death(actor_id),
        ];
        if let Err(err) = self.cache.invalidate(&keys).await {
            error!(actor_id, error = %err, "cache invalidation failed after write");
            return Err(EnrichError::CacheUnavailable(format!(
                "wrote actor {actor_id} but failed to invalidate cache: {err}"
            )));
        }
        if let Err(err) = self
            .cache
            .invalidate_pattern(&CacheKeys::actor_list_pattern())
            .await
        {
            error!(actor_id, error = %err, "list-view invalidation failed after write");
            return Err(EnrichError::CacheUnavailable(format!(
                "wrote actor {actor_id} but failed to invalidate list views: {err}"
            )));
        }
        info!(actor_id, "cache invalidated after production write");
        Ok(())
    }

    async fn record_rejected_factors(
        &self,
        actor: &Actor,
        outcome: &EnrichmentOutcome,
    ) -> Result<()> {
        if outcome.rejected_factors.is_empty() {
            return Ok(());
        }
        let rows: Vec<RejectedFactor> = outcome
            .rejected_factors
            .iter()
            .map(|factor| RejectedFactor {
                factor: factor.clone(),
                kind: "death".to_string(),
                actor_id: actor.id,
                actor_name: actor.name.clone(),
            })
            .collect();
        self.store.record_rejected_factors(&rows).await
    }
}

/// Deterministic version key for idempotent writes: same model and same
/// source set, same version.
fn source_version(synthesis_model: &str, outcome: &EnrichmentOutcome) -> String {
    let mut hasher = DefaultHasher::new();
    synthesis_model.hash(&mut hasher);
    let mut sources: Vec<&str> = outcome
        .raw_sources
        .iter()
        .map(|s| s.attribution.source_type.as_str())
        .collect();
    sources.sort_unstable();
    sources.hash(&mut hasher);
    format!("{synthesis_model}:{:x}", hasher.finish())
}
