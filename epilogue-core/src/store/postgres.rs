//! Postgres-backed actor store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{debug, info};

use epilogue_model::{Actor, RejectedFactor};

use crate::error::Result;

use super::{ActorStore, EnrichmentCriteria, EnrichmentWrite, WriteMode};

#[derive(Clone, Debug)]
pub struct PostgresActorStore {
    pool: PgPool,
}

impl PostgresActorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn actor_from_row(row: &PgRow) -> std::result::Result<Actor, sqlx::Error> {
        Ok(Actor {
            id: row.try_get("id")?,
            external_id: row.try_get("external_id")?,
            name: row.try_get("name")?,
            birthday: row.try_get("birthday")?,
            deathday: row.try_get("deathday")?,
            place_of_birth: row.try_get("place_of_birth")?,
            cause_of_death: row.try_get("cause_of_death")?,
            popularity: row.try_get("popularity")?,
            biography: row.try_get("biography")?,
        })
    }
}

const ACTOR_COLUMNS: &str = "id, external_id, name, birthday, deathday, place_of_birth, \
                             cause_of_death, popularity, biography";

#[async_trait]
impl ActorStore for PostgresActorStore {
    async fn load_actor(&self, id: i64) -> Result<Option<Actor>> {
        let row = sqlx::query(&format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(Self::actor_from_row).transpose().map_err(Into::into)
    }

    async fn load_actors_for_enrichment(
        &self,
        criteria: &EnrichmentCriteria,
        limit: i64,
    ) -> Result<Vec<Actor>> {
        let rows = match criteria {
            EnrichmentCriteria::MissingCircumstances => {
                sqlx::query(&format!(
                    "SELECT {ACTOR_COLUMNS} FROM actors a \
                     WHERE a.deathday IS NOT NULL \
                       AND NOT EXISTS (SELECT 1 FROM death_circumstances dc WHERE dc.actor_id = a.id) \
                     ORDER BY a.popularity DESC NULLS LAST \
                     LIMIT $1"
                ))
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
            EnrichmentCriteria::ByIds(ids) => {
                sqlx::query(&format!(
                    "SELECT {ACTOR_COLUMNS} FROM actors WHERE id = ANY($1) LIMIT $2"
                ))
                .bind(ids)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
            EnrichmentCriteria::ByExternalIds(ids) => {
                sqlx::query(&format!(
                    "SELECT {ACTOR_COLUMNS} FROM actors WHERE external_id = ANY($1) LIMIT $2"
                ))
                .bind(ids)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
            EnrichmentCriteria::TopBilledInYear {
                year,
                max_billing,
                top_movies,
            } => {
                sqlx::query(&format!(
                    "SELECT DISTINCT {ACTOR_COLUMNS_A} FROM actors a \
                     JOIN movie_credits mc ON mc.actor_id = a.id \
                     JOIN movies m ON m.id = mc.movie_id \
                     WHERE a.deathday IS NOT NULL \
                       AND EXTRACT(YEAR FROM m.release_date) = $1 \
                       AND mc.billing_order <= $2 \
                       AND m.popularity_rank <= $3 \
                     ORDER BY a.popularity DESC NULLS LAST \
                     LIMIT $4",
                    ACTOR_COLUMNS_A = "a.id, a.external_id, a.name, a.birthday, a.deathday, \
                                       a.place_of_birth, a.cause_of_death, a.popularity, a.biography"
                ))
                .bind(year)
                .bind(max_billing)
                .bind(top_movies)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
        };

        let actors = rows
            .iter()
            .map(Self::actor_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(count = actors.len(), "loaded actors for enrichment");
        Ok(actors)
    }

    async fn write_enrichment(&self, mode: WriteMode, write: &EnrichmentWrite) -> Result<()> {
        let record = &write.record;
        let factors: Vec<String> = record
            .notable_factors
            .iter()
            .map(|f| f.as_str().to_string())
            .collect();
        let related = serde_json::to_value(&record.related_celebrities)?;
        let now = Utc::now();

        match mode {
            WriteMode::Production => {
                let mut tx = self.pool().begin().await?;

                sqlx::query(
                    "UPDATE actors SET death_enriched_at = $2, death_source_version = $3 \
                     WHERE id = $1",
                )
                .bind(write.actor_id)
                .bind(now)
                .bind(&write.source_version)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    "INSERT INTO death_circumstances ( \
                         actor_id, circumstances, rumored_circumstances, location_of_death, \
                         cause_confidence, details_confidence, birthday_confidence, deathday_confidence, \
                         notable_factors, last_project, posthumous_releases, career_status_at_death, \
                         related_celebrities, related_deaths, narrative, has_substantive_content, \
                         raw_sources, source_version, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19) \
                     ON CONFLICT (actor_id) DO UPDATE SET \
                         circumstances = EXCLUDED.circumstances, \
                         rumored_circumstances = EXCLUDED.rumored_circumstances, \
                         location_of_death = EXCLUDED.location_of_death, \
                         cause_confidence = EXCLUDED.cause_confidence, \
                         details_confidence = EXCLUDED.details_confidence, \
                         birthday_confidence = EXCLUDED.birthday_confidence, \
                         deathday_confidence = EXCLUDED.deathday_confidence, \
                         notable_factors = EXCLUDED.notable_factors, \
                         last_project = EXCLUDED.last_project, \
                         posthumous_releases = EXCLUDED.posthumous_releases, \
                         career_status_at_death = EXCLUDED.career_status_at_death, \
                         related_celebrities = EXCLUDED.related_celebrities, \
                         related_deaths = EXCLUDED.related_deaths, \
                         narrative = EXCLUDED.narrative, \
                         has_substantive_content = EXCLUDED.has_substantive_content, \
                         raw_sources = EXCLUDED.raw_sources, \
                         source_version = EXCLUDED.source_version, \
                         updated_at = EXCLUDED.updated_at",
                )
                .bind(write.actor_id)
                .bind(&record.circumstances)
                .bind(&record.rumored_circumstances)
                .bind(&record.location_of_death)
                .bind(record.cause_confidence.map(|c| c.as_str()))
                .bind(record.details_confidence.map(|c| c.as_str()))
                .bind(record.birthday_confidence.map(|c| c.as_str()))
                .bind(record.deathday_confidence.map(|c| c.as_str()))
                .bind(&factors)
                .bind(&record.last_project)
                .bind(&record.posthumous_releases)
                .bind(&record.career_status_at_death)
                .bind(&related)
                .bind(&record.related_deaths)
                .bind(&record.narrative)
                .bind(record.has_substantive_content)
                .bind(&write.raw_sources)
                .bind(&write.source_version)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                info!(actor_id = write.actor_id, "production enrichment written");
            }
            WriteMode::Staging => {
                let payload = serde_json::to_value(record)?;
                sqlx::query(
                    "INSERT INTO death_circumstances_staging \
                         (run_id, actor_id, payload, raw_sources, source_version, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6) \
                     ON CONFLICT (run_id, actor_id) DO UPDATE SET \
                         payload = EXCLUDED.payload, \
                         raw_sources = EXCLUDED.raw_sources, \
                         source_version = EXCLUDED.source_version",
                )
                .bind(write.run_id)
                .bind(write.actor_id)
                .bind(&payload)
                .bind(&write.raw_sources)
                .bind(&write.source_version)
                .bind(now)
                .execute(self.pool())
                .await?;
                info!(actor_id = write.actor_id, run_id = %write.run_id, "staging enrichment written");
            }
        }
        Ok(())
    }

    async fn resolve_actors_by_name(&self, names: &[String]) -> Result<HashMap<String, i64>> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }
        let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
        let rows = sqlx::query("SELECT id, name FROM actors WHERE LOWER(name) = ANY($1)")
            .bind(&lowered)
            .fetch_all(self.pool())
            .await?;

        let mut by_lower: HashMap<String, i64> = HashMap::new();
        for row in &rows {
            let id: i64 = row.try_get("id")?;
            let name: String = row.try_get("name")?;
            by_lower.insert(name.to_lowercase(), id);
        }

        // Key the result by the caller's original spellings.
        Ok(names
            .iter()
            .filter_map(|name| {
                by_lower
                    .get(&name.to_lowercase())
                    .map(|id| (name.clone(), *id))
            })
            .collect())
    }

    async fn record_rejected_factors(&self, rows: &[RejectedFactor]) -> Result<()> {
        for factor in rows {
            sqlx::query(
                "INSERT INTO rejected_factors (factor, kind, actor_id, actor_name, recorded_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&factor.factor)
            .bind(&factor.kind)
            .bind(factor.actor_id)
            .bind(&factor.actor_name)
            .bind(Utc::now())
            .execute(self.pool())
            .await?;
        }
        Ok(())
    }
}
