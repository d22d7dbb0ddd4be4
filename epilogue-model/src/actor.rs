//! The enrichment subject.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Snapshot of an actor row as loaded from the store. The core never holds
/// one across a batch iteration; it reads a snapshot, enriches, writes back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    /// Stable internal id.
    pub id: i64,
    /// Id assigned by the upstream movie-metadata provider.
    pub external_id: i64,
    pub name: String,
    pub birthday: Option<NaiveDate>,
    pub deathday: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    /// Cause-of-death already on record, if any.
    pub cause_of_death: Option<String>,
    pub popularity: Option<f64>,
    /// Raw biography blob from the upstream provider.
    pub biography: Option<String>,
}

impl Actor {
    /// A valid death-enrichment target has a non-empty name and a deathday.
    pub fn validate_for_death_enrichment(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::InvalidActor("name is empty".into()));
        }
        if self.deathday.is_none() {
            return Err(ModelError::InvalidActor(format!(
                "{} has no deathday on record",
                self.name
            )));
        }
        Ok(())
    }

    /// Biography enrichment only requires a usable name.
    pub fn validate_for_biography(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::InvalidActor("name is empty".into()));
        }
        Ok(())
    }

    pub fn birth_year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.birthday.map(|d| d.year())
    }

    pub fn death_year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.deathday.map(|d| d.year())
    }
}
