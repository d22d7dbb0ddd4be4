//! Synthesized enrichment records and their confidence levels.

use serde::{Deserialize, Serialize};

use crate::lookup::RawSourceSnippet;
use crate::source::SourceType;

/// Per-field confidence as emitted by synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldConfidence {
    High,
    Medium,
    Low,
}

impl FieldConfidence {
    /// Mapping used when the synthesizer does not emit a confidence itself:
    /// derive it from the strongest contributing snippet.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            FieldConfidence::High
        } else if score >= 0.4 {
            FieldConfidence::Medium
        } else {
            FieldConfidence::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldConfidence::High => "high",
            FieldConfidence::Medium => "medium",
            FieldConfidence::Low => "low",
        }
    }
}

/// Closed vocabulary for notable death factors. Values outside the
/// vocabulary are stripped from the record and kept as telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotableFactor {
    Overdose,
    Suicide,
    Accident,
    Homicide,
    RareDisease,
    YoungDeath,
    OnSetDeath,
    Poverty,
    Addiction,
    MysteriousCircumstances,
    Controversy,
    CareerDecline,
    Comeback,
    PosthumousFame,
}

impl NotableFactor {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "overdose" => Some(NotableFactor::Overdose),
            "suicide" => Some(NotableFactor::Suicide),
            "accident" => Some(NotableFactor::Accident),
            "homicide" => Some(NotableFactor::Homicide),
            "rare_disease" => Some(NotableFactor::RareDisease),
            "young_death" => Some(NotableFactor::YoungDeath),
            "on_set_death" => Some(NotableFactor::OnSetDeath),
            "poverty" => Some(NotableFactor::Poverty),
            "addiction" => Some(NotableFactor::Addiction),
            "mysterious_circumstances" => Some(NotableFactor::MysteriousCircumstances),
            "controversy" => Some(NotableFactor::Controversy),
            "career_decline" => Some(NotableFactor::CareerDecline),
            "comeback" => Some(NotableFactor::Comeback),
            "posthumous_fame" => Some(NotableFactor::PosthumousFame),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotableFactor::Overdose => "overdose",
            NotableFactor::Suicide => "suicide",
            NotableFactor::Accident => "accident",
            NotableFactor::Homicide => "homicide",
            NotableFactor::RareDisease => "rare_disease",
            NotableFactor::YoungDeath => "young_death",
            NotableFactor::OnSetDeath => "on_set_death",
            NotableFactor::Poverty => "poverty",
            NotableFactor::Addiction => "addiction",
            NotableFactor::MysteriousCircumstances => "mysterious_circumstances",
            NotableFactor::Controversy => "controversy",
            NotableFactor::CareerDecline => "career_decline",
            NotableFactor::Comeback => "comeback",
            NotableFactor::PosthumousFame => "posthumous_fame",
        }
    }
}

/// A celebrity mentioned alongside the subject, with the store-resolved id
/// when name resolution succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedCelebrity {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<i64>,
}

/// The structured record produced by synthesis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeathRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circumstances: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rumored_circumstances: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_of_death: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause_confidence: Option<FieldConfidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_confidence: Option<FieldConfidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday_confidence: Option<FieldConfidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deathday_confidence: Option<FieldConfidence>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notable_factors: Vec<NotableFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_project: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub posthumous_releases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub career_status_at_death: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_celebrities: Vec<RelatedCelebrity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_deaths: Option<String>,
    /// Long-form biography, filled by the biography flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    pub has_substantive_content: bool,
}

impl DeathRecord {
    /// Field-length thresholds that gate downstream UI and write decisions.
    pub fn compute_substantive_content(&mut self) {
        let len = |s: &Option<String>| s.as_deref().map_or(0, str::len);
        self.has_substantive_content = len(&self.circumstances) > 200
            || len(&self.rumored_circumstances) > 100
            || len(&self.related_deaths) > 50;
    }
}

/// One row of the per-actor attempt log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttempt {
    pub source_type: SourceType,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<crate::lookup::LookupErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub cost_usd: f64,
}

/// Aggregate per-actor statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EnrichmentStats {
    pub sources_attempted: u32,
    pub sources_succeeded: u32,
    pub total_cost_usd: f64,
    pub elapsed_ms: u64,
}

/// Everything one actor's enrichment produced. `record == None` with a
/// non-empty `raw_sources` means synthesis failed and a retry is cheap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentOutcome {
    pub actor_id: i64,
    pub record: Option<DeathRecord>,
    pub raw_sources: Vec<RawSourceSnippet>,
    pub attempts: Vec<SourceAttempt>,
    /// Out-of-vocabulary factor strings synthesis emitted; the writer
    /// persists these as telemetry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_factors: Vec<String>,
    pub stats: EnrichmentStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnrichmentOutcome {
    pub fn empty(actor_id: i64, error: impl Into<String>) -> Self {
        Self {
            actor_id,
            record: None,
            raw_sources: Vec::new(),
            attempts: Vec::new(),
            rejected_factors: Vec::new(),
            stats: EnrichmentStats::default(),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_mapping_thresholds() {
        assert_eq!(FieldConfidence::from_score(0.95), FieldConfidence::High);
        assert_eq!(FieldConfidence::from_score(0.7), FieldConfidence::High);
        assert_eq!(FieldConfidence::from_score(0.69), FieldConfidence::Medium);
        assert_eq!(FieldConfidence::from_score(0.4), FieldConfidence::Medium);
        assert_eq!(FieldConfidence::from_score(0.39), FieldConfidence::Low);
        assert_eq!(FieldConfidence::from_score(0.0), FieldConfidence::Low);
    }

    #[test]
    fn factor_parse_accepts_spaced_and_hyphenated_forms() {
        assert_eq!(
            NotableFactor::parse("on set death"),
            Some(NotableFactor::OnSetDeath)
        );
        assert_eq!(
            NotableFactor::parse("Young-Death"),
            Some(NotableFactor::YoungDeath)
        );
        assert_eq!(NotableFactor::parse("alien abduction"), None);
    }

    #[test]
    fn substantive_content_thresholds() {
        let mut rec = DeathRecord {
            circumstances: Some("x".repeat(201)),
            ..Default::default()
        };
        rec.compute_substantive_content();
        assert!(rec.has_substantive_content);

        let mut rec = DeathRecord {
            circumstances: Some("x".repeat(200)),
            ..Default::default()
        };
        rec.compute_substantive_content();
        assert!(!rec.has_substantive_content);

        let mut rec = DeathRecord {
            rumored_circumstances: Some("x".repeat(101)),
            ..Default::default()
        };
        rec.compute_substantive_content();
        assert!(rec.has_substantive_content);

        let mut rec = DeathRecord {
            related_deaths: Some("x".repeat(51)),
            ..Default::default()
        };
        rec.compute_substantive_content();
        assert!(rec.has_substantive_content);
    }
}
