//! Strict-but-tolerant JSON extraction from LLM output, and validation of
//! the synthesized record against the closed factor vocabulary.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use epilogue_model::{DeathRecord, FieldConfidence, NotableFactor, RelatedCelebrity};

use crate::error::{EnrichError, Result};

/// Models wrap JSON in prose or code fences; accept the first balanced
/// object and reject everything else.
pub fn from_llm_text<T: DeserializeOwned>(text: &str) -> Result<T> {
    let candidate = extract_json_object(text)
        .ok_or_else(|| EnrichError::SynthesisFailed("no JSON object in response".into()))?;
    Ok(serde_json::from_str(candidate)?)
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// The synthesis response as the model emits it: factors are free strings,
/// confidences are lowercase words or null.
#[derive(Debug, Deserialize)]
pub struct SynthesisResponse {
    #[serde(default)]
    pub circumstances: Option<String>,
    #[serde(default)]
    pub rumored_circumstances: Option<String>,
    #[serde(default)]
    pub location_of_death: Option<String>,
    #[serde(default)]
    pub cause_confidence: Option<FieldConfidence>,
    #[serde(default)]
    pub details_confidence: Option<FieldConfidence>,
    #[serde(default)]
    pub birthday_confidence: Option<FieldConfidence>,
    #[serde(default)]
    pub deathday_confidence: Option<FieldConfidence>,
    #[serde(default)]
    pub notable_factors: Vec<String>,
    #[serde(default)]
    pub last_project: Option<String>,
    #[serde(default)]
    pub posthumous_releases: Vec<String>,
    #[serde(default)]
    pub career_status_at_death: Option<String>,
    #[serde(default)]
    pub related_celebrities: Vec<String>,
    #[serde(default)]
    pub related_deaths: Option<String>,
    #[serde(default)]
    pub narrative: Option<String>,
}

/// Factor strings outside the vocabulary, preserved verbatim for telemetry.
#[derive(Debug, Clone)]
pub struct VocabularyFilter {
    pub accepted: Vec<NotableFactor>,
    pub rejected: Vec<String>,
}

pub fn filter_factors(raw: &[String]) -> VocabularyFilter {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for factor in raw {
        match NotableFactor::parse(factor) {
            Some(parsed) => {
                if !accepted.contains(&parsed) {
                    accepted.push(parsed);
                }
            }
            None => rejected.push(factor.clone()),
        }
    }
    VocabularyFilter { accepted, rejected }
}

/// Convert a parsed response into the domain record. `rejected` is
/// returned alongside so the caller can both persist the telemetry and
/// apply the reject-threshold rule.
pub fn into_record(response: SynthesisResponse) -> (DeathRecord, Vec<String>) {
    let VocabularyFilter { accepted, rejected } = filter_factors(&response.notable_factors);

    let mut record = DeathRecord {
        circumstances: none_if_blank(response.circumstances),
        rumored_circumstances: none_if_blank(response.rumored_circumstances),
        location_of_death: none_if_blank(response.location_of_death),
        cause_confidence: response.cause_confidence,
        details_confidence: response.details_confidence,
        birthday_confidence: response.birthday_confidence,
        deathday_confidence: response.deathday_confidence,
        notable_factors: accepted,
        last_project: none_if_blank(response.last_project),
        posthumous_releases: response.posthumous_releases,
        career_status_at_death: none_if_blank(response.career_status_at_death),
        related_celebrities: response
            .related_celebrities
            .into_iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| RelatedCelebrity {
                name,
                actor_id: None,
            })
            .collect(),
        related_deaths: none_if_blank(response.related_deaths),
        narrative: none_if_blank(response.narrative),
        has_substantive_content: false,
    };
    record.compute_substantive_content();
    (record, rejected)
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty() && v.trim() != "null")
}
