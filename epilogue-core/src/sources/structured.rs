//! Wikidata SPARQL lookup: death date/place/cause/manner claims.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use epilogue_model::{
    Actor, LookupErrorKind, LookupOutcome, RawDeathSnippet, ReliabilityTier, SnippetPayload,
    SourceAttribution, SourceCategory, SourceDescriptor, SourceFamily, SourceType,
};

use crate::error::Result;
use crate::fetch::FetchSpec;

use super::matching::{PersonCandidate, match_candidate};
use super::{LookupContext, Source, miss_from_fetch};

const SPARQL_ENDPOINT: &str = "https://query.wikidata.org/sparql";

pub struct WikidataSource {
    descriptor: SourceDescriptor,
}

impl std::fmt::Debug for WikidataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WikidataSource").finish_non_exhaustive()
    }
}

impl WikidataSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "wikidata",
                SourceType::Wikidata,
                SourceFamily::Wikimedia,
                SourceCategory::Free,
                ReliabilityTier::StructuredData,
            )
            .with_min_delay_ms(1_000),
        }
    }

    fn sparql_query(name: &str) -> String {
        // Persons with a matching label; death claims are optional so a
        // person missing a cause still matches.
        format!(
            r#"SELECT ?person ?personLabel ?birth ?death ?placeLabel ?causeLabel ?mannerLabel WHERE {{
  ?person wdt:P31 wd:Q5 ;
          rdfs:label "{name}"@en .
  OPTIONAL {{ ?person wdt:P569 ?birth . }}
  OPTIONAL {{ ?person wdt:P570 ?death . }}
  OPTIONAL {{ ?person wdt:P20 ?place . }}
  OPTIONAL {{ ?person wdt:P509 ?cause . }}
  OPTIONAL {{ ?person wdt:P1196 ?manner . }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en" . }}
}} LIMIT 20"#
        )
    }
}

impl Default for WikidataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<SparqlBinding>,
}

#[derive(Debug, Default, Deserialize)]
struct SparqlBinding {
    #[serde(rename = "personLabel")]
    person_label: Option<SparqlValue>,
    birth: Option<SparqlValue>,
    death: Option<SparqlValue>,
    #[serde(rename = "placeLabel")]
    place_label: Option<SparqlValue>,
    #[serde(rename = "causeLabel")]
    cause_label: Option<SparqlValue>,
    #[serde(rename = "mannerLabel")]
    manner_label: Option<SparqlValue>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

fn year_of(value: &Option<SparqlValue>) -> Option<i32> {
    value
        .as_ref()
        .and_then(|v| v.value.get(..4))
        .and_then(|y| y.parse().ok())
}

fn label_of(value: &Option<SparqlValue>) -> Option<String> {
    value.as_ref().map(|v| v.value.clone()).filter(|v| {
        // Unlabelled entities come back as bare Q-ids.
        !(v.starts_with('Q') && v[1..].chars().all(|c| c.is_ascii_digit()))
    })
}

#[async_trait]
impl Source for WikidataSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let query = Self::sparql_query(&actor.name);
        let url = format!(
            "{SPARQL_ENDPOINT}?format=json&query={}",
            urlencoding::encode(&query)
        );
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parsed: SparqlResponse = serde_json::from_str(&body)?;
        let bindings = parsed.results.bindings;
        if bindings.is_empty() {
            return Ok(LookupOutcome::miss(
                SourceType::Wikidata,
                LookupErrorKind::NotFound,
                "no matching person entity",
            ));
        }

        let candidates: Vec<PersonCandidate> = bindings
            .iter()
            .map(|b| PersonCandidate {
                name: b
                    .person_label
                    .as_ref()
                    .map(|v| v.value.clone())
                    .unwrap_or_default(),
                birth_year: year_of(&b.birth),
            })
            .collect();
        let Some(matched) = match_candidate(actor, &candidates) else {
            return Ok(LookupOutcome::miss(
                SourceType::Wikidata,
                LookupErrorKind::NotFound,
                "no confident disambiguation among candidates",
            ));
        };
        let binding = bindings
            .iter()
            .find(|b| {
                b.person_label.as_ref().map(|v| v.value.as_str()) == Some(matched.name.as_str())
            })
            .unwrap_or(&bindings[0]);

        let cause = label_of(&binding.cause_label);
        let manner = label_of(&binding.manner_label);
        let place = label_of(&binding.place_label);
        if cause.is_none() && manner.is_none() && place.is_none() {
            return Ok(LookupOutcome::miss(
                SourceType::Wikidata,
                LookupErrorKind::NotFound,
                "entity matched but carries no death claims",
            ));
        }

        let circumstances = match (&cause, &manner) {
            (Some(c), Some(m)) => Some(format!("{} died of {c} ({m}).", actor.name)),
            (Some(c), None) => Some(format!("{} died of {c}.", actor.name)),
            (None, Some(m)) => Some(format!("Manner of death recorded as {m}.")),
            (None, None) => None,
        };

        // Birth-year-confirmed structured claims are the strongest hits
        // this pipeline sees.
        let confidence = if matched.birth_year == actor.birth_year() && actor.birthday.is_some() {
            0.9
        } else {
            0.7
        };
        debug!(actor = %actor.name, confidence, "wikidata claims matched");

        let attribution =
            SourceAttribution::new(SourceType::Wikidata, self.descriptor.tier, confidence)
                .with_url(SPARQL_ENDPOINT)
                .with_query(query);
        Ok(LookupOutcome::Hit {
            attribution,
            payload: SnippetPayload::Death(RawDeathSnippet {
                circumstances,
                location_of_death: place,
                ..Default::default()
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_embeds_the_exact_name() {
        let query = WikidataSource::sparql_query("John Wayne");
        assert!(query.contains(r#"rdfs:label "John Wayne"@en"#));
        assert!(query.contains("wdt:P570"));
        assert!(query.contains("wdt:P509"));
    }

    #[test]
    fn bare_qids_are_not_labels() {
        assert_eq!(
            label_of(&Some(SparqlValue {
                value: "Q12345".into()
            })),
            None
        );
        assert_eq!(
            label_of(&Some(SparqlValue {
                value: "stomach cancer".into()
            })),
            Some("stomach cancer".to_string())
        );
    }

}
