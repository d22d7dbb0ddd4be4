//! Editorial outlets: site-search scrapes driven by a per-outlet spec,
//! plus the two keyed news APIs (NYT article search, Guardian content).

use async_trait::async_trait;
use serde::Deserialize;

use epilogue_model::{
    Actor, LookupErrorKind, LookupOutcome, RawBiographySnippet, ReliabilityTier, SnippetPayload,
    SourceAttribution, SourceCategory, SourceDescriptor, SourceFamily, SourceType,
};

use crate::clean::biographical_confidence;
use crate::error::Result;
use crate::fetch::FetchSpec;

use super::{LookupContext, Source, miss_from_fetch, scrape_to_snippet};

/// One scraped outlet. The search URL template receives the
/// percent-encoded actor name in place of `{q}`.
#[derive(Debug, Clone)]
pub struct OutletSpec {
    pub source_type: SourceType,
    pub name: &'static str,
    pub family: SourceFamily,
    pub category: SourceCategory,
    pub tier: ReliabilityTier,
    pub search_url: &'static str,
    pub min_delay_ms: u64,
    pub min_content_len: usize,
}

/// The scraped editorial roster. APIs (NYT, Guardian) are separate types.
pub fn scraped_outlets() -> Vec<OutletSpec> {
    vec![
        OutletSpec {
            source_type: SourceType::BiographyCom,
            name: "biography_com",
            family: SourceFamily::BiographyCom,
            category: SourceCategory::Reference,
            tier: ReliabilityTier::SecondaryCompilation,
            search_url: "https://www.biography.com/search?q={q}",
            min_delay_ms: 2_000,
            min_content_len: 200,
        },
        OutletSpec {
            source_type: SourceType::Smithsonian,
            name: "smithsonian",
            family: SourceFamily::Smithsonian,
            category: SourceCategory::Reference,
            tier: ReliabilityTier::SecondaryCompilation,
            search_url: "https://www.smithsonianmag.com/search/?q={q}",
            min_delay_ms: 2_000,
            min_content_len: 200,
        },
        OutletSpec {
            source_type: SourceType::HistoryChannel,
            name: "history_channel",
            family: SourceFamily::History,
            category: SourceCategory::Reference,
            tier: ReliabilityTier::MarginalEditorial,
            search_url: "https://www.history.com/search?q={q}",
            min_delay_ms: 2_000,
            min_content_len: 200,
        },
        OutletSpec {
            source_type: SourceType::ImdbBio,
            name: "imdb_bio",
            family: SourceFamily::Imdb,
            category: SourceCategory::Reference,
            tier: ReliabilityTier::MarginalEditorial,
            search_url: "https://www.imdb.com/find/?q={q}&s=nm",
            min_delay_ms: 3_000,
            min_content_len: 150,
        },
        OutletSpec {
            source_type: SourceType::Bbc,
            name: "bbc",
            family: SourceFamily::Bbc,
            category: SourceCategory::News,
            tier: ReliabilityTier::Tier1News,
            search_url: "https://www.bbc.co.uk/search?q={q}",
            min_delay_ms: 2_000,
            min_content_len: 150,
        },
        OutletSpec {
            source_type: SourceType::ApNews,
            name: "ap_news",
            family: SourceFamily::Ap,
            category: SourceCategory::News,
            tier: ReliabilityTier::Tier1News,
            search_url: "https://apnews.com/search?q={q}",
            min_delay_ms: 2_000,
            min_content_len: 150,
        },
        OutletSpec {
            source_type: SourceType::PeopleMagazine,
            name: "people_magazine",
            family: SourceFamily::People,
            category: SourceCategory::Obituary,
            tier: ReliabilityTier::MarginalEditorial,
            search_url: "https://people.com/search?q={q}",
            min_delay_ms: 2_000,
            min_content_len: 150,
        },
        OutletSpec {
            source_type: SourceType::Variety,
            name: "variety",
            family: SourceFamily::Variety,
            category: SourceCategory::Obituary,
            tier: ReliabilityTier::TradePress,
            search_url: "https://variety.com/?s={q}",
            min_delay_ms: 2_000,
            min_content_len: 150,
        },
        OutletSpec {
            source_type: SourceType::Tmz,
            name: "tmz",
            family: SourceFamily::Tmz,
            category: SourceCategory::Obituary,
            tier: ReliabilityTier::MarginalEditorial,
            search_url: "https://www.tmz.com/search/?q={q}",
            min_delay_ms: 2_000,
            min_content_len: 150,
        },
    ]
}

/// Generic site-search scraper. All scraped outlets carry the archive
/// fallback capability; their search pages are exactly the pages bot
/// walls sit in front of.
pub struct ScrapedOutletSource {
    descriptor: SourceDescriptor,
    search_url: &'static str,
    min_content_len: usize,
}

impl std::fmt::Debug for ScrapedOutletSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapedOutletSource")
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

impl ScrapedOutletSource {
    pub fn new(spec: OutletSpec) -> Self {
        let descriptor = SourceDescriptor::new(
            spec.name,
            spec.source_type,
            spec.family,
            spec.category,
            spec.tier,
        )
        .with_min_delay_ms(spec.min_delay_ms)
        .with_archive_fallback();
        Self {
            descriptor,
            search_url: spec.search_url,
            min_content_len: spec.min_content_len,
        }
    }

    fn query_url(&self, actor: &Actor) -> String {
        self.search_url
            .replace("{q}", &urlencoding::encode(&actor.name))
    }
}

#[async_trait]
impl Source for ScrapedOutletSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let url = self.query_url(actor);
        Ok(scrape_to_snippet(&self.descriptor, actor, ctx, &url, self.min_content_len).await)
    }
}

const NYT_SEARCH: &str = "https://api.nytimes.com/svc/search/v2/articlesearch.json";

pub struct NytSource {
    descriptor: SourceDescriptor,
    api_key: Option<String>,
}

impl std::fmt::Debug for NytSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NytSource")
            .field("configured", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl NytSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "nyt_archive",
                SourceType::NytArchive,
                SourceFamily::Nyt,
                SourceCategory::News,
                ReliabilityTier::Tier1News,
            )
            .with_min_delay_ms(6_000),
            api_key: std::env::var(epilogue_config::credentials::NYT_API_KEY)
                .ok()
                .filter(|k| !k.trim().is_empty()),
        }
    }
}

impl Default for NytSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct NytResponse {
    response: NytDocs,
}

#[derive(Debug, Deserialize)]
struct NytDocs {
    #[serde(default)]
    docs: Vec<NytDoc>,
}

#[derive(Debug, Deserialize)]
struct NytDoc {
    #[serde(default)]
    r#abstract: String,
    #[serde(default)]
    lead_paragraph: String,
    #[serde(default)]
    snippet: String,
    web_url: Option<String>,
    headline: Option<NytHeadline>,
}

#[derive(Debug, Deserialize)]
struct NytHeadline {
    main: Option<String>,
}

#[async_trait]
impl Source for NytSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let Some(api_key) = &self.api_key else {
            return Ok(LookupOutcome::miss(
                SourceType::NytArchive,
                LookupErrorKind::NotConfigured,
                "NYT_API_KEY is not set",
            ));
        };
        let query = format!("\"{}\"", actor.name);
        let url = format!(
            "{NYT_SEARCH}?q={}&fq=news_desk:(\"Obits\" \"Obituaries\")&api-key={api_key}",
            urlencoding::encode(&query)
        );
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            // NYT expresses quota exhaustion as 403 as well as 429.
            Err(crate::fetch::FetchError::Blocked { .. }) => {
                return Ok(LookupOutcome::miss(
                    SourceType::NytArchive,
                    LookupErrorKind::RateLimited,
                    "NYT quota exhausted",
                ));
            }
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
            Ok(body) => body,
        };

        let parsed: NytResponse = serde_json::from_str(&body)?;
        let Some(doc) = parsed
            .response
            .docs
            .iter()
            .find(|d| super::matching::page_mentions(actor, &article_text(d)))
        else {
            return Ok(LookupOutcome::miss(
                SourceType::NytArchive,
                LookupErrorKind::NotFound,
                "no obituary mentioning the subject",
            ));
        };

        let text = article_text(doc);
        let confidence = biographical_confidence(&text);
        if confidence <= 0.0 {
            return Ok(LookupOutcome::miss(
                SourceType::NytArchive,
                LookupErrorKind::ContentIrrelevant,
                "no biographical signals in result",
            ));
        }

        let mut attribution =
            SourceAttribution::new(SourceType::NytArchive, self.descriptor.tier, confidence)
                .with_query(query);
        attribution.meta.url = doc.web_url.clone();
        attribution.meta.publication = Some("The New York Times".to_string());
        attribution.meta.article_title = doc.headline.as_ref().and_then(|h| h.main.clone());

        Ok(LookupOutcome::Hit {
            attribution,
            payload: SnippetPayload::Biography(RawBiographySnippet { text }),
        })
    }
}

fn article_text(doc: &NytDoc) -> String {
    [&doc.r#abstract, &doc.lead_paragraph, &doc.snippet]
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

const GUARDIAN_SEARCH: &str = "https://content.guardianapis.com/search";

pub struct GuardianSource {
    descriptor: SourceDescriptor,
    api_key: Option<String>,
}

impl std::fmt::Debug for GuardianSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardianSource")
            .field("configured", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl GuardianSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "guardian",
                SourceType::Guardian,
                SourceFamily::Guardian,
                SourceCategory::News,
                ReliabilityTier::Tier1News,
            )
            .with_min_delay_ms(1_000),
            api_key: std::env::var(epilogue_config::credentials::GUARDIAN_API_KEY)
                .ok()
                .filter(|k| !k.trim().is_empty()),
        }
    }
}

impl Default for GuardianSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct GuardianResponse {
    response: GuardianResults,
}

#[derive(Debug, Deserialize)]
struct GuardianResults {
    #[serde(default)]
    results: Vec<GuardianItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuardianItem {
    #[serde(default)]
    web_title: String,
    web_url: Option<String>,
    fields: Option<GuardianFields>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuardianFields {
    #[serde(default)]
    body_text: String,
}

#[async_trait]
impl Source for GuardianSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let Some(api_key) = &self.api_key else {
            return Ok(LookupOutcome::miss(
                SourceType::Guardian,
                LookupErrorKind::NotConfigured,
                "GUARDIAN_API_KEY is not set",
            ));
        };
        let query = format!("\"{}\" obituary", actor.name);
        let url = format!(
            "{GUARDIAN_SEARCH}?q={}&show-fields=bodyText&api-key={api_key}",
            urlencoding::encode(&query)
        );
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parsed: GuardianResponse = serde_json::from_str(&body)?;

        let Some(item) = parsed.response.results.iter().find(|item| {
            item.fields
                .as_ref()
                .is_some_and(|f| super::matching::page_mentions(actor, &f.body_text))
        }) else {
            return Ok(LookupOutcome::miss(
                SourceType::Guardian,
                LookupErrorKind::NotFound,
                "no article body mentioning the subject",
            ));
        };

        let text = item
            .fields
            .as_ref()
            .map(|f| f.body_text.clone())
            .unwrap_or_default();
        let confidence = biographical_confidence(&text);
        if confidence <= 0.0 {
            return Ok(LookupOutcome::miss(
                SourceType::Guardian,
                LookupErrorKind::ContentIrrelevant,
                "no biographical signals in article body",
            ));
        }

        let mut attribution =
            SourceAttribution::new(SourceType::Guardian, self.descriptor.tier, confidence)
                .with_query(query);
        attribution.meta.url = item.web_url.clone();
        attribution.meta.publication = Some("The Guardian".to_string());
        attribution.meta.article_title = Some(item.web_title.clone());

        Ok(LookupOutcome::Hit {
            attribution,
            payload: SnippetPayload::Biography(RawBiographySnippet { text }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_covers_the_editorial_outlets() {
        let outlets = scraped_outlets();
        assert_eq!(outlets.len(), 9);
        assert!(outlets.iter().all(|o| o.search_url.contains("{q}")));
    }

    #[test]
    fn query_url_substitutes_encoded_name() {
        let spec = scraped_outlets().into_iter().next().unwrap();
        let source = ScrapedOutletSource::new(spec);
        let actor = Actor {
            id: 1,
            external_id: 1,
            name: "John Wayne".into(),
            birthday: None,
            deathday: None,
            place_of_birth: None,
            cause_of_death: None,
            popularity: None,
            biography: None,
        };
        assert_eq!(
            source.query_url(&actor),
            "https://www.biography.com/search?q=John%20Wayne"
        );
    }
}
