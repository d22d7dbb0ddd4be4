//! Archival corpora: Internet Archive, Chronicling America, Trove, and
//! Europeana. Historical newspapers carry the contemporaneous obituaries
//! the live web has lost.

use async_trait::async_trait;
use serde::Deserialize;

use epilogue_model::{
    Actor, LookupErrorKind, LookupOutcome, RawBiographySnippet, ReliabilityTier, SnippetPayload,
    SourceAttribution, SourceCategory, SourceDescriptor, SourceFamily, SourceType,
};

use crate::clean::biographical_confidence;
use crate::error::Result;
use crate::fetch::FetchSpec;

use super::matching::page_mentions;
use super::{LookupContext, Source, miss_from_fetch};

const ARCHIVE_MIN_CONTENT_LEN: usize = 120;

/// Assemble an outcome from concatenated archive descriptions.
fn texts_to_outcome(
    descriptor: &SourceDescriptor,
    actor: &Actor,
    query: &str,
    url: Option<String>,
    texts: Vec<String>,
) -> LookupOutcome {
    let text = texts
        .iter()
        .map(String::as_str)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if text.len() < ARCHIVE_MIN_CONTENT_LEN {
        return LookupOutcome::miss(
            descriptor.source_type,
            LookupErrorKind::ContentTooShort,
            format!("{} chars of archive text", text.len()),
        );
    }
    if !page_mentions(actor, &text) {
        return LookupOutcome::miss(
            descriptor.source_type,
            LookupErrorKind::ContentIrrelevant,
            "archive items do not mention the subject",
        );
    }
    let confidence = biographical_confidence(&text);
    if confidence <= 0.0 {
        return LookupOutcome::miss(
            descriptor.source_type,
            LookupErrorKind::ContentIrrelevant,
            "no biographical signals in archive text",
        );
    }

    let mut attribution =
        SourceAttribution::new(descriptor.source_type, descriptor.tier, confidence)
            .with_query(query.to_string());
    attribution.meta.url = url;
    LookupOutcome::Hit {
        attribution,
        payload: SnippetPayload::Biography(RawBiographySnippet { text }),
    }
}

const IA_SEARCH: &str = "https://archive.org/advancedsearch.php";

pub struct InternetArchiveSource {
    descriptor: SourceDescriptor,
}

impl std::fmt::Debug for InternetArchiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternetArchiveSource").finish_non_exhaustive()
    }
}

impl InternetArchiveSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "internet_archive",
                SourceType::InternetArchive,
                SourceFamily::InternetArchive,
                SourceCategory::Archives,
                ReliabilityTier::Archival,
            )
            .with_min_delay_ms(2_000)
            .with_timeout_ms(20_000),
        }
    }
}

impl Default for InternetArchiveSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct IaResponse {
    response: IaDocs,
}

#[derive(Debug, Deserialize)]
struct IaDocs {
    #[serde(default)]
    docs: Vec<IaDoc>,
}

#[derive(Debug, Deserialize)]
struct IaDoc {
    identifier: Option<String>,
    #[serde(default)]
    title: serde_json::Value,
    #[serde(default)]
    description: serde_json::Value,
}

/// IA metadata fields are strings or arrays of strings depending on the
/// item; flatten either shape.
pub(crate) fn flatten_ia_field(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

#[async_trait]
impl Source for InternetArchiveSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let query = format!("\"{}\"", actor.name);
        let url = format!(
            "{IA_SEARCH}?q={}&fl%5B%5D=identifier&fl%5B%5D=title&fl%5B%5D=description&rows=10&output=json",
            urlencoding::encode(&query)
        );
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parsed: IaResponse = serde_json::from_str(&body)?;
        let first_url = parsed
            .response
            .docs
            .first()
            .and_then(|d| d.identifier.as_ref())
            .map(|id| format!("https://archive.org/details/{id}"));
        let texts = parsed
            .response
            .docs
            .iter()
            .map(|doc| format!("{} {}", flatten_ia_field(&doc.title), flatten_ia_field(&doc.description)))
            .collect();
        Ok(texts_to_outcome(&self.descriptor, actor, &query, first_url, texts))
    }
}

const CHRONICLING_SEARCH: &str = "https://chroniclingamerica.loc.gov/search/pages/results/";

pub struct ChroniclingAmericaSource {
    descriptor: SourceDescriptor,
}

impl std::fmt::Debug for ChroniclingAmericaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChroniclingAmericaSource").finish_non_exhaustive()
    }
}

impl ChroniclingAmericaSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "chronicling_america",
                SourceType::ChroniclingAmerica,
                SourceFamily::ChroniclingAmerica,
                SourceCategory::Archives,
                ReliabilityTier::Archival,
            )
            .with_min_delay_ms(3_000)
            .with_timeout_ms(20_000),
        }
    }
}

impl Default for ChroniclingAmericaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ChroniclingResponse {
    #[serde(default)]
    items: Vec<ChroniclingItem>,
}

#[derive(Debug, Deserialize)]
struct ChroniclingItem {
    #[serde(default)]
    ocr_eng: String,
    id: Option<String>,
}

#[async_trait]
impl Source for ChroniclingAmericaSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let query = actor.name.clone();
        let url = format!(
            "{CHRONICLING_SEARCH}?andtext={}&format=json&rows=5",
            urlencoding::encode(&query)
        );
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parsed: ChroniclingResponse = serde_json::from_str(&body)?;
        let first_url = parsed
            .items
            .first()
            .and_then(|i| i.id.as_ref())
            .map(|id| format!("https://chroniclingamerica.loc.gov{id}"));
        // OCR text is noisy; cap each page's contribution.
        let texts = parsed
            .items
            .iter()
            .map(|item| item.ocr_eng.chars().take(2_000).collect::<String>())
            .collect();
        Ok(texts_to_outcome(&self.descriptor, actor, &query, first_url, texts))
    }
}

const TROVE_SEARCH: &str = "https://api.trove.nla.gov.au/v3/result";

pub struct TroveSource {
    descriptor: SourceDescriptor,
    api_key: Option<String>,
}

impl std::fmt::Debug for TroveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TroveSource")
            .field("configured", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl TroveSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "trove",
                SourceType::Trove,
                SourceFamily::Trove,
                SourceCategory::Archives,
                ReliabilityTier::Archival,
            )
            .with_min_delay_ms(2_000)
            .with_timeout_ms(20_000),
            api_key: std::env::var(epilogue_config::credentials::TROVE_API_KEY)
                .ok()
                .filter(|k| !k.trim().is_empty()),
        }
    }
}

impl Default for TroveSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct TroveResponse {
    #[serde(default)]
    category: Vec<TroveCategory>,
}

#[derive(Debug, Deserialize)]
struct TroveCategory {
    records: Option<TroveRecords>,
}

#[derive(Debug, Deserialize)]
struct TroveRecords {
    #[serde(default)]
    article: Vec<TroveArticle>,
}

#[derive(Debug, Deserialize)]
struct TroveArticle {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    snippet: String,
    #[serde(rename = "troveUrl")]
    trove_url: Option<String>,
}

#[async_trait]
impl Source for TroveSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let Some(api_key) = &self.api_key else {
            return Ok(LookupOutcome::miss(
                SourceType::Trove,
                LookupErrorKind::NotConfigured,
                "TROVE_API_KEY is not set",
            ));
        };
        let query = format!("\"{}\"", actor.name);
        let url = format!(
            "{TROVE_SEARCH}?q={}&category=newspaper&encoding=json&n=5",
            urlencoding::encode(&query)
        );
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms)
            .with_header("X-API-KEY", api_key.clone());

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parsed: TroveResponse = serde_json::from_str(&body)?;
        let articles: Vec<&TroveArticle> = parsed
            .category
            .iter()
            .filter_map(|c| c.records.as_ref())
            .flat_map(|r| r.article.iter())
            .collect();
        let first_url = articles.first().and_then(|a| a.trove_url.clone());
        let texts = articles
            .iter()
            .map(|a| format!("{}: {}", a.heading, a.snippet))
            .collect();
        Ok(texts_to_outcome(&self.descriptor, actor, &query, first_url, texts))
    }
}

const EUROPEANA_SEARCH: &str = "https://api.europeana.eu/record/v2/search.json";

pub struct EuropeanaSource {
    descriptor: SourceDescriptor,
    api_key: Option<String>,
}

impl std::fmt::Debug for EuropeanaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EuropeanaSource")
            .field("configured", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl EuropeanaSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "europeana",
                SourceType::Europeana,
                SourceFamily::Europeana,
                SourceCategory::Archives,
                ReliabilityTier::Archival,
            )
            .with_min_delay_ms(2_000)
            .with_timeout_ms(20_000),
            api_key: std::env::var(epilogue_config::credentials::EUROPEANA_API_KEY)
                .ok()
                .filter(|k| !k.trim().is_empty()),
        }
    }
}

impl Default for EuropeanaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct EuropeanaResponse {
    #[serde(default)]
    items: Vec<EuropeanaItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EuropeanaItem {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    dc_description: Vec<String>,
    guid: Option<String>,
}

#[async_trait]
impl Source for EuropeanaSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let Some(api_key) = &self.api_key else {
            return Ok(LookupOutcome::miss(
                SourceType::Europeana,
                LookupErrorKind::NotConfigured,
                "EUROPEANA_API_KEY is not set",
            ));
        };
        let query = format!("\"{}\"", actor.name);
        let url = format!(
            "{EUROPEANA_SEARCH}?wskey={api_key}&query={}&rows=5",
            urlencoding::encode(&query)
        );
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parsed: EuropeanaResponse = serde_json::from_str(&body)?;
        let first_url = parsed.items.first().and_then(|i| i.guid.clone());
        let texts = parsed
            .items
            .iter()
            .map(|item| format!("{} {}", item.title.join(" "), item.dc_description.join(" ")))
            .collect();
        Ok(texts_to_outcome(&self.descriptor, actor, &query, first_url, texts))
    }
}
