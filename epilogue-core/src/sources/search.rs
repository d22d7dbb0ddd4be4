//! Web-search sources: three keyed JSON APIs and the DuckDuckGo HTML
//! endpoint. Search snippets are low-reliability by definition; they feed
//! synthesis but never trigger early stop.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
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

fn death_query(actor: &Actor) -> String {
    format!("\"{}\" actor death died", actor.name)
}

/// Build a biography snippet from concatenated result snippets, applying
/// the shared relevance and confidence gates.
fn snippets_to_outcome(
    descriptor: &SourceDescriptor,
    actor: &Actor,
    query: &str,
    parts: Vec<(String, Option<String>)>,
) -> LookupOutcome {
    let text = parts
        .iter()
        .map(|(snippet, _)| snippet.as_str())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if text.len() < 80 {
        return LookupOutcome::Miss {
            source_type: descriptor.source_type,
            kind: LookupErrorKind::ContentTooShort,
            message: format!("{} chars of result snippets", text.len()),
            cost_usd: descriptor.estimated_cost_per_query,
        };
    }
    if !page_mentions(actor, &text) {
        return LookupOutcome::Miss {
            source_type: descriptor.source_type,
            kind: LookupErrorKind::ContentIrrelevant,
            message: "results do not mention the subject".into(),
            cost_usd: descriptor.estimated_cost_per_query,
        };
    }
    let confidence = biographical_confidence(&text);
    if confidence <= 0.0 {
        return LookupOutcome::Miss {
            source_type: descriptor.source_type,
            kind: LookupErrorKind::ContentIrrelevant,
            message: "no biographical signals in results".into(),
            cost_usd: descriptor.estimated_cost_per_query,
        };
    }

    let mut attribution = SourceAttribution::new(descriptor.source_type, descriptor.tier, confidence)
        .with_cost(descriptor.estimated_cost_per_query)
        .with_query(query.to_string());
    attribution.meta.url = parts.into_iter().find_map(|(_, url)| url);
    attribution.meta.content_type = Some("search_results".to_string());

    LookupOutcome::Hit {
        attribution,
        payload: SnippetPayload::Biography(RawBiographySnippet { text }),
    }
}

const GOOGLE_CSE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

pub struct GoogleCseSource {
    descriptor: SourceDescriptor,
    credentials: Option<(String, String)>,
}

impl std::fmt::Debug for GoogleCseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCseSource")
            .field("configured", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl GoogleCseSource {
    pub fn new() -> Self {
        let key = std::env::var(epilogue_config::credentials::GOOGLE_CSE_KEY).ok();
        let cx = std::env::var(epilogue_config::credentials::GOOGLE_CSE_CX).ok();
        let credentials = match (key, cx) {
            (Some(key), Some(cx)) if !key.trim().is_empty() && !cx.trim().is_empty() => {
                Some((key, cx))
            }
            _ => None,
        };
        Self {
            descriptor: SourceDescriptor::new(
                "google_cse",
                SourceType::GoogleCse,
                SourceFamily::Google,
                SourceCategory::WebSearch,
                ReliabilityTier::WebSearch,
            )
            .with_cost(0.005)
            .with_min_delay_ms(1_000),
            credentials,
        }
    }
}

impl Default for GoogleCseSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    link: Option<String>,
}

#[async_trait]
impl Source for GoogleCseSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        self.credentials.is_some()
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let Some((key, cx)) = &self.credentials else {
            return Ok(LookupOutcome::miss(
                SourceType::GoogleCse,
                LookupErrorKind::NotConfigured,
                "GOOGLE_CSE_KEY / GOOGLE_CSE_CX are not set",
            ));
        };
        let query = death_query(actor);
        let url = format!(
            "{GOOGLE_CSE_ENDPOINT}?key={key}&cx={cx}&q={}",
            urlencoding::encode(&query)
        );
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parsed: CseResponse = serde_json::from_str(&body)?;
        let parts = parsed
            .items
            .into_iter()
            .map(|item| (format!("{}: {}", item.title, item.snippet), item.link))
            .collect();
        Ok(snippets_to_outcome(&self.descriptor, actor, &query, parts))
    }
}

const BING_ENDPOINT: &str = "https://api.bing.microsoft.com/v7.0/search";

pub struct BingSource {
    descriptor: SourceDescriptor,
    api_key: Option<String>,
}

impl std::fmt::Debug for BingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BingSource")
            .field("configured", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl BingSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "bing_search",
                SourceType::BingSearch,
                SourceFamily::Bing,
                SourceCategory::WebSearch,
                ReliabilityTier::WebSearch,
            )
            .with_cost(0.003)
            .with_min_delay_ms(500),
            api_key: std::env::var(epilogue_config::credentials::BING_SEARCH_KEY)
                .ok()
                .filter(|k| !k.trim().is_empty()),
        }
    }
}

impl Default for BingSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BingResponse {
    web_pages: Option<BingWebPages>,
}

#[derive(Debug, Deserialize)]
struct BingWebPages {
    #[serde(default)]
    value: Vec<BingPage>,
}

#[derive(Debug, Deserialize)]
struct BingPage {
    #[serde(default)]
    name: String,
    #[serde(default)]
    snippet: String,
    url: Option<String>,
}

#[async_trait]
impl Source for BingSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let Some(api_key) = &self.api_key else {
            return Ok(LookupOutcome::miss(
                SourceType::BingSearch,
                LookupErrorKind::NotConfigured,
                "BING_SEARCH_KEY is not set",
            ));
        };
        let query = death_query(actor);
        let url = format!("{BING_ENDPOINT}?q={}", urlencoding::encode(&query));
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms)
            .with_header("Ocp-Apim-Subscription-Key", api_key.clone());

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parsed: BingResponse = serde_json::from_str(&body)?;
        let parts = parsed
            .web_pages
            .map(|w| w.value)
            .unwrap_or_default()
            .into_iter()
            .map(|page| (format!("{}: {}", page.name, page.snippet), page.url))
            .collect();
        Ok(snippets_to_outcome(&self.descriptor, actor, &query, parts))
    }
}

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

pub struct BraveSource {
    descriptor: SourceDescriptor,
    api_key: Option<String>,
}

impl std::fmt::Debug for BraveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BraveSource")
            .field("configured", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl BraveSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "brave_search",
                SourceType::BraveSearch,
                SourceFamily::Brave,
                SourceCategory::WebSearch,
                ReliabilityTier::WebSearch,
            )
            .with_cost(0.005)
            .with_min_delay_ms(1_000),
            api_key: std::env::var(epilogue_config::credentials::BRAVE_SEARCH_KEY)
                .ok()
                .filter(|k| !k.trim().is_empty()),
        }
    }
}

impl Default for BraveSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    url: Option<String>,
}

#[async_trait]
impl Source for BraveSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let Some(api_key) = &self.api_key else {
            return Ok(LookupOutcome::miss(
                SourceType::BraveSearch,
                LookupErrorKind::NotConfigured,
                "BRAVE_SEARCH_KEY is not set",
            ));
        };
        let query = death_query(actor);
        let url = format!("{BRAVE_ENDPOINT}?q={}", urlencoding::encode(&query));
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms)
            .with_header("X-Subscription-Token", api_key.clone());

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parsed: BraveResponse = serde_json::from_str(&body)?;
        let parts = parsed
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|result| (format!("{}: {}", result.title, result.description), result.url))
            .collect();
        Ok(snippets_to_outcome(&self.descriptor, actor, &query, parts))
    }
}

const DUCKDUCKGO_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

static DDG_SNIPPET: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".result__snippet").expect("ddg selector should parse"));
static DDG_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".result__a").expect("ddg link selector should parse"));

/// DuckDuckGo's HTML endpoint serves CAPTCHA walls with HTTP 200; the
/// fetch layer's sentinel scan is what catches those.
pub struct DuckDuckGoSource {
    descriptor: SourceDescriptor,
}

impl std::fmt::Debug for DuckDuckGoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDuckGoSource").finish_non_exhaustive()
    }
}

impl DuckDuckGoSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "duckduckgo",
                SourceType::DuckDuckGo,
                SourceFamily::DuckDuckGo,
                SourceCategory::WebSearch,
                ReliabilityTier::WebSearch,
            )
            .with_min_delay_ms(3_000),
        }
    }

    fn parse_results(html: &str) -> Vec<(String, Option<String>)> {
        let document = Html::parse_document(html);
        let links: Vec<Option<String>> = document
            .select(&DDG_LINK)
            .map(|el| el.value().attr("href").map(|h| h.to_string()))
            .collect();
        document
            .select(&DDG_SNIPPET)
            .enumerate()
            .map(|(i, el)| {
                let text = el.text().collect::<String>().trim().to_string();
                (text, links.get(i).cloned().flatten())
            })
            .collect()
    }
}

impl Default for DuckDuckGoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for DuckDuckGoSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let query = death_query(actor);
        let url = format!("{DUCKDUCKGO_ENDPOINT}?q={}", urlencoding::encode(&query));
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let page = match ctx.fetcher.fetch_page(&url, &spec).await {
            Ok(page) => page,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parts = Self::parse_results(&page.content);
        Ok(snippets_to_outcome(&self.descriptor, actor, &query, parts))
    }
}
