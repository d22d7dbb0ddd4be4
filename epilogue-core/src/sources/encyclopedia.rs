//! Encyclopedia sources: the Wikipedia REST API and the Britannica site.

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

use super::{LookupContext, Source, miss_from_fetch, scrape_to_snippet};

const WIKIPEDIA_SUMMARY: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";
const BRITANNICA_SEARCH: &str = "https://www.britannica.com/search?query=";

const WIKIPEDIA_MIN_CONTENT_LEN: usize = 100;
const BRITANNICA_MIN_CONTENT_LEN: usize = 200;

pub struct WikipediaSource {
    descriptor: SourceDescriptor,
}

impl std::fmt::Debug for WikipediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WikipediaSource").finish_non_exhaustive()
    }
}

impl WikipediaSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "wikipedia",
                SourceType::Wikipedia,
                SourceFamily::Wikimedia,
                SourceCategory::Free,
                ReliabilityTier::SecondaryCompilation,
            )
            .with_min_delay_ms(500),
        }
    }
}

impl Default for WikipediaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(rename = "type", default)]
    page_type: String,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<DesktopUrls>,
}

#[derive(Debug, Deserialize)]
struct DesktopUrls {
    page: Option<String>,
}

#[async_trait]
impl Source for WikipediaSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let slug = actor.name.replace(' ', "_");
        let url = format!("{WIKIPEDIA_SUMMARY}/{}", urlencoding::encode(&slug));
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let summary: PageSummary = serde_json::from_str(&body)?;

        if summary.page_type == "disambiguation" {
            return Ok(LookupOutcome::miss(
                SourceType::Wikipedia,
                LookupErrorKind::NotFound,
                "title resolves to a disambiguation page",
            ));
        }
        if summary.extract.len() < WIKIPEDIA_MIN_CONTENT_LEN {
            return Ok(LookupOutcome::miss(
                SourceType::Wikipedia,
                LookupErrorKind::ContentTooShort,
                format!("{} chars in extract", summary.extract.len()),
            ));
        }
        if !super::matching::page_mentions(actor, &summary.extract) {
            return Ok(LookupOutcome::miss(
                SourceType::Wikipedia,
                LookupErrorKind::ContentIrrelevant,
                "extract does not mention the subject",
            ));
        }

        let confidence = biographical_confidence(&summary.extract);
        if confidence <= 0.0 {
            return Ok(LookupOutcome::miss(
                SourceType::Wikipedia,
                LookupErrorKind::ContentIrrelevant,
                "no biographical signals in extract",
            ));
        }

        let mut attribution =
            SourceAttribution::new(SourceType::Wikipedia, self.descriptor.tier, confidence);
        attribution.meta.article_title = Some(summary.title);
        attribution.meta.publication = Some("Wikipedia".to_string());
        attribution.meta.url = summary
            .content_urls
            .and_then(|u| u.desktop)
            .and_then(|d| d.page);

        Ok(LookupOutcome::Hit {
            attribution,
            payload: SnippetPayload::Biography(RawBiographySnippet {
                text: summary.extract,
            }),
        })
    }
}

static BRITANNICA_RESULT_LINK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href^=\"/biography/\"]").expect("britannica selector should parse")
});

pub struct BritannicaSource {
    descriptor: SourceDescriptor,
}

impl std::fmt::Debug for BritannicaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BritannicaSource").finish_non_exhaustive()
    }
}

impl BritannicaSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "britannica",
                SourceType::Britannica,
                SourceFamily::Britannica,
                SourceCategory::Reference,
                ReliabilityTier::SecondaryCompilation,
            )
            .with_min_delay_ms(2_000)
            .with_archive_fallback(),
        }
    }

    fn first_biography_link(html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        document
            .select(&BRITANNICA_RESULT_LINK)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|href| format!("https://www.britannica.com{href}"))
    }
}

impl Default for BritannicaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for BritannicaSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let search_url = format!("{BRITANNICA_SEARCH}{}", urlencoding::encode(&actor.name));
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let search_page = match ctx
            .fetcher
            .fetch_with_archive_fallback(&search_url, &spec)
            .await
        {
            Ok(page) => page,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };

        let Some(article_url) = Self::first_biography_link(&search_page.content) else {
            return Ok(LookupOutcome::miss(
                SourceType::Britannica,
                LookupErrorKind::NotFound,
                "no biography entry in search results",
            ));
        };

        Ok(scrape_to_snippet(
            &self.descriptor,
            actor,
            ctx,
            &article_url,
            BRITANNICA_MIN_CONTENT_LEN,
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn britannica_link_extraction_prefers_biographies() {
        let html = r#"<html><body>
            <a href="/topic/western-film">Western</a>
            <a href="/biography/John-Wayne">John Wayne</a>
        </body></html>"#;
        assert_eq!(
            BritannicaSource::first_biography_link(html).as_deref(),
            Some("https://www.britannica.com/biography/John-Wayne")
        );
        assert_eq!(
            BritannicaSource::first_biography_link("<html><body></body></html>"),
            None
        );
    }
}
