//! Digitized book corpora. Cheap, high-yield for biographical narrative,
//! and exempt from early stop: the orchestrator always tries all three.

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

const BOOKS_MIN_CONTENT_LEN: usize = 100;

fn book_texts_to_outcome(
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
    if text.len() < BOOKS_MIN_CONTENT_LEN {
        return LookupOutcome::miss(
            descriptor.source_type,
            LookupErrorKind::ContentTooShort,
            format!("{} chars of book text", text.len()),
        );
    }
    if !page_mentions(actor, &text) {
        return LookupOutcome::miss(
            descriptor.source_type,
            LookupErrorKind::ContentIrrelevant,
            "book matches do not mention the subject",
        );
    }
    let confidence = biographical_confidence(&text);
    if confidence <= 0.0 {
        return LookupOutcome::miss(
            descriptor.source_type,
            LookupErrorKind::ContentIrrelevant,
            "no biographical signals in book text",
        );
    }

    let mut attribution =
        SourceAttribution::new(descriptor.source_type, descriptor.tier, confidence)
            .with_query(query.to_string());
    attribution.meta.url = url;
    attribution.meta.content_type = Some("book_excerpts".to_string());
    LookupOutcome::Hit {
        attribution,
        payload: SnippetPayload::Biography(RawBiographySnippet { text }),
    }
}

const GOOGLE_BOOKS_ENDPOINT: &str = "https://www.googleapis.com/books/v1/volumes";

/// Google Books volume search. Works unauthenticated at a lower quota;
/// `GOOGLE_BOOKS_KEY` raises it when present.
pub struct GoogleBooksSource {
    descriptor: SourceDescriptor,
    api_key: Option<String>,
}

impl std::fmt::Debug for GoogleBooksSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleBooksSource")
            .field("keyed", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl GoogleBooksSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "google_books",
                SourceType::GoogleBooks,
                SourceFamily::GoogleBooks,
                SourceCategory::Books,
                ReliabilityTier::Archival,
            )
            .with_min_delay_ms(1_000),
            api_key: std::env::var(epilogue_config::credentials::GOOGLE_BOOKS_KEY)
                .ok()
                .filter(|k| !k.trim().is_empty()),
        }
    }
}

impl Default for GoogleBooksSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    volume_info: Option<VolumeInfo>,
    search_info: Option<SearchInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    info_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchInfo {
    #[serde(default)]
    text_snippet: String,
}

#[async_trait]
impl Source for GoogleBooksSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let query = format!("\"{}\" biography", actor.name);
        let mut url = format!(
            "{GOOGLE_BOOKS_ENDPOINT}?q={}&maxResults=10",
            urlencoding::encode(&query)
        );
        if let Some(key) = &self.api_key {
            url.push_str(&format!("&key={key}"));
        }
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parsed: VolumesResponse = serde_json::from_str(&body)?;
        let first_url = parsed
            .items
            .first()
            .and_then(|v| v.volume_info.as_ref())
            .and_then(|i| i.info_link.clone());
        let texts = parsed
            .items
            .iter()
            .map(|volume| {
                let info = volume.volume_info.as_ref();
                let snippet = volume
                    .search_info
                    .as_ref()
                    .map(|s| s.text_snippet.as_str())
                    .unwrap_or_default();
                format!(
                    "{}: {} {}",
                    info.map(|i| i.title.as_str()).unwrap_or_default(),
                    info.map(|i| i.description.as_str()).unwrap_or_default(),
                    snippet
                )
            })
            .collect();
        Ok(book_texts_to_outcome(&self.descriptor, actor, &query, first_url, texts))
    }
}

const OPEN_LIBRARY_ENDPOINT: &str = "https://openlibrary.org/search.json";

pub struct OpenLibrarySource {
    descriptor: SourceDescriptor,
}

impl std::fmt::Debug for OpenLibrarySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenLibrarySource").finish_non_exhaustive()
    }
}

impl OpenLibrarySource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "open_library",
                SourceType::OpenLibrary,
                SourceFamily::OpenLibrary,
                SourceCategory::Books,
                ReliabilityTier::Archival,
            )
            .with_min_delay_ms(1_000),
        }
    }
}

impl Default for OpenLibrarySource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct OpenLibraryResponse {
    #[serde(default)]
    docs: Vec<OpenLibraryDoc>,
}

#[derive(Debug, Deserialize)]
struct OpenLibraryDoc {
    #[serde(default)]
    title: String,
    #[serde(default)]
    first_sentence: Vec<String>,
    #[serde(default)]
    subtitle: String,
    key: Option<String>,
}

#[async_trait]
impl Source for OpenLibrarySource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let query = actor.name.clone();
        let url = format!(
            "{OPEN_LIBRARY_ENDPOINT}?q={}&limit=10&fields=title,subtitle,first_sentence,key",
            urlencoding::encode(&query)
        );
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parsed: OpenLibraryResponse = serde_json::from_str(&body)?;
        let first_url = parsed
            .docs
            .first()
            .and_then(|d| d.key.as_ref())
            .map(|key| format!("https://openlibrary.org{key}"));
        let texts = parsed
            .docs
            .iter()
            .map(|doc| {
                format!(
                    "{} {} {}",
                    doc.title,
                    doc.subtitle,
                    doc.first_sentence.join(" ")
                )
            })
            .collect();
        Ok(book_texts_to_outcome(&self.descriptor, actor, &query, first_url, texts))
    }
}

const IA_BOOKS_SEARCH: &str = "https://archive.org/advancedsearch.php";

/// The texts collection of the Internet Archive. Same family as the
/// general IA source, so the pair counts once toward early stop.
pub struct InternetArchiveBooksSource {
    descriptor: SourceDescriptor,
}

impl std::fmt::Debug for InternetArchiveBooksSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternetArchiveBooksSource").finish_non_exhaustive()
    }
}

impl InternetArchiveBooksSource {
    pub fn new() -> Self {
        Self {
            descriptor: SourceDescriptor::new(
                "internet_archive_books",
                SourceType::InternetArchiveBooks,
                SourceFamily::InternetArchive,
                SourceCategory::Books,
                ReliabilityTier::Archival,
            )
            .with_min_delay_ms(2_000)
            .with_timeout_ms(20_000),
        }
    }
}

impl Default for InternetArchiveBooksSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct IaBooksResponse {
    response: IaBooksDocs,
}

#[derive(Debug, Deserialize)]
struct IaBooksDocs {
    #[serde(default)]
    docs: Vec<IaBookDoc>,
}

#[derive(Debug, Deserialize)]
struct IaBookDoc {
    identifier: Option<String>,
    #[serde(default)]
    title: serde_json::Value,
    #[serde(default)]
    description: serde_json::Value,
}

#[async_trait]
impl Source for InternetArchiveBooksSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn perform_lookup(&self, actor: &Actor, ctx: &LookupContext) -> Result<LookupOutcome> {
        let query = format!("\"{}\" AND mediatype:texts", actor.name);
        let url = format!(
            "{IA_BOOKS_SEARCH}?q={}&fl%5B%5D=identifier&fl%5B%5D=title&fl%5B%5D=description&rows=10&output=json",
            urlencoding::encode(&query)
        );
        let spec = FetchSpec::with_timeout_ms(self.descriptor.request_timeout_ms);

        let body = match ctx.fetcher.fetch_api(&url, &spec).await {
            Ok(body) => body,
            Err(err) => return Ok(miss_from_fetch(&self.descriptor, err)),
        };
        let parsed: IaBooksResponse = serde_json::from_str(&body)?;
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
            .map(|doc| {
                format!(
                    "{} {}",
                    super::archives::flatten_ia_field(&doc.title),
                    super::archives::flatten_ia_field(&doc.description)
                )
            })
            .collect();
        Ok(book_texts_to_outcome(&self.descriptor, actor, &query, first_url, texts))
    }
}
