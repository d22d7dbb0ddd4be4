//! Builds the ordered source pipeline from the run options.

use std::sync::Arc;

use tracing::{debug, info};

use epilogue_config::{EnrichmentOptions, SourceCategories};
use epilogue_model::SourceCategory;

use super::ai::{ClaudeSource, GeminiSearchSource};
use super::archives::{
    ChroniclingAmericaSource, EuropeanaSource, InternetArchiveSource, TroveSource,
};
use super::books::{GoogleBooksSource, InternetArchiveBooksSource, OpenLibrarySource};
use super::editorial::{GuardianSource, NytSource, ScrapedOutletSource, scraped_outlets};
use super::encyclopedia::{BritannicaSource, WikipediaSource};
use super::search::{BingSource, BraveSource, DuckDuckGoSource, GoogleCseSource};
use super::structured::WikidataSource;
use super::{RegisteredSource, Source};

/// The prioritized pipeline: enabled categories only, available sources
/// only, fixed category order, name order within a category.
pub struct SourceRegistry {
    sources: Vec<RegisteredSource>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("len", &self.sources.len())
            .finish_non_exhaustive()
    }
}

impl SourceRegistry {
    /// Construct the full roster and filter it down per the options.
    pub fn from_options(options: &EnrichmentOptions) -> Self {
        let mut roster: Vec<Arc<dyn Source>> = vec![
            Arc::new(WikidataSource::new()),
            Arc::new(WikipediaSource::new()),
            Arc::new(BritannicaSource::new()),
            Arc::new(NytSource::new()),
            Arc::new(GuardianSource::new()),
            Arc::new(GoogleCseSource::new()),
            Arc::new(BingSource::new()),
            Arc::new(BraveSource::new()),
            Arc::new(DuckDuckGoSource::new()),
            Arc::new(InternetArchiveSource::new()),
            Arc::new(ChroniclingAmericaSource::new()),
            Arc::new(TroveSource::new()),
            Arc::new(EuropeanaSource::new()),
            Arc::new(GoogleBooksSource::new()),
            Arc::new(OpenLibrarySource::new()),
            Arc::new(InternetArchiveBooksSource::new()),
            Arc::new(GeminiSearchSource::new()),
            Arc::new(ClaudeSource::new()),
        ];
        roster.extend(
            scraped_outlets()
                .into_iter()
                .map(|spec| Arc::new(ScrapedOutletSource::new(spec)) as Arc<dyn Source>),
        );

        Self::from_sources(roster, &options.source_categories)
    }

    /// Shared filter + ordering; tests inject their own rosters here.
    pub fn from_sources(
        roster: Vec<Arc<dyn Source>>,
        categories: &SourceCategories,
    ) -> Self {
        let mut kept: Vec<Arc<dyn Source>> = roster
            .into_iter()
            .filter(|source| category_enabled(categories, source.descriptor().category))
            .filter(|source| {
                let available = source.is_available();
                if !available {
                    debug!(
                        source = source.descriptor().name,
                        "omitted: credentials missing"
                    );
                }
                available
            })
            .collect();

        kept.sort_by(|a, b| {
            let da = a.descriptor();
            let db = b.descriptor();
            category_rank(da.category)
                .cmp(&category_rank(db.category))
                .then_with(|| da.name.cmp(db.name))
        });

        info!(count = kept.len(), "source pipeline constructed");
        Self {
            sources: kept.into_iter().map(RegisteredSource::new).collect(),
        }
    }

    pub fn sources(&self) -> &[RegisteredSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.descriptor().name).collect()
    }
}

fn category_enabled(categories: &SourceCategories, category: SourceCategory) -> bool {
    match category {
        SourceCategory::Free => categories.free,
        SourceCategory::Reference => categories.reference,
        SourceCategory::Books => categories.books,
        SourceCategory::WebSearch => categories.web_search,
        SourceCategory::News => categories.news,
        SourceCategory::Obituary => categories.obituary,
        SourceCategory::Archives => categories.archives,
        SourceCategory::Ai => categories.ai,
    }
}

fn category_rank(category: SourceCategory) -> usize {
    SourceCategory::pipeline_order()
        .iter()
        .position(|c| *c == category)
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pipeline_order_is_stable_and_documented() {
        // Credential-free roster only, so the test is hermetic.
        let options = EnrichmentOptions {
            source_categories: SourceCategories::free_only(),
            ..Default::default()
        };
        let registry = SourceRegistry::from_options(&options);
        let names = registry.names();

        // free -> reference -> books, names sorted within each category.
        let expected: Vec<&str> = vec![
            "wikidata",
            "wikipedia",
            "biography_com",
            "britannica",
            "history_channel",
            "imdb_bio",
            "smithsonian",
            "google_books",
            "internet_archive_books",
            "open_library",
        ];
        // Keyless runs may drop none of these: all are credential-free.
        assert_eq!(names, expected);

        // Stability: constructing again yields the identical order.
        let again = SourceRegistry::from_options(&options);
        assert_eq!(again.names(), expected);
    }

    #[test]
    fn disabled_categories_are_omitted_at_construction() {
        let mut categories = SourceCategories::free_only();
        categories.books = false;
        let options = EnrichmentOptions {
            source_categories: categories,
            ..Default::default()
        };
        let registry = SourceRegistry::from_options(&options);
        assert!(
            registry
                .sources()
                .iter()
                .all(|s| s.descriptor().category != SourceCategory::Books)
        );
    }
}
