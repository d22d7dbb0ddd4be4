//! Static source metadata: identity, family, category, and reliability.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Stable identifier for every concrete source. Used in joins, telemetry,
/// and cache keys; renaming a variant is a breaking change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Wikidata,
    Wikipedia,
    Britannica,
    BiographyCom,
    Smithsonian,
    HistoryChannel,
    PeopleMagazine,
    Bbc,
    NytArchive,
    Guardian,
    ApNews,
    Variety,
    Tmz,
    ImdbBio,
    GoogleCse,
    BingSearch,
    BraveSearch,
    DuckDuckGo,
    InternetArchive,
    ChroniclingAmerica,
    Trove,
    Europeana,
    GoogleBooks,
    OpenLibrary,
    InternetArchiveBooks,
    GeminiSearch,
    ClaudeAi,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Wikidata => "wikidata",
            SourceType::Wikipedia => "wikipedia",
            SourceType::Britannica => "britannica",
            SourceType::BiographyCom => "biography_com",
            SourceType::Smithsonian => "smithsonian",
            SourceType::HistoryChannel => "history_channel",
            SourceType::PeopleMagazine => "people_magazine",
            SourceType::Bbc => "bbc",
            SourceType::NytArchive => "nyt_archive",
            SourceType::Guardian => "guardian",
            SourceType::ApNews => "ap_news",
            SourceType::Variety => "variety",
            SourceType::Tmz => "tmz",
            SourceType::ImdbBio => "imdb_bio",
            SourceType::GoogleCse => "google_cse",
            SourceType::BingSearch => "bing_search",
            SourceType::BraveSearch => "brave_search",
            SourceType::DuckDuckGo => "duckduckgo",
            SourceType::InternetArchive => "internet_archive",
            SourceType::ChroniclingAmerica => "chronicling_america",
            SourceType::Trove => "trove",
            SourceType::Europeana => "europeana",
            SourceType::GoogleBooks => "google_books",
            SourceType::OpenLibrary => "open_library",
            SourceType::InternetArchiveBooks => "internet_archive_books",
            SourceType::GeminiSearch => "gemini_search",
            SourceType::ClaudeAi => "claude_ai",
        }
    }
}

impl Display for SourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse provenance grouping. The early-stop rule counts distinct families,
/// not distinct sources, so near-duplicate corpora (Wikidata and Wikipedia,
/// or the two Internet Archive collections) count once.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceFamily {
    Wikimedia,
    Britannica,
    BiographyCom,
    Smithsonian,
    History,
    People,
    Bbc,
    Nyt,
    Guardian,
    Ap,
    Variety,
    Tmz,
    Imdb,
    Google,
    Bing,
    Brave,
    DuckDuckGo,
    InternetArchive,
    ChroniclingAmerica,
    Trove,
    Europeana,
    GoogleBooks,
    OpenLibrary,
    Ai,
}

impl SourceFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFamily::Wikimedia => "wikimedia",
            SourceFamily::Britannica => "britannica",
            SourceFamily::BiographyCom => "biography_com",
            SourceFamily::Smithsonian => "smithsonian",
            SourceFamily::History => "history",
            SourceFamily::People => "people",
            SourceFamily::Bbc => "bbc",
            SourceFamily::Nyt => "nyt",
            SourceFamily::Guardian => "guardian",
            SourceFamily::Ap => "ap",
            SourceFamily::Variety => "variety",
            SourceFamily::Tmz => "tmz",
            SourceFamily::Imdb => "imdb",
            SourceFamily::Google => "google",
            SourceFamily::Bing => "bing",
            SourceFamily::Brave => "brave",
            SourceFamily::DuckDuckGo => "duckduckgo",
            SourceFamily::InternetArchive => "internet_archive",
            SourceFamily::ChroniclingAmerica => "chronicling_america",
            SourceFamily::Trove => "trove",
            SourceFamily::Europeana => "europeana",
            SourceFamily::GoogleBooks => "google_books",
            SourceFamily::OpenLibrary => "open_library",
            SourceFamily::Ai => "ai",
        }
    }
}

impl Display for SourceFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline tier. The orchestrator walks categories in the order returned
/// by [`SourceCategory::pipeline_order`]; within a category, sources run in
/// name order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Free,
    Reference,
    Books,
    WebSearch,
    News,
    Obituary,
    Archives,
    Ai,
}

impl SourceCategory {
    /// The fixed iteration order of the pipeline.
    pub fn pipeline_order() -> [SourceCategory; 8] {
        [
            SourceCategory::Free,
            SourceCategory::Reference,
            SourceCategory::Books,
            SourceCategory::WebSearch,
            SourceCategory::News,
            SourceCategory::Obituary,
            SourceCategory::Archives,
            SourceCategory::Ai,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::Free => "free",
            SourceCategory::Reference => "reference",
            SourceCategory::Books => "books",
            SourceCategory::WebSearch => "web_search",
            SourceCategory::News => "news",
            SourceCategory::Obituary => "obituary",
            SourceCategory::Archives => "archives",
            SourceCategory::Ai => "ai",
        }
    }
}

impl Display for SourceCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A-priori trust level of a source. The score derives from the tier and
/// nothing else; per-hit confidence is tracked separately on the snippet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReliabilityTier {
    StructuredData,
    Tier1News,
    TradePress,
    SecondaryCompilation,
    MarginalEditorial,
    Archival,
    WebSearch,
    Ai,
}

impl ReliabilityTier {
    /// Fixed tier-to-score table.
    pub fn score(&self) -> f64 {
        match self {
            ReliabilityTier::StructuredData => 0.95,
            ReliabilityTier::Tier1News => 0.95,
            ReliabilityTier::Archival => 0.90,
            ReliabilityTier::TradePress => 0.90,
            ReliabilityTier::SecondaryCompilation => 0.85,
            ReliabilityTier::MarginalEditorial => 0.65,
            ReliabilityTier::WebSearch => 0.50,
            ReliabilityTier::Ai => 0.70,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReliabilityTier::StructuredData => "structured_data",
            ReliabilityTier::Tier1News => "tier_1_news",
            ReliabilityTier::TradePress => "trade_press",
            ReliabilityTier::SecondaryCompilation => "secondary_compilation",
            ReliabilityTier::MarginalEditorial => "marginal_editorial",
            ReliabilityTier::Archival => "archival",
            ReliabilityTier::WebSearch => "web_search",
            ReliabilityTier::Ai => "ai",
        }
    }
}

impl Display for ReliabilityTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static metadata describing one source instance. Constructed once per
/// source and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub name: &'static str,
    pub source_type: SourceType,
    pub family: SourceFamily,
    pub category: SourceCategory,
    pub tier: ReliabilityTier,
    pub is_free: bool,
    /// Estimated USD cost per query, zero for free sources.
    pub estimated_cost_per_query: f64,
    /// Minimum spacing between two calls to this source.
    pub min_delay_ms: u64,
    pub request_timeout_ms: u64,
    /// Whether a blocked fetch is retried through an archival mirror.
    pub archive_fallback: bool,
}

impl SourceDescriptor {
    pub fn new(
        name: &'static str,
        source_type: SourceType,
        family: SourceFamily,
        category: SourceCategory,
        tier: ReliabilityTier,
    ) -> Self {
        Self {
            name,
            source_type,
            family,
            category,
            tier,
            is_free: true,
            estimated_cost_per_query: 0.0,
            min_delay_ms: 1_000,
            request_timeout_ms: 15_000,
            archive_fallback: false,
        }
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.is_free = cost_usd == 0.0;
        self.estimated_cost_per_query = cost_usd;
        self
    }

    pub fn with_min_delay_ms(mut self, ms: u64) -> Self {
        self.min_delay_ms = ms;
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    pub fn with_archive_fallback(mut self) -> Self {
        self.archive_fallback = true;
        self
    }

    /// Reliability score derived from the tier table.
    pub fn reliability_score(&self) -> f64 {
        self.tier.score()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_scores_match_table() {
        assert_eq!(ReliabilityTier::StructuredData.score(), 0.95);
        assert_eq!(ReliabilityTier::Tier1News.score(), 0.95);
        assert_eq!(ReliabilityTier::Archival.score(), 0.90);
        assert_eq!(ReliabilityTier::TradePress.score(), 0.90);
        assert_eq!(ReliabilityTier::SecondaryCompilation.score(), 0.85);
        assert_eq!(ReliabilityTier::MarginalEditorial.score(), 0.65);
        assert_eq!(ReliabilityTier::WebSearch.score(), 0.50);
        assert_eq!(ReliabilityTier::Ai.score(), 0.70);
    }

    #[test]
    fn source_type_round_trips_through_serde() {
        let json = serde_json::to_string(&SourceType::ChroniclingAmerica).unwrap();
        assert_eq!(json, "\"chronicling_america\"");
        let back: SourceType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SourceType::ChroniclingAmerica);
    }

    #[test]
    fn descriptor_defaults_are_polite() {
        let desc = SourceDescriptor::new(
            "wikidata",
            SourceType::Wikidata,
            SourceFamily::Wikimedia,
            SourceCategory::Free,
            ReliabilityTier::StructuredData,
        );
        assert!(desc.is_free);
        assert_eq!(desc.estimated_cost_per_query, 0.0);
        assert_eq!(desc.min_delay_ms, 1_000);
        assert_eq!(desc.request_timeout_ms, 15_000);
        assert!(!desc.archive_fallback);
    }

    #[test]
    fn with_cost_clears_free_flag() {
        let desc = SourceDescriptor::new(
            "google_cse",
            SourceType::GoogleCse,
            SourceFamily::Google,
            SourceCategory::WebSearch,
            ReliabilityTier::WebSearch,
        )
        .with_cost(0.005);
        assert!(!desc.is_free);
        assert_eq!(desc.estimated_cost_per_query, 0.005);
    }

    #[test]
    fn pipeline_order_is_documented_order() {
        let order = SourceCategory::pipeline_order();
        assert_eq!(order[0], SourceCategory::Free);
        assert_eq!(order[1], SourceCategory::Reference);
        assert_eq!(order[2], SourceCategory::Books);
        assert_eq!(order[3], SourceCategory::WebSearch);
        assert_eq!(order[4], SourceCategory::News);
        assert_eq!(order[5], SourceCategory::Obituary);
        assert_eq!(order[6], SourceCategory::Archives);
        assert_eq!(order[7], SourceCategory::Ai);
    }
}
