//! Per-call lookup results: attributions, snippets, and the error taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::{ReliabilityTier, SourceType};

/// Optional descriptive metadata attached to an attribution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributionMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_used: Option<String>,
    /// Raw upstream payload, kept for the archived raw-source blob.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

/// Records where a snippet came from and how much the hit is trusted.
///
/// `confidence` is per-hit (is this text actually about the subject);
/// the tier score is per-source and invariant across queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub source_type: SourceType,
    pub retrieved_at: DateTime<Utc>,
    pub confidence: f64,
    pub tier: ReliabilityTier,
    pub reliability_score: f64,
    pub cost_usd: f64,
    #[serde(default)]
    pub meta: AttributionMeta,
}

impl SourceAttribution {
    pub fn new(source_type: SourceType, tier: ReliabilityTier, confidence: f64) -> Self {
        Self {
            source_type,
            retrieved_at: Utc::now(),
            confidence: confidence.clamp(0.0, 1.0),
            tier,
            reliability_score: tier.score(),
            cost_usd: 0.0,
            meta: AttributionMeta::default(),
        }
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.meta.url = Some(url.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.meta.query_used = Some(query.into());
        self
    }
}

/// Free-text biography material scraped or fetched from one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBiographySnippet {
    pub text: String,
}

/// Structured death material, emitted by sources that can distinguish the
/// fields themselves (structured data and the grounded-search LLMs).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDeathSnippet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circumstances: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rumored_circumstances: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notable_factors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_of_death: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_celebrities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnippetPayload {
    Biography(RawBiographySnippet),
    Death(RawDeathSnippet),
}

impl SnippetPayload {
    /// Flattened text view, used for prompt assembly.
    pub fn text(&self) -> String {
        match self {
            SnippetPayload::Biography(b) => b.text.clone(),
            SnippetPayload::Death(d) => {
                let mut parts = Vec::new();
                if let Some(c) = &d.circumstances {
                    parts.push(c.clone());
                }
                if let Some(r) = &d.rumored_circumstances {
                    parts.push(format!("Rumored: {r}"));
                }
                if let Some(l) = &d.location_of_death {
                    parts.push(format!("Location of death: {l}"));
                }
                if let Some(a) = &d.additional_context {
                    parts.push(a.clone());
                }
                parts.join("\n")
            }
        }
    }
}

/// A successful lookup: attribution plus payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSourceSnippet {
    pub attribution: SourceAttribution,
    pub payload: SnippetPayload,
}

/// Error taxonomy shared by every source. These are outcomes, not bugs;
/// all of them are recovered locally by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupErrorKind {
    NotConfigured,
    RateLimited,
    Blocked,
    Timeout,
    NotFound,
    ContentTooShort,
    ContentIrrelevant,
    UpstreamError,
}

impl LookupErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupErrorKind::NotConfigured => "not_configured",
            LookupErrorKind::RateLimited => "rate_limited",
            LookupErrorKind::Blocked => "blocked",
            LookupErrorKind::Timeout => "timeout",
            LookupErrorKind::NotFound => "not_found",
            LookupErrorKind::ContentTooShort => "content_too_short",
            LookupErrorKind::ContentIrrelevant => "content_irrelevant",
            LookupErrorKind::UpstreamError => "upstream_error",
        }
    }

    /// Definitive failures are cached; transient ones are retried on the
    /// next run.
    pub fn is_definitive(&self) -> bool {
        matches!(
            self,
            LookupErrorKind::NotFound
                | LookupErrorKind::ContentTooShort
                | LookupErrorKind::ContentIrrelevant
        )
    }
}

impl std::fmt::Display for LookupErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The single result shape every source call produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LookupOutcome {
    Hit {
        attribution: SourceAttribution,
        payload: SnippetPayload,
    },
    Miss {
        source_type: SourceType,
        kind: LookupErrorKind,
        message: String,
        /// Cost spent before the failure (paid APIs bill misses too).
        #[serde(default)]
        cost_usd: f64,
    },
}

impl LookupOutcome {
    pub fn miss(source_type: SourceType, kind: LookupErrorKind, message: impl Into<String>) -> Self {
        LookupOutcome::Miss {
            source_type,
            kind,
            message: message.into(),
            cost_usd: 0.0,
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            LookupOutcome::Hit { attribution, .. } => attribution.source_type,
            LookupOutcome::Miss { source_type, .. } => *source_type,
        }
    }

    pub fn cost_usd(&self) -> f64 {
        match self {
            LookupOutcome::Hit { attribution, .. } => attribution.cost_usd,
            LookupOutcome::Miss { cost_usd, .. } => *cost_usd,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, LookupOutcome::Hit { .. })
    }

    /// Strip the cost from a cached outcome so replays never bill twice.
    pub fn without_cost(mut self) -> Self {
        match &mut self {
            LookupOutcome::Hit { attribution, .. } => attribution.cost_usd = 0.0,
            LookupOutcome::Miss { cost_usd, .. } => *cost_usd = 0.0,
        }
        self
    }
}
