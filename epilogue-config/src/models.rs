//! Enrichment run options: raw (as deserialized) and resolved forms.
//!
//! Unknown keys are ignored for forward compatibility; malformed values
//! fall back to the documented defaults with a warning.

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_EARLY_STOP_SOURCE_COUNT: u32 = 5;
pub const DEFAULT_MAX_COST_PER_ACTOR: f64 = 1.50;
pub const DEFAULT_MAX_TOTAL_COST: f64 = 50.0;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.3;
pub const DEFAULT_SYNTHESIS_MODEL: &str = "claude-sonnet-4-5";

/// Boolean toggle per pipeline category. Unchecked categories are omitted
/// from the pipeline at construction time, not filtered per call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceCategories {
    pub free: bool,
    pub reference: bool,
    pub books: bool,
    pub web_search: bool,
    pub news: bool,
    pub obituary: bool,
    pub archives: bool,
    pub ai: bool,
}

impl Default for SourceCategories {
    fn default() -> Self {
        Self {
            free: true,
            reference: true,
            books: true,
            web_search: true,
            news: true,
            obituary: true,
            archives: true,
            ai: true,
        }
    }
}

impl SourceCategories {
    /// Only the no-cost categories, the default for unattended backfills.
    pub fn free_only() -> Self {
        Self {
            free: true,
            reference: true,
            books: true,
            web_search: false,
            news: false,
            obituary: false,
            archives: false,
            ai: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostLimits {
    pub max_cost_per_actor: f64,
    pub max_total_cost: f64,
}

impl Default for CostLimits {
    fn default() -> Self {
        Self {
            max_cost_per_actor: DEFAULT_MAX_COST_PER_ACTOR,
            max_total_cost: DEFAULT_MAX_TOTAL_COST,
        }
    }
}

/// Options as they arrive from a config file or job payload. Every field is
/// optional and loosely typed; [`EnrichmentOptions::resolve`] normalizes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEnrichmentOptions {
    pub source_categories: Option<SourceCategories>,
    pub early_stop_source_count: Option<f64>,
    pub max_cost_per_actor: Option<f64>,
    pub max_total_cost: Option<f64>,
    pub confidence_threshold: Option<f64>,
    pub synthesis_model: Option<String>,
    pub ai_cleaning: Option<bool>,
    pub staging: Option<bool>,
}

impl RawEnrichmentOptions {
    /// Overlay `EPILOGUE_*` environment variables onto options parsed from
    /// a job payload. The environment wins; unset or unparseable variables
    /// leave the payload value alone.
    pub fn overlay_env(mut self) -> Self {
        if let Some(flag) = env_var("EPILOGUE_AI_CLEANING").and_then(|v| flag_from_str(&v)) {
            self.ai_cleaning = Some(flag);
        }
        if let Some(flag) = env_var("EPILOGUE_STAGING").and_then(|v| flag_from_str(&v)) {
            self.staging = Some(flag);
        }
        if let Some(cost) = env_var("EPILOGUE_MAX_COST_PER_ACTOR").and_then(number_from_str) {
            self.max_cost_per_actor = Some(cost);
        }
        if let Some(cost) = env_var("EPILOGUE_MAX_TOTAL_COST").and_then(number_from_str) {
            self.max_total_cost = Some(cost);
        }
        if let Some(count) = env_var("EPILOGUE_EARLY_STOP_SOURCES").and_then(number_from_str) {
            self.early_stop_source_count = Some(count);
        }
        if let Some(model) = env_var("EPILOGUE_SYNTHESIS_MODEL") {
            self.synthesis_model = Some(model);
        }
        self
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Flag forms accepted from the environment. Unrecognized text reads as
/// unset rather than false, so a typo cannot silently toggle a paid
/// feature either way.
fn flag_from_str(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn number_from_str(raw: String) -> Option<f64> {
    raw.trim().parse().ok()
}

/// Fully-resolved options the orchestrator is constructed with.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentOptions {
    pub source_categories: SourceCategories,
    pub early_stop_source_count: u32,
    pub cost_limits: CostLimits,
    pub confidence_threshold: f64,
    pub synthesis_model: String,
    pub ai_cleaning: bool,
    pub staging: bool,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self {
            source_categories: SourceCategories::default(),
            early_stop_source_count: DEFAULT_EARLY_STOP_SOURCE_COUNT,
            cost_limits: CostLimits::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            synthesis_model: DEFAULT_SYNTHESIS_MODEL.to_string(),
            ai_cleaning: false,
            staging: false,
        }
    }
}

impl EnrichmentOptions {
    pub fn resolve(raw: RawEnrichmentOptions) -> Self {
        let defaults = Self::default();
        Self {
            source_categories: raw.source_categories.unwrap_or_default(),
            early_stop_source_count: raw
                .early_stop_source_count
                .map(normalize_early_stop_count)
                .unwrap_or(DEFAULT_EARLY_STOP_SOURCE_COUNT),
            cost_limits: CostLimits {
                max_cost_per_actor: normalize_cost(
                    raw.max_cost_per_actor,
                    DEFAULT_MAX_COST_PER_ACTOR,
                    "max_cost_per_actor",
                ),
                max_total_cost: normalize_cost(
                    raw.max_total_cost,
                    DEFAULT_MAX_TOTAL_COST,
                    "max_total_cost",
                ),
            },
            confidence_threshold: raw
                .confidence_threshold
                .filter(|v| v.is_finite())
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            synthesis_model: raw
                .synthesis_model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.synthesis_model),
            ai_cleaning: raw.ai_cleaning.unwrap_or(false),
            staging: raw.staging.unwrap_or(false),
        }
    }
}

/// Non-finite, zero, and negative counts fall back to the default;
/// fractional positives floor; positive integers pass through.
pub fn normalize_early_stop_count(raw: f64) -> u32 {
    if !raw.is_finite() || raw < 1.0 {
        warn!(
            raw,
            default = DEFAULT_EARLY_STOP_SOURCE_COUNT,
            "invalid early_stop_source_count, using default"
        );
        return DEFAULT_EARLY_STOP_SOURCE_COUNT;
    }
    raw.floor() as u32
}

fn normalize_cost(raw: Option<f64>, default: f64, field: &str) -> f64 {
    match raw {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        Some(v) => {
            warn!(raw = v, default, field, "invalid cost limit, using default");
            default
        }
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn early_stop_count_validation() {
        assert_eq!(normalize_early_stop_count(f64::NAN), 5);
        assert_eq!(normalize_early_stop_count(f64::INFINITY), 5);
        assert_eq!(normalize_early_stop_count(f64::NEG_INFINITY), 5);
        assert_eq!(normalize_early_stop_count(0.0), 5);
        assert_eq!(normalize_early_stop_count(-3.0), 5);
        assert_eq!(normalize_early_stop_count(2.9), 2);
        assert_eq!(normalize_early_stop_count(3.0), 3);
        assert_eq!(normalize_early_stop_count(7.0), 7);
    }

    #[test]
    fn negative_costs_use_defaults() {
        let resolved = EnrichmentOptions::resolve(RawEnrichmentOptions {
            max_cost_per_actor: Some(-1.0),
            max_total_cost: Some(f64::NAN),
            ..Default::default()
        });
        assert_eq!(
            resolved.cost_limits.max_cost_per_actor,
            DEFAULT_MAX_COST_PER_ACTOR
        );
        assert_eq!(resolved.cost_limits.max_total_cost, DEFAULT_MAX_TOTAL_COST);
    }

    #[test]
    fn confidence_threshold_is_clamped() {
        let resolved = EnrichmentOptions::resolve(RawEnrichmentOptions {
            confidence_threshold: Some(3.5),
            ..Default::default()
        });
        assert_eq!(resolved.confidence_threshold, 1.0);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let raw: RawEnrichmentOptions = serde_json::from_str(
            r#"{"early_stop_source_count": 4, "future_option": {"nested": true}}"#,
        )
        .unwrap();
        let resolved = EnrichmentOptions::resolve(raw);
        assert_eq!(resolved.early_stop_source_count, 4);
    }

    #[test]
    fn env_flag_forms() {
        assert_eq!(flag_from_str("1"), Some(true));
        assert_eq!(flag_from_str(" Yes "), Some(true));
        assert_eq!(flag_from_str("off"), Some(false));
        // Garbage is unset, not false.
        assert_eq!(flag_from_str("enable"), None);
        assert_eq!(flag_from_str(""), None);
    }

    #[test]
    fn env_numbers_tolerate_whitespace() {
        assert_eq!(number_from_str(" 2.5 ".to_string()), Some(2.5));
        assert_eq!(number_from_str("ten".to_string()), None);
    }

    #[test]
    fn blank_model_falls_back() {
        let resolved = EnrichmentOptions::resolve(RawEnrichmentOptions {
            synthesis_model: Some("  ".to_string()),
            ..Default::default()
        });
        assert_eq!(resolved.synthesis_model, DEFAULT_SYNTHESIS_MODEL);
    }
}
