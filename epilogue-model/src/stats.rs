//! Batch-level run statistics and telemetry rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::source::SourceType;

/// Why a batch run ended. Partial completion is a first-class outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Completed,
    CostLimit,
    Interrupted,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Completed => "completed",
            ExitReason::CostLimit => "cost_limit",
            ExitReason::Interrupted => "interrupted",
        }
    }
}

/// Process-wide statistics for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub actors_processed: u32,
    pub actors_enriched: u32,
    pub total_cost_usd: f64,
    pub cost_by_source: BTreeMap<SourceType, f64>,
    pub exit_reason: ExitReason,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            actors_processed: 0,
            actors_enriched: 0,
            total_cost_usd: 0.0,
            cost_by_source: BTreeMap::new(),
            exit_reason: ExitReason::Completed,
        }
    }

    pub fn add_source_cost(&mut self, source: SourceType, cost_usd: f64) {
        if cost_usd > 0.0 {
            *self.cost_by_source.entry(source).or_insert(0.0) += cost_usd;
        }
        self.total_cost_usd += cost_usd;
    }

    /// Fraction of processed actors that came out enriched.
    pub fn fill_rate(&self) -> f64 {
        if self.actors_processed == 0 {
            return 0.0;
        }
        f64::from(self.actors_enriched) / f64::from(self.actors_processed)
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A notable factor the synthesizer emitted outside the closed vocabulary.
/// Telemetry, not validation: persisted freeform for vocabulary evolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedFactor {
    pub factor: String,
    /// Where it came from: "death" or "biography" synthesis.
    pub kind: String,
    pub actor_id: i64,
    pub actor_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_rate_handles_empty_runs() {
        let stats = RunStats::new();
        assert_eq!(stats.fill_rate(), 0.0);
    }

    #[test]
    fn source_costs_accumulate() {
        let mut stats = RunStats::new();
        stats.add_source_cost(SourceType::GoogleCse, 0.005);
        stats.add_source_cost(SourceType::GoogleCse, 0.005);
        stats.add_source_cost(SourceType::Wikidata, 0.0);
        assert_eq!(stats.cost_by_source.get(&SourceType::GoogleCse), Some(&0.01));
        // Free lookups never materialize a ledger row.
        assert!(!stats.cost_by_source.contains_key(&SourceType::Wikidata));
        assert!((stats.total_cost_usd - 0.01).abs() < f64::EPSILON);
    }
}
