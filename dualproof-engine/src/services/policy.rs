//! Attribution payability policy
//!
//! Deterministic threshold rule over a ranked match list. Evaluated once
//! per result at creation time; its verdict gates whether a royalty event
//! may later be derived for that result.

use dualproof_common::db::models::AttributionMatch;
use dualproof_common::EngineConfig;

/// Policy verdict with the numbers that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyDecision {
    pub payable: bool,
    pub max_similarity: f32,
    pub total_influence: f32,
}

/// Threshold-based payability evaluator
///
/// Payable iff `max(similarity) >= max_threshold` and
/// `sum(influence_share) >= total_threshold`. Both comparisons are
/// inclusive. An empty match list is never payable.
#[derive(Debug, Clone)]
pub struct AttributionPolicy {
    max_threshold: f32,
    total_threshold: f32,
}

impl AttributionPolicy {
    /// Build from engine configuration (defaults 0.80 / 0.20)
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_threshold: config.s_max_threshold,
            total_threshold: config.s_total_threshold,
        }
    }

    /// Build with explicit thresholds (tests exercise each independently)
    pub fn with_thresholds(max_threshold: f32, total_threshold: f32) -> Self {
        Self {
            max_threshold,
            total_threshold,
        }
    }

    /// Evaluate a ranked match list
    pub fn evaluate(&self, matches: &[AttributionMatch]) -> PolicyDecision {
        let max_similarity = matches
            .iter()
            .map(|m| m.similarity)
            .fold(0.0f32, f32::max);
        let total_influence: f32 = matches.iter().map(|m| m.influence_share).sum();

        PolicyDecision {
            payable: !matches.is_empty()
                && max_similarity >= self.max_threshold
                && total_influence >= self.total_threshold,
            max_similarity,
            total_influence,
        }
    }

    /// Convenience wrapper over [`evaluate`](Self::evaluate)
    pub fn is_payable(&self, matches: &[AttributionMatch]) -> bool {
        self.evaluate(matches).payable
    }
}
