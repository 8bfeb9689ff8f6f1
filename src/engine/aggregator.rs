//! Confidence aggregation.
//!
//! Combines one prop's agent scores into a single confidence. Only
//! opinionated agents enter the weighted mean; abstaining agents are
//! left out of both numerator and denominator.

use rust_decimal::Decimal;
use tracing::debug;

use crate::types::{
    clamp_confidence, cushion_for, AgentScore, PropAnalysis, PropCandidate, NEUTRAL_SCORE,
};

#[derive(Debug, Clone, Default)]
pub struct ConfidenceAggregator;

impl ConfidenceAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate scores into a `PropAnalysis`. Always returns a value;
    /// thresholding happens downstream.
    pub fn aggregate(
        &self,
        prop: &PropCandidate,
        scores: Vec<AgentScore>,
        projection: Option<Decimal>,
    ) -> PropAnalysis {
        let (confidence, low_signal) = Self::weighted_confidence(&scores);
        let cushion = projection.map(|p| cushion_for(prop.direction, p, prop.line));

        debug!(
            player = %prop.player,
            stat = %prop.stat,
            direction = %prop.direction,
            confidence = format!("{confidence:.1}"),
            low_signal,
            "Prop aggregated"
        );

        PropAnalysis {
            candidate: prop.clone(),
            scores,
            confidence,
            low_signal,
            projection,
            cushion,
            original_line: None,
            adjusted_line: None,
        }
    }

    /// Weighted mean over opinionated agents. Returns `(confidence, low_signal)`.
    pub fn weighted_confidence(scores: &[AgentScore]) -> (f64, bool) {
        let opinionated: Vec<&AgentScore> = scores
            .iter()
            .filter(|s| s.is_opinionated() && s.weight > 0.0 && s.weight.is_finite())
            .collect();

        match opinionated.as_slice() {
            [] => (NEUTRAL_SCORE, true),
            // A lone opinion is returned verbatim.
            [only] => (clamp_confidence(only.score), false),
            many => {
                let weight_sum: f64 = many.iter().map(|s| s.weight).sum();
                let weighted: f64 = many.iter().map(|s| s.score * s.weight).sum();
                (clamp_confidence(weighted / weight_sum), false)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
