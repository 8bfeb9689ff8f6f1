//! Risk table keyed by (leg count, combined confidence).

use crate::types::RiskLevel;

/// One row of the lookup: parlays with at most `max_legs` legs and at
/// least `min_confidence` combined confidence land at `level`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskBand {
    pub max_legs: usize,
    pub min_confidence: f64,
    pub level: RiskLevel,
}

/// Rows are checked in order; the first match wins.
const RISK_TABLE: &[RiskBand] = &[
    RiskBand { max_legs: 3, min_confidence: 50.0, level: RiskLevel::Low },
    RiskBand { max_legs: 3, min_confidence: 25.0, level: RiskLevel::Medium },
    RiskBand { max_legs: 5, min_confidence: 40.0, level: RiskLevel::Medium },
];

/// Classify a parlay. Anything the table does not cover is HIGH.
pub fn classify(legs: usize, combined_confidence: f64) -> RiskLevel {
    RISK_TABLE
        .iter()
        .find(|band| legs <= band.max_legs && combined_confidence >= band.min_confidence)
        .map(|band| band.level)
        .unwrap_or(RiskLevel::High)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_confident_parlay_is_low() {
        assert_eq!(classify(2, 62.0), RiskLevel::Low);
        assert_eq!(classify(3, 50.0), RiskLevel::Low);
    }

    #[test]
    fn test_mid_confidence_or_more_legs_is_medium() {
        assert_eq!(classify(3, 46.4), RiskLevel::Medium);
        assert_eq!(classify(5, 41.0), RiskLevel::Medium);
    }

    #[test]
    fn test_everything_else_is_high() {
        assert_eq!(classify(3, 12.0), RiskLevel::High);
        assert_eq!(classify(4, 30.0), RiskLevel::High);
        assert_eq!(classify(6, 90.0), RiskLevel::High);
    }
}
