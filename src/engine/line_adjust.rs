//! Line-adjustment recalculation.
//!
//! Re-scores an analyzed prop when its line moves. Sensitivity is driven
//! by the change in cushion: `delta = Δcushion × sensitivity / unit_scale`,
//! where `unit_scale` normalizes yardage lines against count lines. The
//! input analysis is never modified; a new `PropAnalysis` carrying
//! `original_line`/`adjusted_line` provenance is returned.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::types::{clamp_confidence, cushion_for, EngineError, PropAnalysis};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LineAdjustmentConfig {
    /// Confidence points per line unit of cushion change.
    pub sensitivity: f64,
    /// Lines above this are treated as input errors.
    pub max_line: Decimal,
    /// |delta| below this reads as no meaningful change.
    pub negligible_delta: f64,
    /// delta at or below this is a significant weakening.
    pub weakened_delta: f64,
}

impl Default for LineAdjustmentConfig {
    fn default() -> Self {
        Self {
            sensitivity: 3.0,
            max_line: dec!(1000),
            negligible_delta: 1.0,
            weakened_delta: -6.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineRecommendation {
    Improved,
    Unchanged,
    ReducedEdge,
    SignificantlyWeakened,
}

impl LineRecommendation {
    pub fn label(&self) -> &'static str {
        match self {
            LineRecommendation::Improved => "improved, line moved in your favor",
            LineRecommendation::Unchanged => "unchanged, negligible impact",
            LineRecommendation::ReducedEdge => "still playable, reduced edge",
            LineRecommendation::SignificantlyWeakened => "significantly weakened",
        }
    }
}

impl fmt::Display for LineRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedResult {
    pub original_confidence: f64,
    pub adjusted_confidence: f64,
    pub delta: f64,
    pub recommendation: LineRecommendation,
    pub old_cushion: Option<Decimal>,
    pub new_cushion: Option<Decimal>,
    /// Re-issued analysis at the new line.
    pub adjusted: PropAnalysis,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct LineAdjustmentEngine {
    config: LineAdjustmentConfig,
}

impl LineAdjustmentEngine {
    pub fn new(config: LineAdjustmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LineAdjustmentConfig {
        &self.config
    }

    /// Re-score `analysis` at `new_line`.
    pub fn adjust(
        &self,
        analysis: &PropAnalysis,
        new_line: Decimal,
    ) -> Result<AdjustedResult, EngineError> {
        self.check_domain(new_line, &new_line.to_string())?;

        let prop = &analysis.candidate;
        let old_line = prop.line;

        // projection − line cancels in the difference, so Δcushion only
        // needs the two lines; the cushions themselves need the projection.
        let cushion_change = prop.direction.sign() * (old_line - new_line);
        let cushion_change = cushion_change.to_f64().ok_or_else(|| EngineError::InvalidLine {
            input: new_line.to_string(),
            reason: "cushion change not representable".to_string(),
        })?;

        let delta = cushion_change * self.config.sensitivity / prop.stat.unit_scale();
        let original_confidence = analysis.confidence;
        let adjusted_confidence = clamp_confidence(original_confidence + delta);
        let recommendation = self.recommend(delta);

        let old_cushion = analysis.cushion;
        let new_cushion = analysis
            .projection
            .map(|p| cushion_for(prop.direction, p, new_line));

        let mut candidate = prop.clone();
        candidate.line = new_line;
        let adjusted = PropAnalysis {
            candidate,
            scores: analysis.scores.clone(),
            confidence: adjusted_confidence,
            low_signal: analysis.low_signal,
            projection: analysis.projection,
            cushion: new_cushion,
            original_line: Some(analysis.original_line.unwrap_or(old_line)),
            adjusted_line: Some(new_line),
        };

        debug!(
            player = %prop.player,
            stat = %prop.stat,
            old_line = %old_line,
            new_line = %new_line,
            delta = format!("{delta:+.2}"),
            adjusted = format!("{adjusted_confidence:.1}"),
            "Line adjusted"
        );

        Ok(AdjustedResult {
            original_confidence,
            adjusted_confidence,
            delta,
            recommendation,
            old_cushion,
            new_cushion,
            adjusted,
        })
    }

    /// Float entry point; NaN and infinities are rejected.
    pub fn adjust_f64(
        &self,
        analysis: &PropAnalysis,
        new_line: f64,
    ) -> Result<AdjustedResult, EngineError> {
        let line = Decimal::from_f64(new_line).ok_or_else(|| EngineError::InvalidLine {
            input: new_line.to_string(),
            reason: "not a finite number".to_string(),
        })?;
        self.adjust(analysis, line)
    }

    /// Text entry point (e.g. a line typed into a review workflow).
    pub fn adjust_str(
        &self,
        analysis: &PropAnalysis,
        input: &str,
    ) -> Result<AdjustedResult, EngineError> {
        let line = Decimal::from_str(input.trim()).map_err(|e| {
            warn!(input, "Rejected non-numeric line input");
            EngineError::InvalidLine {
                input: input.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.adjust(analysis, line)
    }

    fn check_domain(&self, line: Decimal, input: &str) -> Result<(), EngineError> {
        if line.is_sign_negative() && !line.is_zero() {
            return Err(EngineError::InvalidLine {
                input: input.to_string(),
                reason: "line cannot be negative".to_string(),
            });
        }
        if line > self.config.max_line {
            return Err(EngineError::InvalidLine {
                input: input.to_string(),
                reason: format!("line exceeds maximum {}", self.config.max_line),
            });
        }
        Ok(())
    }

    fn recommend(&self, delta: f64) -> LineRecommendation {
        if delta >= self.config.negligible_delta {
            LineRecommendation::Improved
        } else if delta > -self.config.negligible_delta {
            LineRecommendation::Unchanged
        } else if delta > self.config.weakened_delta {
            LineRecommendation::ReducedEdge
        } else {
            LineRecommendation::SignificantlyWeakened
        }
    }
}

impl Default for LineAdjustmentEngine {
    fn default() -> Self {
        Self::new(LineAdjustmentConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
