//! Correlation analysis between parlay legs.
//!
//! The heuristic path is synchronous and self-sufficient: fixed pair
//! rules produce a small signed adjustment, and tightly coupled
//! same-player pairs are reported as violations instead of being
//! adjusted away. An optional `CorrelationOracle` can refine the
//! adjustment and add rationale; it is always time-bounded and any
//! failure keeps the heuristic result.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::llm::CorrelationOracle;
use crate::types::{Direction, PropAnalysis, StatCategory, StatFamily, Violation};

/// Rule id carried by harmful-correlation violations.
pub const COUPLED_STATS_RULE_ID: &str = "correlation:coupled-stats";

/// Same-player stat pairs that move together almost mechanically.
const COUPLED_STATS: &[(StatCategory, StatCategory)] = &[
    (StatCategory::PassingYards, StatCategory::PassCompletions),
    (StatCategory::PassingYards, StatCategory::PassAttempts),
    (StatCategory::PassCompletions, StatCategory::PassAttempts),
    (StatCategory::PassCompletions, StatCategory::Receptions),
    (StatCategory::Receptions, StatCategory::ReceivingYards),
    (StatCategory::RushingYards, StatCategory::RushAttempts),
];

#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// QB passing + same-team receiver, same side.
    pub stack_bonus: f64,
    /// Both sides of one game going OVER on yardage.
    pub shootout_bonus: f64,
    /// Same-team rushing and passing volume both OVER.
    pub script_penalty: f64,
    /// Cap on |adjustment|.
    pub max_adjustment: f64,
    pub oracle_timeout: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            stack_bonus: 3.0,
            shootout_bonus: 1.5,
            script_penalty: 1.5,
            max_adjustment: 10.0,
            oracle_timeout: Duration::from_millis(5_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationSource {
    Heuristic,
    Oracle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationReport {
    /// Signed, additive correction to the independent-leg confidence.
    pub adjustment: f64,
    /// Harmful pairs. Never adjusted away.
    pub flags: Vec<Violation>,
    pub notes: Vec<String>,
    pub source: CorrelationSource,
}

pub struct CorrelationAnalyzer {
    config: CorrelationConfig,
    oracle: Option<Arc<dyn CorrelationOracle>>,
}

impl CorrelationAnalyzer {
    pub fn new(config: CorrelationConfig) -> Self {
        Self { config, oracle: None }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn CorrelationOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Heuristic analysis over every leg pair.
    pub fn analyze(&self, legs: &[PropAnalysis]) -> CorrelationReport {
        let mut adjustment = 0.0;
        let mut flags = Vec::new();
        let mut notes = Vec::new();

        for i in 0..legs.len() {
            for j in (i + 1)..legs.len() {
                if let Some(reason) = Self::harmful_pair(&legs[i], &legs[j]) {
                    flags.push(Violation {
                        rule_id: COUPLED_STATS_RULE_ID.to_string(),
                        reason,
                        leg_indices: vec![i, j],
                    });
                    continue;
                }
                if let Some((delta, note)) = self.pair_effect(&legs[i], &legs[j]) {
                    adjustment += delta;
                    notes.push(note);
                }
            }
        }

        let cap = self.config.max_adjustment;
        CorrelationReport {
            adjustment: adjustment.clamp(-cap, cap),
            flags,
            notes,
            source: CorrelationSource::Heuristic,
        }
    }

    /// Heuristic analysis, refined by the oracle when one is configured
    /// and answers in time.
    pub async fn analyze_with_oracle(&self, legs: &[PropAnalysis]) -> CorrelationReport {
        let mut report = self.analyze(legs);
        let Some(oracle) = &self.oracle else {
            return report;
        };

        match tokio::time::timeout(self.config.oracle_timeout, oracle.assess(legs)).await {
            Ok(Ok(assessment)) => {
                if let Some(refined) = assessment.adjustment.filter(|v| v.is_finite()) {
                    let cap = self.config.max_adjustment;
                    report.adjustment = refined.clamp(-cap, cap);
                }
                report.notes.extend(assessment.rationale);
                report.source = CorrelationSource::Oracle;
                debug!(
                    legs = legs.len(),
                    adjustment = report.adjustment,
                    "Oracle refined correlation"
                );
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Correlation oracle failed, keeping heuristic result");
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.oracle_timeout.as_millis() as u64,
                    "Correlation oracle timed out, keeping heuristic result"
                );
            }
        }
        report
    }

    /// Same player, coupled stats, same direction.
    pub fn harmful_pair(a: &PropAnalysis, b: &PropAnalysis) -> Option<String> {
        let (ca, cb) = (&a.candidate, &b.candidate);
        if ca.player_key() != cb.player_key() || ca.direction != cb.direction {
            return None;
        }
        let coupled = COUPLED_STATS
            .iter()
            .any(|&(x, y)| (ca.stat == x && cb.stat == y) || (ca.stat == y && cb.stat == x));
        coupled.then(|| {
            format!(
                "{} {} {} and {} move together",
                ca.player, ca.direction, ca.stat, cb.stat
            )
        })
    }

    fn pair_effect(&self, a: &PropAnalysis, b: &PropAnalysis) -> Option<(f64, String)> {
        let (ca, cb) = (&a.candidate, &b.candidate);
        if ca.player_key() == cb.player_key() {
            return None;
        }
        let same_team = ca.team.eq_ignore_ascii_case(&cb.team);
        let same_game = ca.game_key() == cb.game_key();

        let is_passer = |s: StatCategory| {
            matches!(
                s,
                StatCategory::PassingYards
                    | StatCategory::PassCompletions
                    | StatCategory::PassingTouchdowns
            )
        };
        let is_rusher = |s: StatCategory| s.family() == StatFamily::Rushing;
        let is_receiver = |s: StatCategory| s.family() == StatFamily::Receiving;

        if same_team && ca.direction == cb.direction {
            let stacked = (is_passer(ca.stat) && is_receiver(cb.stat))
                || (is_receiver(ca.stat) && is_passer(cb.stat));
            if stacked {
                return Some((
                    self.config.stack_bonus,
                    format!("passing stack: {} + {} ({})", ca.player, cb.player, ca.direction),
                ));
            }
            let competing = ca.direction == Direction::Over
                && ((is_rusher(ca.stat) && is_passer(cb.stat))
                    || (is_passer(ca.stat) && is_rusher(cb.stat)));
            if competing {
                return Some((
                    -self.config.script_penalty,
                    format!("competing game scripts: {} + {}", ca.player, cb.player),
                ));
            }
        }

        let yardage = |s: StatCategory| s.unit_scale() > 1.0;
        if same_game
            && !same_team
            && ca.direction == Direction::Over
            && cb.direction == Direction::Over
            && yardage(ca.stat)
            && yardage(cb.stat)
        {
            return Some((
                self.config.shootout_bonus,
                format!("shootout script: {} + {}", ca.player, cb.player),
            ));
        }

        None
    }
}

impl Default for CorrelationAnalyzer {
    fn default() -> Self {
        Self::new(CorrelationConfig::default())
    }
}
