//! Usage-volume agent.
//!
//! Opportunity drives counting stats: target share for receiving props,
//! carry share for rushing props, snap share for everything else.

use super::{lean_for, AgentEvaluator, AnalysisContext};
use crate::types::{AgentScore, PropCandidate, StatFamily};

pub const NAME: &str = "usage_volume";
pub const DEFAULT_WEIGHT: f64 = 1.2;

/// (share considered average, score points per unit of share above it)
const TARGET_BASELINE: (f64, f64) = (0.18, 150.0);
const CARRY_BASELINE: (f64, f64) = (0.45, 60.0);
const SNAP_BASELINE: (f64, f64) = (0.70, 60.0);

/// Usage leans never exceed ±25 points.
const MAX_SWING: f64 = 25.0;

pub struct UsageVolumeAgent {
    weight: f64,
}

impl UsageVolumeAgent {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for UsageVolumeAgent {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT)
    }
}

impl AgentEvaluator for UsageVolumeAgent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, prop: &PropCandidate, context: &AnalysisContext) -> AgentScore {
        let Some(usage) = context.player(&prop.player).and_then(|p| p.usage) else {
            return AgentScore::abstain(NAME, self.weight, "no usage data");
        };

        let (label, share, (baseline, slope)) = match prop.stat.family() {
            StatFamily::Receiving => ("target share", usage.target_share, TARGET_BASELINE),
            StatFamily::Rushing => ("carry share", usage.carry_share, CARRY_BASELINE),
            StatFamily::Passing | StatFamily::Scoring => {
                ("snap share", usage.snap_share, SNAP_BASELINE)
            }
        };

        let Some(share) = share else {
            return AgentScore::abstain(NAME, self.weight, format!("no {label} recorded"));
        };

        let swing = ((share - baseline) * slope).clamp(-MAX_SWING, MAX_SWING);
        let rationale = format!(
            "{label} {:.0}% (baseline {:.0}%)",
            share * 100.0,
            baseline * 100.0
        );

        AgentScore::new(NAME, self.weight, lean_for(prop, 50.0 + swing), vec![rationale])
    }
}
