//! Injury-status agent.
//!
//! The heaviest-weighted signal: a designation on the practice report
//! caps the upside of every OVER on that player.

use super::{AgentEvaluator, AnalysisContext};
use crate::agents::context::InjuryStatus;
use crate::types::{AgentScore, PropCandidate};

pub const NAME: &str = "injury_status";
pub const DEFAULT_WEIGHT: f64 = 2.0;

pub struct InjuryStatusAgent {
    weight: f64,
}

impl InjuryStatusAgent {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }

    /// OVER-side score for a designation; `None` means no lean.
    fn over_score(status: InjuryStatus) -> Option<f64> {
        match status {
            InjuryStatus::Healthy => None,
            InjuryStatus::Questionable => Some(38.0),
            InjuryStatus::Doubtful => Some(20.0),
            InjuryStatus::Out => Some(5.0),
        }
    }
}

impl Default for InjuryStatusAgent {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT)
    }
}

impl AgentEvaluator for InjuryStatusAgent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, prop: &PropCandidate, context: &AnalysisContext) -> AgentScore {
        let Some(status) = context.player(&prop.player).and_then(|p| p.injury) else {
            return AgentScore::abstain(NAME, self.weight, "no injury report");
        };

        let Some(over) = Self::over_score(status) else {
            return AgentScore::abstain(NAME, self.weight, "no injury designation");
        };

        // Injury limits volume regardless of stat, so no interception flip.
        let score = prop.direction.orient(over);
        let rationale = format!("{} listed {:?}", prop.player, status).to_lowercase();
        AgentScore::new(NAME, self.weight, score, vec![rationale])
    }
}
