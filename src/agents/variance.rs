//! Prop-type variance agent.
//!
//! Touchdown and interception props hinge on a single play; books price
//! the OVER side of them rich. Stable counting and yardage stats carry
//! no lean from this agent.

use super::{AgentEvaluator, AnalysisContext};
use crate::types::{AgentScore, Direction, PropCandidate};

pub const NAME: &str = "prop_variance";
pub const DEFAULT_WEIGHT: f64 = 0.5;

const HIGH_VARIANCE_OVER: f64 = 42.0;

pub struct PropVarianceAgent {
    weight: f64,
}

impl PropVarianceAgent {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for PropVarianceAgent {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT)
    }
}

impl AgentEvaluator for PropVarianceAgent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, prop: &PropCandidate, _context: &AnalysisContext) -> AgentScore {
        if !prop.stat.is_high_variance() {
            return AgentScore::abstain(NAME, self.weight, "stable stat category");
        }

        let score = prop.direction.orient(HIGH_VARIANCE_OVER);
        let rationale = match prop.direction {
            Direction::Over => format!("{} overs are high variance", prop.stat),
            Direction::Under => format!("{} unders benefit from variance", prop.stat),
        };
        AgentScore::new(NAME, self.weight, score, vec![rationale])
    }
}
