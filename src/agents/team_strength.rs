//! Team-strength agent.
//!
//! Compares the prop team's offensive rank with the opponent's
//! defensive rank. A strong offence facing a weak defence leans OVER.

use super::{lean_for, AgentEvaluator, AnalysisContext};
use crate::types::{AgentScore, PropCandidate};

pub const NAME: &str = "team_strength";
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Score swing at a maximal rank mismatch.
const MAX_SWING: f64 = 20.0;

/// Below this combined advantage the matchup reads as even.
const EVEN_BAND: f64 = 0.1;

pub struct TeamStrengthAgent {
    weight: f64,
}

impl TeamStrengthAgent {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }

    /// Map a 1..=32 rank onto [-1, 1], where 1 is best.
    fn rank_to_unit(rank: u8) -> f64 {
        let r = f64::from(rank.clamp(1, 32));
        (16.5 - r) / 15.5
    }
}

impl Default for TeamStrengthAgent {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT)
    }
}

impl AgentEvaluator for TeamStrengthAgent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, prop: &PropCandidate, context: &AnalysisContext) -> AgentScore {
        let (Some(own), Some(opp)) = (context.team(&prop.team), context.team(&prop.opponent)) else {
            return AgentScore::abstain(NAME, self.weight, "insufficient team strength data");
        };

        // Good offence is positive; a weak opposing defence is positive.
        let offense = Self::rank_to_unit(own.offense_rank);
        let defense_weakness = -Self::rank_to_unit(opp.defense_rank);
        let advantage = (offense + defense_weakness) / 2.0;

        let rationale = if advantage.abs() < EVEN_BAND {
            format!(
                "{} offense #{} vs {} defense #{}: evenly matched",
                prop.team, own.offense_rank, prop.opponent, opp.defense_rank
            )
        } else if advantage > 0.0 {
            format!(
                "{} offense #{} has the edge over {} defense #{}",
                prop.team, own.offense_rank, prop.opponent, opp.defense_rank
            )
        } else {
            format!(
                "{} defense #{} outclasses {} offense #{}",
                prop.opponent, opp.defense_rank, prop.team, own.offense_rank
            )
        };

        let over_score = 50.0 + MAX_SWING * advantage;
        AgentScore::new(NAME, self.weight, lean_for(prop, over_score), vec![rationale])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::context::TeamProfile;
    use crate::agents::tests::make_prop;
    use crate::types::{Direction, StatCategory};

    fn make_context(off: u8, def: u8) -> AnalysisContext {
        AnalysisContext::default()
            .with_team("KC", TeamProfile { offense_rank: off, defense_rank: 16 })
            .with_team("BUF", TeamProfile { offense_rank: 16, defense_rank: def })
    }

    #[test]
    fn test_missing_team_abstains() {
        let agent = TeamStrengthAgent::default();
        let score = agent.evaluate(
            &make_prop(StatCategory::PassingYards, Direction::Over),
            &AnalysisContext::default(),
        );
        assert_eq!(score.score, 50.0);
        assert!(!score.is_opinionated());
        assert!(score.abstention.unwrap().contains("insufficient"));
    }

    #[test]
    fn test_strong_offense_weak_defense_leans_over() {
        let agent = TeamStrengthAgent::default();
        let ctx = make_context(1, 32);
        let over = agent.evaluate(&make_prop(StatCategory::PassingYards, Direction::Over), &ctx);
        let under = agent.evaluate(&make_prop(StatCategory::PassingYards, Direction::Under), &ctx);
        assert!((over.score - 70.0).abs() < 1e-9);
        assert!((under.score - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_even_matchup_is_opinionated_at_neutral() {
        let agent = TeamStrengthAgent::default();
        let score = agent.evaluate(
            &make_prop(StatCategory::RushingYards, Direction::Over),
            &make_context(10, 10),
        );
        assert!((score.score - 50.0).abs() < 1.0);
        assert!(score.rationale[0].contains("evenly matched"));
    }
}
