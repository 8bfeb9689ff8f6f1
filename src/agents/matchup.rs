//! Positional matchup agent.
//!
//! Grades how generous the opposing defence is against the player's
//! position (rank 32 = allows the most production).

use super::{lean_for, AgentEvaluator, AnalysisContext};
use crate::types::{AgentScore, PropCandidate};

pub const NAME: &str = "position_matchup";
pub const DEFAULT_WEIGHT: f64 = 1.5;

const MAX_SWING: f64 = 25.0;

pub struct PositionMatchupAgent {
    weight: f64,
}

impl PositionMatchupAgent {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for PositionMatchupAgent {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT)
    }
}

impl AgentEvaluator for PositionMatchupAgent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, prop: &PropCandidate, context: &AnalysisContext) -> AgentScore {
        let Some(position) = context.player(&prop.player).and_then(|p| p.position) else {
            return AgentScore::abstain(NAME, self.weight, "player position unknown");
        };
        let Some(rank) = context.positional_rank(&prop.opponent, position) else {
            return AgentScore::abstain(NAME, self.weight, "insufficient matchup data");
        };

        let generosity = (f64::from(rank.clamp(1, 32)) - 16.5) / 15.5;
        let over_score = 50.0 + MAX_SWING * generosity;

        let rationale = match rank {
            25..=32 => format!("{} is bottom-{} against {position}s", prop.opponent, 33 - rank),
            1..=8 => format!("{} is top-{rank} against {position}s", prop.opponent),
            _ => format!("{} ranks #{rank} against {position}s", prop.opponent),
        };

        AgentScore::new(NAME, self.weight, lean_for(prop, over_score), vec![rationale])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::context::PlayerProfile;
    use crate::agents::tests::make_prop;
    use crate::types::{Direction, Position, StatCategory};

    fn make_context(rank: u8) -> AnalysisContext {
        AnalysisContext::default()
            .with_player(
                "Test Player",
                PlayerProfile { position: Some(Position::Wr), ..Default::default() },
            )
            .with_positional_rank("BUF", Position::Wr, rank)
    }

    #[test]
    fn test_generous_defense_leans_over() {
        let agent = PositionMatchupAgent::default();
        let s = agent.evaluate(
            &make_prop(StatCategory::ReceivingYards, Direction::Over),
            &make_context(32),
        );
        assert!((s.score - 75.0).abs() < 1e-9);
        assert!(s.rationale[0].contains("bottom-1"));
    }

    #[test]
    fn test_stingy_defense_favors_under() {
        let agent = PositionMatchupAgent::default();
        let s = agent.evaluate(
            &make_prop(StatCategory::ReceivingYards, Direction::Under),
            &make_context(1),
        );
        assert!((s.score - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_rank_abstains() {
        let agent = PositionMatchupAgent::default();
        let ctx = AnalysisContext::default().with_player(
            "Test Player",
            PlayerProfile { position: Some(Position::Wr), ..Default::default() },
        );
        let s = agent.evaluate(&make_prop(StatCategory::ReceivingYards, Direction::Over), &ctx);
        assert!(!s.is_opinionated());
        assert_eq!(s.abstention.as_deref(), Some("insufficient matchup data"));
    }
}
