//! Game-flow agent.
//!
//! Reads the spread and total. High totals lift all volume; favourites
//! lean on the run late, underdogs throw to catch up.

use super::{lean_for, AgentEvaluator, AnalysisContext};
use crate::types::{AgentScore, PropCandidate, StatFamily};

pub const NAME: &str = "game_flow";
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// League-average game total.
const AVERAGE_TOTAL: f64 = 44.0;
const TOTAL_POINTS_PER_POINT: f64 = 0.8;
const RUSH_SCRIPT_PER_POINT: f64 = 0.8;
const PASS_SCRIPT_PER_POINT: f64 = 0.5;
const MAX_SWING: f64 = 20.0;

pub struct GameFlowAgent {
    weight: f64,
}

impl GameFlowAgent {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for GameFlowAgent {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT)
    }
}

impl AgentEvaluator for GameFlowAgent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, prop: &PropCandidate, context: &AnalysisContext) -> AgentScore {
        let Some(game) = context.game(prop) else {
            return AgentScore::abstain(NAME, self.weight, "no game line available");
        };

        let margin = game.expected_margin(&prop.team);
        if game.total.is_none() && margin.is_none() {
            return AgentScore::abstain(NAME, self.weight, "no spread or total posted");
        }

        let mut swing = 0.0;
        let mut rationale = Vec::new();

        if let Some(total) = game.total {
            swing += (total - AVERAGE_TOTAL) * TOTAL_POINTS_PER_POINT;
            rationale.push(format!("game total {total:.1}"));
        }

        if let Some(margin) = margin {
            let script = match prop.stat.family() {
                StatFamily::Rushing => margin * RUSH_SCRIPT_PER_POINT,
                StatFamily::Passing | StatFamily::Receiving => -margin * PASS_SCRIPT_PER_POINT,
                StatFamily::Scoring => 0.0,
            };
            swing += script;
            if margin > 0.0 {
                rationale.push(format!("{} favoured by {margin:.1}", prop.team));
            } else if margin < 0.0 {
                rationale.push(format!("{} underdog by {:.1}", prop.team, -margin));
            } else {
                rationale.push("pick'em".to_string());
            }
        }

        let over_score = 50.0 + swing.clamp(-MAX_SWING, MAX_SWING);
        AgentScore::new(NAME, self.weight, lean_for(prop, over_score), rationale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::context::GameEnvironment;
    use crate::agents::tests::make_prop;
    use crate::types::{Direction, StatCategory};

    fn make_context(favorite: &str, spread: f64, total: f64) -> AnalysisContext {
        let prop = make_prop(StatCategory::RushingYards, Direction::Over);
        AnalysisContext::default().with_game(
            &prop.game_key(),
            GameEnvironment {
                favorite: Some(favorite.to_string()),
                spread: Some(spread),
                total: Some(total),
                weather: None,
            },
        )
    }

    #[test]
    fn test_favorite_rushing_leans_over() {
        let ctx = make_context("KC", 7.0, 44.0);
        let s = GameFlowAgent::default()
            .evaluate(&make_prop(StatCategory::RushingYards, Direction::Over), &ctx);
        assert!((s.score - 55.6).abs() < 1e-9);
    }

    #[test]
    fn test_underdog_passing_leans_over() {
        let ctx = make_context("BUF", 10.0, 44.0);
        let s = GameFlowAgent::default()
            .evaluate(&make_prop(StatCategory::PassingYards, Direction::Over), &ctx);
        assert!((s.score - 55.0).abs() < 1e-9);
        assert!(s.rationale.iter().any(|r| r.contains("underdog")));
    }

    #[test]
    fn test_high_total_lifts_over() {
        let ctx = make_context("KC", 0.0, 54.0);
        let s = GameFlowAgent::default()
            .evaluate(&make_prop(StatCategory::AnytimeTouchdown, Direction::Over), &ctx);
        assert!((s.score - 58.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_game_abstains() {
        let s = GameFlowAgent::default().evaluate(
            &make_prop(StatCategory::PassingYards, Direction::Over),
            &AnalysisContext::default(),
        );
        assert!(!s.is_opinionated());
    }
}
