//! Recent-trend agent.
//!
//! Hit rate of the player's recent games against today's line, nudged by
//! how far the recent average sits from the line.

use rust_decimal::prelude::ToPrimitive;

use super::{AgentEvaluator, AnalysisContext};
use crate::types::{AgentScore, PropCandidate};

pub const NAME: &str = "recent_trend";
pub const DEFAULT_WEIGHT: f64 = 1.3;

/// Fewer games than this is noise.
const MIN_GAMES: usize = 3;
/// Only the most recent games count.
const WINDOW: usize = 8;
const HIT_RATE_SLOPE: f64 = 60.0;
const MARGIN_POINTS_PER_UNIT: f64 = 3.0;
const MAX_MARGIN_POINTS: f64 = 10.0;

pub struct RecentTrendAgent {
    weight: f64,
}

impl RecentTrendAgent {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for RecentTrendAgent {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT)
    }
}

impl AgentEvaluator for RecentTrendAgent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, prop: &PropCandidate, context: &AnalysisContext) -> AgentScore {
        let games: Vec<f64> = context
            .player(&prop.player)
            .and_then(|p| p.recent.get(&prop.stat))
            .map(|g| g.iter().take(WINDOW).copied().collect())
            .unwrap_or_default();

        if games.len() < MIN_GAMES {
            return AgentScore::abstain(
                NAME,
                self.weight,
                format!("only {} recent games logged", games.len()),
            );
        }

        let Some(line) = prop.line.to_f64() else {
            return AgentScore::abstain(NAME, self.weight, "line not representable");
        };

        let n = games.len() as f64;
        let overs = games.iter().filter(|&&v| v > line).count() as f64;
        let average = games.iter().sum::<f64>() / n;

        let hit_rate = overs / n;
        let margin_points = ((average - line) / prop.stat.unit_scale() * MARGIN_POINTS_PER_UNIT)
            .clamp(-MAX_MARGIN_POINTS, MAX_MARGIN_POINTS);
        let over_score = 50.0 + (hit_rate - 0.5) * HIT_RATE_SLOPE + margin_points;

        let rationale = format!(
            "cleared {line} in {}/{} recent games (avg {average:.1})",
            overs as usize,
            games.len()
        );

        AgentScore::new(NAME, self.weight, prop.direction.orient(over_score), vec![rationale])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::context::PlayerProfile;
    use crate::agents::tests::make_prop;
    use crate::types::{Direction, StatCategory};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn make_context(stat: StatCategory, games: Vec<f64>) -> AnalysisContext {
        let mut recent = HashMap::new();
        recent.insert(stat, games);
        AnalysisContext::default()
            .with_player("Test Player", PlayerProfile { recent, ..Default::default() })
    }

    #[test]
    fn test_consistent_overs_lean_over() {
        let mut prop = make_prop(StatCategory::Receptions, Direction::Over);
        prop.line = dec!(4.5);
        let ctx = make_context(StatCategory::Receptions, vec![6.0, 7.0, 5.0, 6.0]);
        let s = RecentTrendAgent::default().evaluate(&prop, &ctx);
        // hit rate 1.0 → +30, avg 6.0 vs 4.5 → +4.5
        assert!((s.score - 84.5).abs() < 1e-9);
        assert!(s.rationale[0].contains("4/4"));
    }

    #[test]
    fn test_under_mirrors_over() {
        let mut prop = make_prop(StatCategory::Receptions, Direction::Under);
        prop.line = dec!(4.5);
        let ctx = make_context(StatCategory::Receptions, vec![6.0, 7.0, 5.0, 6.0]);
        let s = RecentTrendAgent::default().evaluate(&prop, &ctx);
        assert!((s.score - 15.5).abs() < 1e-9);
    }

    #[test]
    fn test_too_few_games_abstains() {
        let prop = make_prop(StatCategory::Receptions, Direction::Over);
        let ctx = make_context(StatCategory::Receptions, vec![6.0, 7.0]);
        let s = RecentTrendAgent::default().evaluate(&prop, &ctx);
        assert!(!s.is_opinionated());
        assert!(s.abstention.unwrap().contains("2 recent games"));
    }
}
