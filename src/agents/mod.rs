//! Signal agents.
//!
//! Defines the `AgentEvaluator` trait and the registry the aggregator
//! iterates. Each agent grades a prop from one signal family and must
//! abstain (neutral score, explained) rather than fail when its context
//! is missing.

pub mod context;
pub mod game_flow;
pub mod injury;
pub mod matchup;
pub mod team_strength;
pub mod trend;
pub mod usage;
pub mod variance;
pub mod weather;

use std::collections::HashMap;
use tracing::debug;

use crate::types::{AgentScore, PropCandidate, StatCategory};
pub use context::AnalysisContext;

/// Abstraction over a single signal family.
///
/// Implementors are pure: the same prop and context always produce the
/// same score.
pub trait AgentEvaluator: Send + Sync {
    /// Stable agent identifier (used in exports and config overrides).
    fn name(&self) -> &'static str;

    /// Reliability weight applied by the aggregator.
    fn weight(&self) -> f64;

    /// Grade one prop.
    fn evaluate(&self, prop: &PropCandidate, context: &AnalysisContext) -> AgentScore;
}

/// Turn an OVER-oriented lean into a score for the prop's actual side.
///
/// Interceptions are a defensive win, so "more volume" leans flip for
/// them before the direction is applied.
pub fn lean_for(prop: &PropCandidate, over_score: f64) -> f64 {
    let over_score = if prop.stat == StatCategory::Interceptions {
        100.0 - over_score
    } else {
        over_score
    };
    prop.direction.orient(over_score)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered list of registered agents.
pub struct AgentRegistry {
    agents: Vec<Box<dyn AgentEvaluator>>,
}

impl AgentRegistry {
    /// All built-in signal families at their default weights.
    pub fn standard() -> Self {
        Self::with_overrides(&HashMap::new(), None)
    }

    /// Built-in agents with weight overrides, optionally restricted to an
    /// enabled list (agent names).
    pub fn with_overrides(weights: &HashMap<String, f64>, enabled: Option<&[String]>) -> Self {
        let w = |name: &str, default: f64| weights.get(name).copied().unwrap_or(default);

        let all: Vec<Box<dyn AgentEvaluator>> = vec![
            Box::new(team_strength::TeamStrengthAgent::new(w(
                team_strength::NAME,
                team_strength::DEFAULT_WEIGHT,
            ))),
            Box::new(matchup::PositionMatchupAgent::new(w(
                matchup::NAME,
                matchup::DEFAULT_WEIGHT,
            ))),
            Box::new(usage::UsageVolumeAgent::new(w(usage::NAME, usage::DEFAULT_WEIGHT))),
            Box::new(game_flow::GameFlowAgent::new(w(
                game_flow::NAME,
                game_flow::DEFAULT_WEIGHT,
            ))),
            Box::new(injury::InjuryStatusAgent::new(w(injury::NAME, injury::DEFAULT_WEIGHT))),
            Box::new(trend::RecentTrendAgent::new(w(trend::NAME, trend::DEFAULT_WEIGHT))),
            Box::new(variance::PropVarianceAgent::new(w(
                variance::NAME,
                variance::DEFAULT_WEIGHT,
            ))),
            Box::new(weather::WeatherExposureAgent::new(w(
                weather::NAME,
                weather::DEFAULT_WEIGHT,
            ))),
        ];

        let agents = match enabled {
            Some(list) if !list.is_empty() => all
                .into_iter()
                .filter(|a| list.iter().any(|n| n == a.name()))
                .collect(),
            _ => all,
        };

        Self { agents }
    }

    pub fn register(&mut self, agent: Box<dyn AgentEvaluator>) {
        self.agents.push(agent);
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    /// Run every registered agent against one prop.
    pub fn evaluate_all(&self, prop: &PropCandidate, context: &AnalysisContext) -> Vec<AgentScore> {
        let scores: Vec<AgentScore> = self
            .agents
            .iter()
            .map(|agent| agent.evaluate(prop, context))
            .collect();

        debug!(
            player = %prop.player,
            stat = %prop.stat,
            opinionated = scores.iter().filter(|s| s.is_opinionated()).count(),
            total = scores.len(),
            "Agents evaluated"
        );

        scores
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::Direction;
    use rust_decimal_macros::dec;

    pub(crate) fn make_prop(stat: StatCategory, direction: Direction) -> PropCandidate {
        PropCandidate {
            player: "Test Player".to_string(),
            team: "KC".to_string(),
            opponent: "BUF".to_string(),
            week: "W7".to_string(),
            stat,
            line: dec!(65.5),
            direction,
        }
    }

    #[test]
    fn test_standard_registry_has_all_families() {
        let reg = AgentRegistry::standard();
        assert_eq!(reg.len(), 8);
        let names = reg.names();
        assert!(names.contains(&"team_strength"));
        assert!(names.contains(&"weather_exposure"));
    }

    #[test]
    fn test_enabled_list_filters_agents() {
        let enabled = vec!["injury_status".to_string(), "recent_trend".to_string()];
        let reg = AgentRegistry::with_overrides(&HashMap::new(), Some(&enabled));
        assert_eq!(reg.names(), vec!["injury_status", "recent_trend"]);
    }

    #[test]
    fn test_weight_override_applies() {
        let mut weights = HashMap::new();
        weights.insert("team_strength".to_string(), 0.25);
        let reg = AgentRegistry::with_overrides(&weights, None);
        let prop = make_prop(StatCategory::ReceivingYards, Direction::Over);
        let scores = reg.evaluate_all(&prop, &AnalysisContext::default());
        let ts = scores.iter().find(|s| s.agent == "team_strength").unwrap();
        assert_eq!(ts.weight, 0.25);
    }

    #[test]
    fn test_empty_context_yields_no_opinions_for_yardage() {
        let reg = AgentRegistry::standard();
        let prop = make_prop(StatCategory::ReceivingYards, Direction::Over);
        let scores = reg.evaluate_all(&prop, &AnalysisContext::default());
        assert_eq!(scores.len(), 8);
        assert!(scores.iter().all(|s| !s.is_opinionated()));
        assert!(scores.iter().all(|s| s.abstention.is_some()));
    }

    #[test]
    fn test_lean_for_flips_interceptions() {
        let over = make_prop(StatCategory::Interceptions, Direction::Over);
        // A strong offence (over-lean 70) makes OVER interceptions less likely.
        assert_eq!(lean_for(&over, 70.0), 30.0);
        let under = make_prop(StatCategory::Interceptions, Direction::Under);
        assert_eq!(lean_for(&under, 70.0), 70.0);
    }
}
