//! Weather-exposure agent.
//!
//! Wind and rain suppress the passing game and push volume to the ground.
//! Indoor games and calm forecasts abstain.

use super::{lean_for, AgentEvaluator, AnalysisContext};
use crate::types::{AgentScore, PropCandidate, StatFamily};

pub const NAME: &str = "weather_exposure";
pub const DEFAULT_WEIGHT: f64 = 0.8;

/// Wind below this has no measurable effect.
const WIND_THRESHOLD_MPH: f64 = 12.0;
const PASS_POINTS_PER_MPH: f64 = 1.5;
const RUSH_POINTS_PER_MPH: f64 = 0.5;
const RAIN_THRESHOLD: f64 = 0.6;
const RAIN_PASS_PENALTY: f64 = 5.0;
const RAIN_RUSH_BONUS: f64 = 2.0;
const MAX_SWING: f64 = 25.0;

pub struct WeatherExposureAgent {
    weight: f64,
}

impl WeatherExposureAgent {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for WeatherExposureAgent {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT)
    }
}

impl AgentEvaluator for WeatherExposureAgent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, prop: &PropCandidate, context: &AnalysisContext) -> AgentScore {
        let Some(weather) = context.game(prop).and_then(|g| g.weather) else {
            return AgentScore::abstain(NAME, self.weight, "no weather forecast");
        };
        if weather.dome {
            return AgentScore::abstain(NAME, self.weight, "indoor game");
        }

        let excess_wind = (weather.wind_mph - WIND_THRESHOLD_MPH).max(0.0);
        let rainy = weather.precipitation_chance >= RAIN_THRESHOLD;
        if excess_wind == 0.0 && !rainy {
            return AgentScore::abstain(NAME, self.weight, "no weather impact");
        }

        let swing = match prop.stat.family() {
            StatFamily::Passing | StatFamily::Receiving => {
                -(excess_wind * PASS_POINTS_PER_MPH) - if rainy { RAIN_PASS_PENALTY } else { 0.0 }
            }
            StatFamily::Rushing => {
                excess_wind * RUSH_POINTS_PER_MPH + if rainy { RAIN_RUSH_BONUS } else { 0.0 }
            }
            StatFamily::Scoring => -(excess_wind * RUSH_POINTS_PER_MPH),
        };

        let mut rationale = Vec::new();
        if excess_wind > 0.0 {
            rationale.push(format!("wind {:.0} mph", weather.wind_mph));
        }
        if rainy {
            rationale.push(format!(
                "{:.0}% chance of precipitation",
                weather.precipitation_chance * 100.0
            ));
        }

        let over_score = 50.0 + swing.clamp(-MAX_SWING, MAX_SWING);
        AgentScore::new(NAME, self.weight, lean_for(prop, over_score), rationale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::context::{GameEnvironment, WeatherReport};
    use crate::agents::tests::make_prop;
    use crate::types::{Direction, StatCategory};

    fn make_context(wind_mph: f64, precipitation_chance: f64, dome: bool) -> AnalysisContext {
        let key = make_prop(StatCategory::PassingYards, Direction::Over).game_key();
        AnalysisContext::default().with_game(
            &key,
            GameEnvironment {
                favorite: None,
                spread: None,
                total: None,
                weather: Some(WeatherReport { wind_mph, precipitation_chance, dome }),
            },
        )
    }

    #[test]
    fn test_wind_suppresses_passing_over() {
        let s = WeatherExposureAgent::default().evaluate(
            &make_prop(StatCategory::PassingYards, Direction::Over),
            &make_context(22.0, 0.0, false),
        );
        assert!((s.score - 35.0).abs() < 1e-9);
        assert!(s.rationale[0].contains("22 mph"));
    }

    #[test]
    fn test_rain_lifts_rushing() {
        let s = WeatherExposureAgent::default().evaluate(
            &make_prop(StatCategory::RushingYards, Direction::Over),
            &make_context(0.0, 0.8, false),
        );
        assert!((s.score - 52.0).abs() < 1e-9);
    }

    #[test]
    fn test_dome_and_calm_abstain() {
        let agent = WeatherExposureAgent::default();
        let prop = make_prop(StatCategory::PassingYards, Direction::Over);
        assert!(!agent.evaluate(&prop, &make_context(30.0, 1.0, true)).is_opinionated());
        assert!(!agent.evaluate(&prop, &make_context(5.0, 0.1, false)).is_opinionated());
    }
}
