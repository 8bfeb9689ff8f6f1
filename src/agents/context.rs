//! Signal context shared by all agents.
//!
//! Everything an agent might need to grade a prop lives here, keyed so a
//! slate file can deserialize straight into it. Every field is optional
//! in practice: agents look up what they need and abstain when it is
//! missing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{normalize_name, Position, PropCandidate, StatCategory};

/// Team-level offensive/defensive strength. Ranks run 1 (best) to 32.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamProfile {
    pub offense_rank: u8,
    pub defense_rank: u8,
}

/// Share of team opportunities a player receives (0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageProfile {
    #[serde(default)]
    pub snap_share: Option<f64>,
    #[serde(default)]
    pub target_share: Option<f64>,
    #[serde(default)]
    pub carry_share: Option<f64>,
}

/// Practice-report designation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjuryStatus {
    Healthy,
    Questionable,
    Doubtful,
    Out,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub usage: Option<UsageProfile>,
    #[serde(default)]
    pub injury: Option<InjuryStatus>,
    /// Most recent games first.
    #[serde(default)]
    pub recent: HashMap<StatCategory, Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub wind_mph: f64,
    /// 0.0–1.0
    #[serde(default)]
    pub precipitation_chance: f64,
    #[serde(default)]
    pub dome: bool,
}

/// Betting-market view of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEnvironment {
    /// Team favoured by `spread` points.
    #[serde(default)]
    pub favorite: Option<String>,
    #[serde(default)]
    pub spread: Option<f64>,
    /// Over/under on combined points.
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub weather: Option<WeatherReport>,
}

impl GameEnvironment {
    /// Expected margin for `team`: positive when it is favoured.
    pub fn expected_margin(&self, team: &str) -> Option<f64> {
        let favorite = self.favorite.as_deref()?;
        let spread = self.spread?;
        if favorite.eq_ignore_ascii_case(team) {
            Some(spread)
        } else {
            Some(-spread)
        }
    }
}

/// Context bundle for one slate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// Keyed by uppercase team code.
    #[serde(default)]
    pub teams: HashMap<String, TeamProfile>,
    /// Defence team → position → rank allowed (1 = stingiest, 32 = most generous).
    #[serde(default)]
    pub positional_defense: HashMap<String, HashMap<Position, u8>>,
    /// Keyed by normalized player name.
    #[serde(default)]
    pub players: HashMap<String, PlayerProfile>,
    /// Keyed by `PropCandidate::game_key`.
    #[serde(default)]
    pub games: HashMap<String, GameEnvironment>,
    /// Keyed by `player|stat`.
    #[serde(default)]
    pub projections: HashMap<String, Decimal>,
}

impl AnalysisContext {
    pub fn team(&self, code: &str) -> Option<&TeamProfile> {
        self.teams.get(&code.to_uppercase())
    }

    pub fn player(&self, name: &str) -> Option<&PlayerProfile> {
        self.players.get(&normalize_name(name))
    }

    pub fn game(&self, prop: &PropCandidate) -> Option<&GameEnvironment> {
        self.games.get(&prop.game_key())
    }

    pub fn positional_rank(&self, defense: &str, position: Position) -> Option<u8> {
        self.positional_defense
            .get(&defense.to_uppercase())
            .and_then(|m| m.get(&position))
            .copied()
    }

    pub fn projection(&self, prop: &PropCandidate) -> Option<Decimal> {
        self.projections
            .get(&Self::projection_key(&prop.player, prop.stat))
            .copied()
    }

    pub fn projection_key(player: &str, stat: StatCategory) -> String {
        format!("{}|{}", normalize_name(player), stat.label())
    }

    // -- builders (used by tests and slate tooling) -------------------------

    pub fn with_team(mut self, code: &str, profile: TeamProfile) -> Self {
        self.teams.insert(code.to_uppercase(), profile);
        self
    }

    pub fn with_player(mut self, name: &str, profile: PlayerProfile) -> Self {
        self.players.insert(normalize_name(name), profile);
        self
    }

    pub fn with_game(mut self, game_key: &str, env: GameEnvironment) -> Self {
        self.games.insert(game_key.to_string(), env);
        self
    }

    pub fn with_positional_rank(mut self, defense: &str, position: Position, rank: u8) -> Self {
        self.positional_defense
            .entry(defense.to_uppercase())
            .or_default()
            .insert(position, rank);
        self
    }

    pub fn with_projection(mut self, player: &str, stat: StatCategory, value: Decimal) -> Self {
        self.projections.insert(Self::projection_key(player, stat), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use rust_decimal_macros::dec;

    #[test]
    fn test_lookups_are_normalized() {
        let ctx = AnalysisContext::default()
            .with_team("kc", TeamProfile { offense_rank: 3, defense_rank: 10 })
            .with_player("Travis  Kelce", PlayerProfile::default())
            .with_projection("TRAVIS KELCE", StatCategory::Receptions, dec!(6.2));

        assert!(ctx.team("KC").is_some());
        assert!(ctx.player("travis kelce").is_some());

        let prop = PropCandidate {
            player: "Travis Kelce".into(),
            team: "KC".into(),
            opponent: "BUF".into(),
            week: "W1".into(),
            stat: StatCategory::Receptions,
            line: dec!(5.5),
            direction: Direction::Over,
        };
        assert_eq!(ctx.projection(&prop), Some(dec!(6.2)));
    }

    #[test]
    fn test_expected_margin() {
        let env = GameEnvironment {
            favorite: Some("KC".into()),
            spread: Some(3.5),
            total: Some(48.0),
            weather: None,
        };
        assert_eq!(env.expected_margin("kc"), Some(3.5));
        assert_eq!(env.expected_margin("BUF"), Some(-3.5));
    }

    #[test]
    fn test_context_deserializes_from_slate_json() {
        let json = r#"{
            "teams": {"KC": {"offense_rank": 2, "defense_rank": 8}},
            "positional_defense": {"BUF": {"TE": 28}},
            "players": {"travis kelce": {"position": "TE", "injury": "questionable",
                        "recent": {"receptions": [7, 5, 6]}}},
            "projections": {"travis kelce|receptions": 6.1}
        }"#;
        let ctx: AnalysisContext = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.positional_rank("buf", Position::Te), Some(28));
        let p = ctx.player("Travis Kelce").unwrap();
        assert_eq!(p.injury, Some(InjuryStatus::Questionable));
        assert_eq!(p.recent[&StatCategory::Receptions].len(), 3);
    }
}
