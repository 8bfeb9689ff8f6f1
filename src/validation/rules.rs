//! Declarative validation rules.
//!
//! A rule record stores its predicate as JSON text so rules can live in
//! a table and be toggled at runtime. Predicates describe a pair of legs;
//! a rule fires for every leg pair in a parlay that matches it, in either
//! leg order.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{Direction, EngineError, PropAnalysis, StatCategory};

/// Stored form of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: String,
    pub description: String,
    /// JSON-encoded `RulePredicate`.
    pub predicate: String,
    #[serde(default = "default_true")]
    pub active: bool,
    /// When set, a firing marks the weaker offending leg unavailable.
    #[serde(default)]
    pub learn: bool,
}

fn default_true() -> bool {
    true
}

/// Pair predicate. Every field that is set must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulePredicate {
    #[serde(default)]
    pub same_player: Option<bool>,
    #[serde(default)]
    pub same_team: Option<bool>,
    #[serde(default)]
    pub same_game: Option<bool>,
    #[serde(default)]
    pub same_stat: Option<bool>,
    #[serde(default)]
    pub same_direction: Option<bool>,
    /// Unordered stat pair, e.g. `["pass_completions", "receptions"]`.
    #[serde(default)]
    pub stats: Option<[String; 2]>,
    /// Directions aligned with `stats`, or an unordered pair without it.
    #[serde(default)]
    pub directions: Option<[String; 2]>,
}

impl RulePredicate {
    fn is_empty(&self) -> bool {
        self.same_player.is_none()
            && self.same_team.is_none()
            && self.same_game.is_none()
            && self.same_stat.is_none()
            && self.same_direction.is_none()
            && self.stats.is_none()
            && self.directions.is_none()
    }
}

/// A rule compiled from its record, ready to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRule {
    pub id: String,
    pub description: String,
    pub learn: bool,
    same_player: Option<bool>,
    same_team: Option<bool>,
    same_game: Option<bool>,
    same_stat: Option<bool>,
    same_direction: Option<bool>,
    stats: Option<(StatCategory, StatCategory)>,
    directions: Option<(Direction, Direction)>,
}

impl ValidationRule {
    pub fn compile(record: &RuleRecord) -> Result<Self, EngineError> {
        let malformed = |reason: String| EngineError::MalformedRule {
            rule_id: record.id.clone(),
            reason,
        };

        let predicate: RulePredicate =
            serde_json::from_str(&record.predicate).map_err(|e| malformed(e.to_string()))?;
        if predicate.is_empty() {
            return Err(malformed("predicate constrains nothing".to_string()));
        }

        let stats = match &predicate.stats {
            Some([a, b]) => {
                let a: StatCategory =
                    a.parse().map_err(|e: anyhow::Error| malformed(e.to_string()))?;
                let b: StatCategory =
                    b.parse().map_err(|e: anyhow::Error| malformed(e.to_string()))?;
                Some((a, b))
            }
            None => None,
        };
        let directions = match &predicate.directions {
            Some([a, b]) => {
                let a: Direction = a.parse().map_err(|e: anyhow::Error| malformed(e.to_string()))?;
                let b: Direction = b.parse().map_err(|e: anyhow::Error| malformed(e.to_string()))?;
                Some((a, b))
            }
            None => None,
        };

        Ok(Self {
            id: record.id.clone(),
            description: record.description.clone(),
            learn: record.learn,
            same_player: predicate.same_player,
            same_team: predicate.same_team,
            same_game: predicate.same_game,
            same_stat: predicate.same_stat,
            same_direction: predicate.same_direction,
            stats,
            directions,
        })
    }

    /// True when the leg pair matches, in either order.
    pub fn matches(&self, a: &PropAnalysis, b: &PropAnalysis) -> bool {
        let (ca, cb) = (&a.candidate, &b.candidate);

        let holds = |want: Option<bool>, actual: bool| want.map_or(true, |w| w == actual);
        if !holds(self.same_player, ca.player_key() == cb.player_key())
            || !holds(self.same_team, ca.team.eq_ignore_ascii_case(&cb.team))
            || !holds(self.same_game, ca.game_key() == cb.game_key())
            || !holds(self.same_stat, ca.stat == cb.stat)
            || !holds(self.same_direction, ca.direction == cb.direction)
        {
            return false;
        }

        self.matches_ordered(a, b) || self.matches_ordered(b, a)
    }

    fn matches_ordered(&self, first: &PropAnalysis, second: &PropAnalysis) -> bool {
        let (f, s) = (&first.candidate, &second.candidate);
        let stats_ok = self
            .stats
            .map_or(true, |(sa, sb)| f.stat == sa && s.stat == sb);
        let dirs_ok = self
            .directions
            .map_or(true, |(da, db)| f.direction == da && s.direction == db);
        stats_ok && dirs_ok
    }
}

/// Active, compiled rules plus whatever failed to compile.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ValidationRule>,
    skipped: Vec<String>,
}

impl RuleSet {
    /// Compile active records. Malformed rules are logged and skipped;
    /// the remaining rules still apply.
    pub fn from_records(records: &[RuleRecord]) -> Self {
        let mut set = RuleSet::default();
        for record in records.iter().filter(|r| r.active) {
            match ValidationRule::compile(record) {
                Ok(rule) => set.rules.push(rule),
                Err(e) => {
                    warn!(rule_id = %record.id, error = %e, "Skipping malformed rule");
                    set.skipped.push(record.id.clone());
                }
            }
        }
        set
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    /// Ids of rules that failed to compile.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn get(&self, id: &str) -> Option<&ValidationRule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

fn rule(id: &str, description: &str, predicate: serde_json::Value, learn: bool) -> RuleRecord {
    RuleRecord {
        id: id.to_string(),
        description: description.to_string(),
        predicate: predicate.to_string(),
        active: true,
        learn,
    }
}

/// Rules seeded into a fresh store.
pub fn builtin_rules() -> Vec<RuleRecord> {
    use serde_json::json;
    vec![
        rule(
            "same-player-under-completions-receptions",
            "same player UNDER completions paired with UNDER receptions",
            json!({
                "same_player": true,
                "stats": ["pass_completions", "receptions"],
                "directions": ["UNDER", "UNDER"]
            }),
            true,
        ),
        rule(
            "same-player-receptions-receiving-yards",
            "same player receptions and receiving yards on the same side",
            json!({
                "same_player": true,
                "same_direction": true,
                "stats": ["receptions", "receiving_yards"]
            }),
            true,
        ),
        rule(
            "same-player-rush-attempts-rushing-yards",
            "same player carries and rushing yards on the same side",
            json!({
                "same_player": true,
                "same_direction": true,
                "stats": ["rush_attempts", "rushing_yards"]
            }),
            true,
        ),
        rule(
            "same-player-both-sides",
            "both sides of the same player prop",
            json!({
                "same_player": true,
                "same_stat": true,
                "same_direction": false
            }),
            false,
        ),
    ]
}
