//! Shared types for the PROPSTACK engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that agent, parlay, validation
//! and export modules can depend on them without circular references.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Score an agent emits when it has no opinion.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Lower bound of the internal confidence scale.
pub const MIN_CONFIDENCE: f64 = 0.0;

/// Upper bound of the internal confidence scale.
pub const MAX_CONFIDENCE: f64 = 100.0;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Bet direction relative to the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Over,
    Under,
}

impl Direction {
    /// +1 for OVER, -1 for UNDER. Multiplying `projection - line` by this
    /// yields the cushion in the direction that favours the bet.
    pub fn sign(&self) -> Decimal {
        match self {
            Direction::Over => Decimal::ONE,
            Direction::Under => Decimal::NEGATIVE_ONE,
        }
    }

    /// Re-express an OVER-oriented score for this direction.
    /// A score of 70 for OVER is a score of 30 for UNDER.
    pub fn orient(&self, over_score: f64) -> f64 {
        match self {
            Direction::Over => over_score,
            Direction::Under => MAX_CONFIDENCE - over_score,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Over => write!(f, "OVER"),
            Direction::Under => write!(f, "UNDER"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "over" | "o" | "more" => Ok(Direction::Over),
            "under" | "u" | "less" => Ok(Direction::Under),
            _ => Err(anyhow::anyhow!("Unknown direction: {s}")),
        }
    }
}

/// Broad grouping of stat categories, used by correlation heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatFamily {
    Passing,
    Rushing,
    Receiving,
    Scoring,
}

/// Statistical category a prop is written on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatCategory {
    PassingYards,
    PassCompletions,
    PassAttempts,
    PassingTouchdowns,
    Interceptions,
    RushingYards,
    RushAttempts,
    Receptions,
    ReceivingYards,
    AnytimeTouchdown,
}

impl StatCategory {
    pub fn family(&self) -> StatFamily {
        match self {
            StatCategory::PassingYards
            | StatCategory::PassCompletions
            | StatCategory::PassAttempts
            | StatCategory::Interceptions => StatFamily::Passing,
            StatCategory::RushingYards | StatCategory::RushAttempts => StatFamily::Rushing,
            StatCategory::Receptions | StatCategory::ReceivingYards => StatFamily::Receiving,
            StatCategory::PassingTouchdowns | StatCategory::AnytimeTouchdown => StatFamily::Scoring,
        }
    }

    /// Size of one "line unit" for this category. Yardage lines move in
    /// steps of roughly ten yards for the same effect a single reception
    /// or completion has on a count line.
    pub fn unit_scale(&self) -> f64 {
        match self {
            StatCategory::PassingYards => 25.0,
            StatCategory::RushingYards | StatCategory::ReceivingYards => 10.0,
            _ => 1.0,
        }
    }

    /// True for categories whose outcome swings heavily on a single play.
    pub fn is_high_variance(&self) -> bool {
        matches!(
            self,
            StatCategory::PassingTouchdowns
                | StatCategory::AnytimeTouchdown
                | StatCategory::Interceptions
        )
    }

    /// Stable machine label used in signatures and exports.
    pub fn label(&self) -> &'static str {
        match self {
            StatCategory::PassingYards => "passing_yards",
            StatCategory::PassCompletions => "pass_completions",
            StatCategory::PassAttempts => "pass_attempts",
            StatCategory::PassingTouchdowns => "passing_touchdowns",
            StatCategory::Interceptions => "interceptions",
            StatCategory::RushingYards => "rushing_yards",
            StatCategory::RushAttempts => "rush_attempts",
            StatCategory::Receptions => "receptions",
            StatCategory::ReceivingYards => "receiving_yards",
            StatCategory::AnytimeTouchdown => "anytime_touchdown",
        }
    }
}

impl fmt::Display for StatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Parse a stat label (case-insensitive, spaces/dashes/underscores ignored).
impl std::str::FromStr for StatCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "passingyards" | "passyards" | "passyds" => Ok(StatCategory::PassingYards),
            "passcompletions" | "completions" => Ok(StatCategory::PassCompletions),
            "passattempts" | "attempts" => Ok(StatCategory::PassAttempts),
            "passingtouchdowns" | "passtds" | "passingtds" => Ok(StatCategory::PassingTouchdowns),
            "interceptions" | "ints" => Ok(StatCategory::Interceptions),
            "rushingyards" | "rushyards" | "rushyds" => Ok(StatCategory::RushingYards),
            "rushattempts" | "carries" => Ok(StatCategory::RushAttempts),
            "receptions" | "catches" => Ok(StatCategory::Receptions),
            "receivingyards" | "recyards" | "recyds" => Ok(StatCategory::ReceivingYards),
            "anytimetouchdown" | "anytimetd" | "touchdown" => Ok(StatCategory::AnytimeTouchdown),
            _ => Err(anyhow::anyhow!("Unknown stat category: {s}")),
        }
    }
}

/// Roster position, used by the positional matchup agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Qb,
    Rb,
    Wr,
    Te,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Qb => write!(f, "QB"),
            Position::Rb => write!(f, "RB"),
            Position::Wr => write!(f, "WR"),
            Position::Te => write!(f, "TE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Prop candidate
// ---------------------------------------------------------------------------

/// A single wager opportunity for one slate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropCandidate {
    pub player: String,
    pub team: String,
    pub opponent: String,
    /// Week or slate identifier.
    pub week: String,
    pub stat: StatCategory,
    pub line: Decimal,
    pub direction: Direction,
}

impl fmt::Display for PropCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} vs {}) {} {} {}",
            self.player, self.team, self.opponent, self.stat, self.direction, self.line,
        )
    }
}

impl PropCandidate {
    /// Normalized availability signature (player + stat + direction).
    pub fn signature(&self) -> PropSignature {
        PropSignature::new(&self.player, self.stat, self.direction)
    }

    /// Matchup key shared by both teams of a game within a week.
    pub fn game_key(&self) -> String {
        let (a, b) = if self.team <= self.opponent {
            (&self.team, &self.opponent)
        } else {
            (&self.opponent, &self.team)
        };
        format!("{}:{}-{}", self.week, a.to_uppercase(), b.to_uppercase())
    }

    /// Unique key for this exact wager, including line and week.
    pub fn leg_key(&self) -> String {
        format!("{}|{}|{}", self.signature(), self.line.normalize(), self.week)
    }

    /// Normalized player identity used for the duplicate-player invariant.
    pub fn player_key(&self) -> String {
        normalize_name(&self.player)
    }
}

/// Lowercase and collapse internal whitespace.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized `player|stat|direction` key into the availability store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropSignature(String);

impl PropSignature {
    pub fn new(player: &str, stat: StatCategory, direction: Direction) -> Self {
        Self(format!(
            "{}|{}|{}",
            normalize_name(player),
            stat.label(),
            direction.to_string().to_lowercase()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse `player|stat|direction`, re-normalizing each part.
impl std::str::FromStr for PropSignature {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('|').map(str::trim).collect();
        let invalid = |reason: &str| EngineError::InvalidSignature {
            signature: s.to_string(),
            reason: reason.to_string(),
        };
        if parts.len() != 3 || parts[0].is_empty() {
            return Err(invalid("expected `player|stat|direction`"));
        }
        let stat: StatCategory = parts[1].parse().map_err(|_| invalid("unknown stat category"))?;
        let direction: Direction = parts[2].parse().map_err(|_| invalid("unknown direction"))?;
        Ok(PropSignature::new(parts[0], stat, direction))
    }
}

// ---------------------------------------------------------------------------
// Agent scores & analyses
// ---------------------------------------------------------------------------

/// Output of one agent for one prop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentScore {
    pub agent: String,
    /// 0–100, 50 = neutral.
    pub score: f64,
    pub weight: f64,
    /// Reasons behind a non-neutral lean.
    pub rationale: Vec<String>,
    /// Why the agent abstained, when it lacked the data to lean.
    /// Never counts as an opinion.
    #[serde(default)]
    pub abstention: Option<String>,
}

impl AgentScore {
    pub fn new(agent: &str, weight: f64, score: f64, rationale: Vec<String>) -> Self {
        Self {
            agent: agent.to_string(),
            score: clamp_confidence(score),
            weight,
            rationale,
            abstention: None,
        }
    }

    /// Neutral abstention carrying an explanation.
    pub fn abstain(agent: &str, weight: f64, reason: impl Into<String>) -> Self {
        Self {
            agent: agent.to_string(),
            score: NEUTRAL_SCORE,
            weight,
            rationale: Vec::new(),
            abstention: Some(reason.into()),
        }
    }

    /// An agent is opinionated iff it moved off neutral or explained a lean.
    pub fn is_opinionated(&self) -> bool {
        self.score != NEUTRAL_SCORE || !self.rationale.is_empty()
    }

    /// Score on the 0–10 export/display scale, one decimal.
    pub fn display_score(&self) -> f64 {
        self.score.round() / 10.0
    }
}

impl fmt::Display for AgentScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.abstention {
            Some(reason) => write!(f, "{}: abstained ({reason})", self.agent),
            None => write!(
                f,
                "{}: {:.1} (w={:.1}) {}",
                self.agent,
                self.score,
                self.weight,
                self.rationale.join("; ")
            ),
        }
    }
}

/// A scored prop: candidate, agent scores, and the aggregated confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropAnalysis {
    pub candidate: PropCandidate,
    pub scores: Vec<AgentScore>,
    /// 0–100, never rounded internally.
    pub confidence: f64,
    /// True when no agent held an opinion.
    pub low_signal: bool,
    pub projection: Option<Decimal>,
    /// `direction_sign × (projection − line)`.
    pub cushion: Option<Decimal>,
    /// Set when this analysis was derived from a line change.
    #[serde(default)]
    pub original_line: Option<Decimal>,
    #[serde(default)]
    pub adjusted_line: Option<Decimal>,
}

impl fmt::Display for PropAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | conf={:.1}", self.candidate, self.confidence)?;
        if let Some(c) = self.cushion {
            write!(f, " cushion={c}")?;
        }
        if self.low_signal {
            write!(f, " [low signal]")?;
        }
        Ok(())
    }
}

impl PropAnalysis {
    pub fn signature(&self) -> PropSignature {
        self.candidate.signature()
    }

    pub fn player_key(&self) -> String {
        self.candidate.player_key()
    }

    pub fn game_key(&self) -> String {
        self.candidate.game_key()
    }
}

/// Cushion for a given line: `direction_sign × (projection − line)`.
pub fn cushion_for(direction: Direction, projection: Decimal, line: Decimal) -> Decimal {
    direction.sign() * (projection - line)
}

// ---------------------------------------------------------------------------
// Parlays
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// How a parlay's legs were grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParlayType {
    /// All legs from one matchup.
    SameGame,
    /// No two legs share a game.
    Diversified,
    /// Caller-supplied legs.
    Custom,
}

impl fmt::Display for ParlayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParlayType::SameGame => write!(f, "same-game"),
            ParlayType::Diversified => write!(f, "diversified"),
            ParlayType::Custom => write!(f, "custom"),
        }
    }
}

/// A multi-leg combination. Legs are fixed once built; a different leg
/// set always yields a different id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parlay {
    pub id: Uuid,
    pub legs: Vec<PropAnalysis>,
    /// `100 × Π(cᵢ/100)` before correlation.
    pub raw_confidence: f64,
    /// Signed additive correction from correlation analysis.
    pub correlation_adjustment: f64,
    pub combined_confidence: f64,
    pub risk: RiskLevel,
    pub parlay_type: ParlayType,
    #[serde(default)]
    pub correlation_notes: Vec<String>,
}

impl fmt::Display for Parlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-leg {} parlay conf={} ({:+.1} corr) risk={}",
            self.legs.len(),
            self.parlay_type,
            present_confidence(self.combined_confidence),
            self.correlation_adjustment,
            self.risk,
        )
    }
}

impl Parlay {
    /// Deterministic id for an ordered leg set.
    pub fn id_for(legs: &[PropAnalysis]) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, Self::signature_of(legs).as_bytes())
    }

    /// Ordered leg keys joined into one audit signature.
    pub fn signature_of(legs: &[PropAnalysis]) -> String {
        legs.iter()
            .map(|l| l.candidate.leg_key())
            .collect::<Vec<_>>()
            .join(" + ")
    }

    pub fn signature(&self) -> String {
        Self::signature_of(&self.legs)
    }

    /// True when no two legs share a player.
    pub fn has_unique_players(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.legs.iter().all(|l| seen.insert(l.player_key()))
    }
}

/// A rule or correlation finding against specific legs of a parlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: String,
    pub reason: String,
    /// Offending leg positions within the parlay.
    pub leg_indices: Vec<usize>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (legs {:?})", self.rule_id, self.reason, self.leg_indices)
    }
}

// ---------------------------------------------------------------------------
// Confidence helpers
// ---------------------------------------------------------------------------

/// Clamp to [0, 100]. NaN maps to neutral.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        NEUTRAL_SCORE
    } else {
        value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    }
}

/// Presentation rounding: nearest integer, halves away from zero.
pub fn present_confidence(value: f64) -> u8 {
    clamp_confidence(value).round() as u8
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for PROPSTACK.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid line input ({input}): {reason}")]
    InvalidLine { input: String, reason: String },

    #[error("Malformed rule {rule_id}: {reason}")]
    MalformedRule { rule_id: String, reason: String },

    #[error("Invalid prop signature ({signature}): {reason}")]
    InvalidSignature { signature: String, reason: String },

    #[error("Refused availability transition for {signature}: {from} -> {to}")]
    TransitionRefused {
        signature: String,
        from: String,
        to: String,
    },

    #[error("Correlation oracle error: {0}")]
    Oracle(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
