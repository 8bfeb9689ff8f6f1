//! Parlay construction.
//!
//! Takes an aggregated, availability-filtered pool and fills each
//! requested leg-count bucket. Selection is deterministic: the pool is
//! stable-sorted by confidence then player, diversified parlays draw
//! from a round-robin over games, and every bucket is filled greedily
//! from rotated start positions. Buckets that cannot be filled without
//! breaking the duplicate-player or style rules come back short with a
//! deficit count.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use super::correlation::{CorrelationAnalyzer, CorrelationReport};
use super::risk;
use crate::types::{clamp_confidence, Parlay, ParlayType, PropAnalysis, MAX_CONFIDENCE};

/// Leg-grouping policy for generated parlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParlayStyle {
    /// Every leg from a different game.
    #[default]
    Diversified,
    /// Every leg from one game.
    SameGame,
}

impl ParlayStyle {
    fn parlay_type(&self) -> ParlayType {
        match self {
            ParlayStyle::Diversified => ParlayType::Diversified,
            ParlayStyle::SameGame => ParlayType::SameGame,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstructorConfig {
    pub style: ParlayStyle,
    /// Max number of parlays one leg may appear in within a build.
    pub max_leg_exposure: usize,
}

impl Default for ConstructorConfig {
    fn default() -> Self {
        Self {
            style: ParlayStyle::Diversified,
            max_leg_exposure: 3,
        }
    }
}

/// Result of one build: parlays in bucket order plus unfilled slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub parlays: Vec<Parlay>,
    /// Leg count → number of requested parlays that could not be built.
    pub deficits: BTreeMap<usize, usize>,
}

impl BuildReport {
    pub fn total_deficit(&self) -> usize {
        self.deficits.values().sum()
    }

    pub fn with_legs(&self, legs: usize) -> impl Iterator<Item = &Parlay> + '_ {
        self.parlays.iter().filter(move |p| p.legs.len() == legs)
    }
}

pub struct ParlayConstructor {
    config: ConstructorConfig,
    correlation: CorrelationAnalyzer,
}

impl ParlayConstructor {
    pub fn new(config: ConstructorConfig, correlation: CorrelationAnalyzer) -> Self {
        Self { config, correlation }
    }

    pub fn config(&self) -> &ConstructorConfig {
        &self.config
    }

    pub fn correlation(&self) -> &CorrelationAnalyzer {
        &self.correlation
    }

    /// Build parlays in the configured style.
    pub fn build(
        &self,
        analyses: &[PropAnalysis],
        min_confidence: f64,
        targets: &BTreeMap<usize, usize>,
    ) -> BuildReport {
        self.build_with_style(analyses, min_confidence, targets, self.config.style)
    }

    pub fn build_with_style(
        &self,
        analyses: &[PropAnalysis],
        min_confidence: f64,
        targets: &BTreeMap<usize, usize>,
        style: ParlayStyle,
    ) -> BuildReport {
        let pool = Self::ranked_pool(analyses, min_confidence);
        let groups = Self::group_by_game(&pool);

        let mut exposure: HashMap<String, usize> = HashMap::new();
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut report = BuildReport::default();

        for (&leg_count, &wanted) in targets {
            if wanted == 0 {
                continue;
            }
            let mut built = 0;
            if leg_count > 0 {
                let sources: Vec<Vec<&PropAnalysis>> = match style {
                    ParlayStyle::Diversified => vec![Self::round_robin(&groups)],
                    ParlayStyle::SameGame => groups.clone(),
                };
                'sources: for source in &sources {
                    for offset in 0..source.len() {
                        if built == wanted {
                            break 'sources;
                        }
                        let Some(legs) = self.pick(source, offset, leg_count, style, &exposure)
                        else {
                            continue;
                        };
                        let mut key: Vec<String> =
                            legs.iter().map(|l| l.candidate.leg_key()).collect();
                        key.sort();
                        if !seen.insert(key) {
                            continue;
                        }
                        for leg in &legs {
                            *exposure.entry(leg.candidate.leg_key()).or_insert(0) += 1;
                        }
                        let parlay = self.assemble(legs, style.parlay_type());
                        debug!(parlay = %parlay, "Parlay built");
                        report.parlays.push(parlay);
                        built += 1;
                    }
                }
            }
            if built < wanted {
                warn!(legs = leg_count, wanted, built, "Insufficient pool for bucket");
                report.deficits.insert(leg_count, wanted - built);
            }
        }

        info!(
            pool = pool.len(),
            parlays = report.parlays.len(),
            deficit = report.total_deficit(),
            style = ?style,
            "Parlay build complete"
        );
        report
    }

    /// Caller-supplied legs. Returns `None` for an empty list or when two
    /// legs share a player.
    pub fn custom(&self, legs: Vec<PropAnalysis>) -> Option<Parlay> {
        if legs.is_empty() {
            return None;
        }
        let mut players = HashSet::new();
        if !legs.iter().all(|l| players.insert(l.player_key())) {
            warn!(legs = legs.len(), "Rejected custom parlay with a repeated player");
            return None;
        }
        Some(self.assemble(legs, ParlayType::Custom))
    }

    /// Re-score an existing parlay, consulting the oracle if configured.
    /// Legs are unchanged, so the id is unchanged.
    pub async fn refine(&self, parlay: &Parlay) -> Parlay {
        let report = self.correlation.analyze_with_oracle(&parlay.legs).await;
        Self::finish(parlay.legs.clone(), parlay.parlay_type, report)
    }

    fn assemble(&self, legs: Vec<PropAnalysis>, parlay_type: ParlayType) -> Parlay {
        let report = self.correlation.analyze(&legs);
        Self::finish(legs, parlay_type, report)
    }

    fn finish(
        legs: Vec<PropAnalysis>,
        parlay_type: ParlayType,
        report: CorrelationReport,
    ) -> Parlay {
        let raw_confidence = Self::independent_confidence(&legs);
        let combined_confidence = clamp_confidence(raw_confidence + report.adjustment);
        let mut notes = report.notes;
        notes.extend(report.flags.iter().map(|f| format!("flag: {f}")));
        Parlay {
            id: Parlay::id_for(&legs),
            risk: risk::classify(legs.len(), combined_confidence),
            legs,
            raw_confidence,
            correlation_adjustment: report.adjustment,
            combined_confidence,
            parlay_type,
            correlation_notes: notes,
        }
    }

    /// `100 × Π(cᵢ / 100)`.
    pub fn independent_confidence(legs: &[PropAnalysis]) -> f64 {
        let product: f64 = legs
            .iter()
            .map(|l| clamp_confidence(l.confidence) / MAX_CONFIDENCE)
            .product();
        clamp_confidence(product * MAX_CONFIDENCE)
    }

    /// Greedy pick of `leg_count` legs starting at `offset`, wrapping.
    fn pick(
        &self,
        source: &[&PropAnalysis],
        offset: usize,
        leg_count: usize,
        style: ParlayStyle,
        exposure: &HashMap<String, usize>,
    ) -> Option<Vec<PropAnalysis>> {
        let mut chosen: Vec<PropAnalysis> = Vec::with_capacity(leg_count);
        let mut players = HashSet::new();
        let mut games = HashSet::new();

        for k in 0..source.len() {
            if chosen.len() == leg_count {
                break;
            }
            let leg = source[(offset + k) % source.len()];
            let used = exposure.get(&leg.candidate.leg_key()).copied().unwrap_or(0);
            if used >= self.config.max_leg_exposure || players.contains(&leg.player_key()) {
                continue;
            }
            if style == ParlayStyle::Diversified && games.contains(&leg.game_key()) {
                continue;
            }
            if chosen.iter().any(|c| CorrelationAnalyzer::harmful_pair(c, leg).is_some()) {
                continue;
            }
            players.insert(leg.player_key());
            games.insert(leg.game_key());
            chosen.push(leg.clone());
        }

        (chosen.len() == leg_count).then_some(chosen)
    }

    /// Threshold, dedupe by leg key, and stable-sort: confidence desc,
    /// then player, stat, direction, line.
    fn ranked_pool(analyses: &[PropAnalysis], min_confidence: f64) -> Vec<&PropAnalysis> {
        let mut seen = HashSet::new();
        let mut pool: Vec<&PropAnalysis> = analyses
            .iter()
            .filter(|a| a.confidence.is_finite() && a.confidence >= min_confidence)
            .filter(|a| seen.insert(a.candidate.leg_key()))
            .collect();
        pool.sort_by(|a, b| Self::rank(a, b));
        pool
    }

    fn rank(a: &PropAnalysis, b: &PropAnalysis) -> Ordering {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.player_key().cmp(&b.player_key()))
            .then_with(|| a.candidate.stat.cmp(&b.candidate.stat))
            .then_with(|| a.candidate.direction.cmp(&b.candidate.direction))
            .then_with(|| a.candidate.line.cmp(&b.candidate.line))
    }

    /// Games in order of their best leg, each holding its legs in rank order.
    fn group_by_game<'a>(pool: &[&'a PropAnalysis]) -> Vec<Vec<&'a PropAnalysis>> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Vec<&PropAnalysis>> = Vec::new();
        for &leg in pool {
            let slot = *index.entry(leg.game_key()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(leg);
        }
        groups
    }

    /// Interleave groups: first of each, then second of each, and so on.
    fn round_robin<'a>(groups: &[Vec<&'a PropAnalysis>]) -> Vec<&'a PropAnalysis> {
        let depth = groups.iter().map(Vec::len).max().unwrap_or(0);
        let mut ordered = Vec::with_capacity(groups.iter().map(Vec::len).sum());
        for row in 0..depth {
            for group in groups {
                if let Some(&leg) = group.get(row) {
                    ordered.push(leg);
                }
            }
        }
        ordered
    }
}

impl Default for ParlayConstructor {
    fn default() -> Self {
        Self::new(ConstructorConfig::default(), CorrelationAnalyzer::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, PropCandidate, RiskLevel, StatCategory};
    use rust_decimal_macros::dec;

    fn make_leg(
        player: &str,
        team: &str,
        opponent: &str,
        stat: StatCategory,
        confidence: f64,
    ) -> PropAnalysis {
        PropAnalysis {
            candidate: PropCandidate {
                player: player.into(),
                team: team.into(),
                opponent: opponent.into(),
                week: "W7".into(),
                stat,
                line: dec!(50.5),
                direction: Direction::Over,
            },
            scores: Vec::new(),
            confidence,
            low_signal: false,
            projection: None,
            cushion: None,
            original_line: None,
            adjusted_line: None,
        }
    }

    fn make_targets(pairs: &[(usize, usize)]) -> BTreeMap<usize, usize> {
        pairs.iter().copied().collect()
    }

    /// Two legs in each of four games, each player on a different stat.
    fn make_pool() -> Vec<PropAnalysis> {
        vec![
            make_leg("A1", "KC", "BUF", StatCategory::Receptions, 80.0),
            make_leg("A2", "BUF", "KC", StatCategory::RushAttempts, 72.0),
            make_leg("B1", "DAL", "PHI", StatCategory::Receptions, 78.0),
            make_leg("B2", "PHI", "DAL", StatCategory::RushAttempts, 70.0),
            make_leg("C1", "SF", "SEA", StatCategory::Receptions, 76.0),
            make_leg("C2", "SEA", "SF", StatCategory::RushAttempts, 68.0),
            make_leg("D1", "MIA", "NYJ", StatCategory::Receptions, 74.0),
            make_leg("D2", "NYJ", "MIA", StatCategory::RushAttempts, 66.0),
        ]
    }

    #[test]
    fn test_independent_confidence_product() {
        let legs = vec![
            make_leg("a", "KC", "BUF", StatCategory::Receptions, 85.0),
            make_leg("b", "DAL", "PHI", StatCategory::Receptions, 78.0),
            make_leg("c", "SF", "SEA", StatCategory::Receptions, 70.0),
        ];
        let c = ParlayConstructor::independent_confidence(&legs);
        assert!((c - 46.41).abs() < 1e-9);
        assert_eq!(crate::types::present_confidence(c), 46);
    }

    #[test]
    fn test_diversified_never_shares_games_or_players() {
        let ctor = ParlayConstructor::default();
        let report = ctor.build(&make_pool(), 60.0, &make_targets(&[(2, 3), (3, 3)]));
        assert_eq!(report.parlays.len(), 6);
        for p in &report.parlays {
            assert!(p.has_unique_players());
            let games: HashSet<String> = p.legs.iter().map(|l| l.game_key()).collect();
            assert_eq!(games.len(), p.legs.len());
            assert_eq!(p.parlay_type, ParlayType::Diversified);
        }
    }

    #[test]
    fn test_threshold_filters_pool() {
        let ctor = ParlayConstructor::default();
        let report = ctor.build(&make_pool(), 75.0, &make_targets(&[(2, 5)]));
        // Only A1, B1, C1 clear 75: three distinct pairs.
        assert_eq!(report.parlays.len(), 3);
        assert_eq!(report.deficits.get(&2), Some(&2));
        assert!(report
            .parlays
            .iter()
            .flat_map(|p| &p.legs)
            .all(|l| l.confidence >= 75.0));
    }

    #[test]
    fn test_impossible_bucket_reports_deficit() {
        let ctor = ParlayConstructor::default();
        // Only four games, so a five-leg diversified parlay cannot exist.
        let report = ctor.build(&make_pool(), 0.0, &make_targets(&[(5, 2)]));
        assert!(report.parlays.is_empty());
        assert_eq!(report.deficits.get(&5), Some(&2));
    }

    #[test]
    fn test_same_game_stays_in_one_game() {
        let ctor = ParlayConstructor::default();
        let targets = make_targets(&[(2, 4)]);
        let report = ctor.build_with_style(&make_pool(), 0.0, &targets, ParlayStyle::SameGame);
        assert_eq!(report.parlays.len(), 4);
        for p in &report.parlays {
            let games: HashSet<String> = p.legs.iter().map(|l| l.game_key()).collect();
            assert_eq!(games.len(), 1);
            assert_eq!(p.parlay_type, ParlayType::SameGame);
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let ctor = ParlayConstructor::default();
        let targets = make_targets(&[(2, 3), (3, 2)]);
        let mut shuffled = make_pool();
        shuffled.reverse();
        let a = ctor.build(&make_pool(), 60.0, &targets);
        let b = ctor.build(&shuffled, 60.0, &targets);
        let ids = |r: &BuildReport| r.parlays.iter().map(|p| p.id).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_leg_exposure_cap() {
        let ctor = ParlayConstructor::new(
            ConstructorConfig { max_leg_exposure: 1, ..ConstructorConfig::default() },
            CorrelationAnalyzer::default(),
        );
        let report = ctor.build(&make_pool(), 0.0, &make_targets(&[(2, 10)]));
        let mut counts: HashMap<String, usize> = HashMap::new();
        for leg in report.parlays.iter().flat_map(|p| &p.legs) {
            *counts.entry(leg.candidate.leg_key()).or_default() += 1;
        }
        assert!(counts.values().all(|&c| c == 1));
        assert_eq!(report.parlays.len(), 4);
    }

    #[test]
    fn test_custom_rejects_repeated_player() {
        let ctor = ParlayConstructor::default();
        let legs = vec![
            make_leg("Same Guy", "KC", "BUF", StatCategory::Receptions, 70.0),
            make_leg("same guy", "KC", "BUF", StatCategory::RushAttempts, 70.0),
        ];
        assert!(ctor.custom(legs).is_none());
        assert!(ctor.custom(Vec::new()).is_none());
    }

    #[test]
    fn test_custom_parlay_scored_and_risked() {
        let ctor = ParlayConstructor::default();
        let legs = vec![
            make_leg("a", "KC", "BUF", StatCategory::Receptions, 85.0),
            make_leg("b", "DAL", "PHI", StatCategory::Receptions, 78.0),
            make_leg("c", "SF", "SEA", StatCategory::Receptions, 70.0),
        ];
        let p = ctor.custom(legs).unwrap();
        assert_eq!(p.parlay_type, ParlayType::Custom);
        assert_eq!(p.correlation_adjustment, 0.0);
        assert_eq!(p.risk, RiskLevel::Medium);
        assert_eq!(p.id, Parlay::id_for(&p.legs));
    }
}
