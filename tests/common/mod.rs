//! Shared fixtures for integration tests.

#![allow(dead_code)]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use propstack::config::AppConfig;
use propstack::engine::PropEngine;
use propstack::parlay::ParlayConstructor;
use propstack::types::{
    AgentScore, Direction, Parlay, ParlayType, PropAnalysis, PropCandidate, StatCategory,
};
use propstack::validation::{builtin_rules, AvailabilityStore, InMemoryAvailabilityStore};

pub const STATS: [StatCategory; 5] = [
    StatCategory::ReceivingYards,
    StatCategory::RushingYards,
    StatCategory::Receptions,
    StatCategory::PassingYards,
    StatCategory::RushAttempts,
];

pub fn make_candidate(
    player: &str,
    team: &str,
    opponent: &str,
    stat: StatCategory,
    direction: Direction,
) -> PropCandidate {
    PropCandidate {
        player: player.into(),
        team: team.into(),
        opponent: opponent.into(),
        week: "W6".into(),
        stat,
        line: dec!(4.5),
        direction,
    }
}

/// An already scored prop carrying one opinionated agent.
pub fn make_scored(candidate: PropCandidate, confidence: f64) -> PropAnalysis {
    PropAnalysis {
        candidate,
        scores: vec![AgentScore::new("position_matchup", 1.5, confidence, vec!["fixture".into()])],
        confidence,
        low_signal: false,
        projection: Some(dec!(6.0)),
        cushion: Some(dec!(1.5)),
        original_line: None,
        adjusted_line: None,
    }
}

/// 50 scored props: 10 games, 5 distinct players per game, confidences
/// spread between 55 and 92.
pub fn make_slate_50() -> Vec<PropAnalysis> {
    let mut props = Vec::with_capacity(50);
    for game in 0..10 {
        let home = format!("H{game:02}");
        let away = format!("A{game:02}");
        for slot in 0..5 {
            let i = game * 5 + slot;
            let (team, opponent) = if slot % 2 == 0 { (&home, &away) } else { (&away, &home) };
            let direction = if i % 3 == 0 { Direction::Under } else { Direction::Over };
            let confidence = 55.0 + ((i * 7) % 38) as f64;
            props.push(make_scored(
                make_candidate(&format!("Player {i:02}"), team, opponent, STATS[slot], direction),
                confidence,
            ));
        }
    }
    props
}

pub fn make_config(min_confidence: f64, targets: &[(usize, usize)]) -> AppConfig {
    let mut config = AppConfig::default();
    config.engine.min_confidence = min_confidence;
    config.engine.targets = targets
        .iter()
        .map(|&(legs, count)| propstack::config::TargetBucket { legs, count })
        .collect();
    config
}

pub fn make_engine(config: &AppConfig) -> (Arc<InMemoryAvailabilityStore>, PropEngine) {
    let store = Arc::new(InMemoryAvailabilityStore::new());
    let engine = make_engine_over(config, store.clone());
    (store, engine)
}

pub fn make_engine_over(config: &AppConfig, store: Arc<dyn AvailabilityStore>) -> PropEngine {
    PropEngine::from_config(config, store, &builtin_rules(), None)
}

/// Hand-assembled parlay, bypassing construction-time checks.
pub fn make_parlay(legs: Vec<PropAnalysis>) -> Parlay {
    let raw = ParlayConstructor::independent_confidence(&legs);
    let risk = propstack::parlay::risk::classify(legs.len(), raw);
    Parlay {
        id: Parlay::id_for(&legs),
        legs,
        raw_confidence: raw,
        correlation_adjustment: 0.0,
        combined_confidence: raw,
        risk,
        parlay_type: ParlayType::Custom,
        correlation_notes: Vec::new(),
    }
}

pub fn temp_path(prefix: &str, ext: &str) -> String {
    let mut p = std::env::temp_dir();
    p.push(format!("{prefix}_{}.{ext}", uuid::Uuid::new_v4()));
    p.to_string_lossy().to_string()
}

pub fn line(value: &str) -> Decimal {
    value.parse().unwrap_or_default()
}
