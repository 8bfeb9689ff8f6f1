//! Calibration export.
//!
//! Flattens parlays into one record per leg and appends them to a
//! JSON-lines file. The outcome field stays empty; graders fill it in
//! after the games settle.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::info;
use uuid::Uuid;

use crate::types::{present_confidence, Direction, Parlay, ParlayType, RiskLevel, StatCategory};

/// One parlay leg, flattened for calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub parlay_id: Uuid,
    pub parlay_type: ParlayType,
    pub leg_index: usize,
    pub legs: usize,
    pub player: String,
    pub team: String,
    pub opponent: String,
    pub week: String,
    pub stat: StatCategory,
    pub line: Decimal,
    pub direction: Direction,
    /// Agent name → score on the 0–10 display scale.
    pub agent_scores: BTreeMap<String, f64>,
    pub leg_confidence: f64,
    pub raw_confidence: f64,
    pub adjusted_confidence: f64,
    pub presented_confidence: u8,
    pub risk: RiskLevel,
    /// Filled externally once the leg settles.
    pub outcome: Option<bool>,
    pub exported_at: DateTime<Utc>,
}

/// One record per leg, in leg order.
pub fn flatten(parlay: &Parlay) -> Vec<ExportRecord> {
    let exported_at = Utc::now();
    parlay
        .legs
        .iter()
        .enumerate()
        .map(|(i, leg)| {
            let c = &leg.candidate;
            ExportRecord {
                parlay_id: parlay.id,
                parlay_type: parlay.parlay_type,
                leg_index: i,
                legs: parlay.legs.len(),
                player: c.player.clone(),
                team: c.team.clone(),
                opponent: c.opponent.clone(),
                week: c.week.clone(),
                stat: c.stat,
                line: c.line,
                direction: c.direction,
                agent_scores: leg
                    .scores
                    .iter()
                    .map(|s| (s.agent.clone(), s.display_score()))
                    .collect(),
                leg_confidence: leg.confidence,
                raw_confidence: parlay.raw_confidence,
                adjusted_confidence: parlay.combined_confidence,
                presented_confidence: present_confidence(parlay.combined_confidence),
                risk: parlay.risk,
                outcome: None,
                exported_at,
            }
        })
        .collect()
}

/// Serialize parlays as JSON lines, one leg per line.
pub fn to_jsonl(parlays: &[Parlay]) -> Result<String> {
    let mut out = String::new();
    for record in parlays.iter().flat_map(flatten) {
        let line = serde_json::to_string(&record).context("Failed to serialise export record")?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Append parlays to a JSON-lines file. Returns the number of records written.
pub fn write_jsonl(path: &str, parlays: &[Parlay]) -> Result<usize> {
    let body = to_jsonl(parlays)?;
    let count = body.lines().count();

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open export file {path}"))?;
    file.write_all(body.as_bytes())
        .with_context(|| format!("Failed to write export file {path}"))?;

    info!(path, parlays = parlays.len(), records = count, "Calibration export written");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentScore, PropAnalysis, PropCandidate};
    use rust_decimal_macros::dec;

    fn make_leg(player: &str, confidence: f64) -> PropAnalysis {
        PropAnalysis {
            candidate: PropCandidate {
                player: player.into(),
                team: "CIN".into(),
                opponent: "BAL".into(),
                week: "W3".into(),
                stat: StatCategory::ReceivingYards,
                line: dec!(71.5),
                direction: Direction::Over,
            },
            scores: vec![
                AgentScore::new("matchup", 1.0, 72.0, vec!["soft secondary".into()]),
                AgentScore::abstain("weather", 1.0, "indoor"),
            ],
            confidence,
            low_signal: false,
            projection: Some(dec!(80)),
            cushion: Some(dec!(8.5)),
            original_line: None,
            adjusted_line: None,
        }
    }

    fn make_parlay() -> Parlay {
        let legs = vec![make_leg("Ja'Marr Chase", 85.0), make_leg("Tee Higgins", 78.0)];
        Parlay {
            id: Parlay::id_for(&legs),
            legs,
            raw_confidence: 66.3,
            correlation_adjustment: 3.0,
            combined_confidence: 69.3,
            risk: RiskLevel::Low,
            parlay_type: ParlayType::SameGame,
            correlation_notes: Vec::new(),
        }
    }

    #[test]
    fn test_flatten_one_record_per_leg() {
        let parlay = make_parlay();
        let records = flatten(&parlay);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].leg_index, 1);
        assert_eq!(records[1].player, "Tee Higgins");
        assert!(records.iter().all(|r| r.parlay_id == parlay.id && r.legs == 2));
        assert_eq!(records[0].agent_scores["matchup"], 7.2);
        assert_eq!(records[0].agent_scores["weather"], 5.0);
        assert_eq!(records[0].raw_confidence, 66.3);
        assert_eq!(records[0].adjusted_confidence, 69.3);
        assert_eq!(records[0].presented_confidence, 69);
        assert!(records.iter().all(|r| r.outcome.is_none()));
    }

    #[test]
    fn test_jsonl_has_null_outcome() {
        let body = to_jsonl(&[make_parlay()]).unwrap();
        assert_eq!(body.lines().count(), 2);
        for line in body.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value["outcome"].is_null());
        }
    }

    #[test]
    fn test_write_appends() {
        let mut p = std::env::temp_dir();
        p.push(format!("propstack_test_export_{}.jsonl", Uuid::new_v4()));
        let path = p.to_string_lossy().to_string();

        assert_eq!(write_jsonl(&path, &[make_parlay()]).unwrap(), 2);
        assert_eq!(write_jsonl(&path, &[make_parlay()]).unwrap(), 2);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 4);

        std::fs::remove_file(&path).unwrap();
    }
}
