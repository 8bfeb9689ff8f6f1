//! Persistence layer.
//!
//! Saves and loads engine state (rule table, availability table,
//! validation history) to/from a JSON file, and reads slate and rule
//! inputs from disk.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::engine::Slate;
use crate::validation::{
    AvailabilityRecord, AvailabilityStore, InMemoryAvailabilityStore, RuleRecord,
    ValidationHistoryEntry,
};

/// Default state file path.
pub const DEFAULT_STATE_FILE: &str = "propstack_state.json";

/// Everything that survives between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub rules: Vec<RuleRecord>,
    #[serde(default)]
    pub availability: Vec<AvailabilityRecord>,
    #[serde(default)]
    pub history: Vec<ValidationHistoryEntry>,
    pub saved_at: DateTime<Utc>,
}

impl EngineState {
    pub fn snapshot(store: &dyn AvailabilityStore, rules: &[RuleRecord]) -> Self {
        Self {
            rules: rules.to_vec(),
            availability: store.records(),
            history: store.history(),
            saved_at: Utc::now(),
        }
    }

    /// Open a fresh session over the persisted tables.
    pub fn into_store(self) -> (InMemoryAvailabilityStore, Vec<RuleRecord>) {
        let store = InMemoryAvailabilityStore::with_prior(self.availability, self.history);
        (store, self.rules)
    }
}

/// Save engine state to a JSON file.
pub fn save_state(state: &EngineState, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(state)
        .context("Failed to serialise engine state")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write state to {path}"))?;

    debug!(
        path,
        rules = state.rules.len(),
        availability = state.availability.len(),
        "State saved"
    );
    Ok(())
}

/// Load engine state from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> Result<Option<EngineState>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read state from {path}"))?;

    let state: EngineState = serde_json::from_str(&json)
        .context(format!("Failed to parse state from {path}"))?;

    info!(
        path,
        rules = state.rules.len(),
        availability = state.availability.len(),
        history = state.history.len(),
        "State loaded from disk"
    );

    Ok(Some(state))
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

/// Read a slate (candidates plus context) from a JSON file.
pub fn load_slate(path: &str) -> Result<Slate> {
    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read slate from {path}"))?;
    let slate: Slate = serde_json::from_str(&json)
        .context(format!("Failed to parse slate from {path}"))?;
    info!(path, candidates = slate.candidates.len(), "Slate loaded");
    Ok(slate)
}

/// Read extra rule records from a JSON array file.
pub fn load_rules(path: &str) -> Result<Vec<RuleRecord>> {
    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read rules from {path}"))?;
    serde_json::from_str(&json).context(format!("Failed to parse rules from {path}"))
}

/// Merge `extra` into `base`. A record with an existing id replaces it.
pub fn merge_rules(mut base: Vec<RuleRecord>, extra: Vec<RuleRecord>) -> Vec<RuleRecord> {
    for record in extra {
        match base.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => base.push(record),
        }
    }
    base
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, PropSignature, StatCategory};
    use crate::validation::{builtin_rules, Availability, DecisionSource};

    fn temp_path() -> String {
        let mut p = std::env::temp_dir();
        p.push(format!("propstack_test_state_{}.json", uuid::Uuid::new_v4()));
        p.to_string_lossy().to_string()
    }

    fn make_sig(player: &str) -> PropSignature {
        PropSignature::new(player, StatCategory::Receptions, Direction::Under)
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path();
        let store = InMemoryAvailabilityStore::new();
        store
            .record(&make_sig("Tee Higgins"), false, DecisionSource::Manual("reviewer".into()))
            .unwrap();
        let state = EngineState::snapshot(&store, &builtin_rules());
        save_state(&state, Some(&path)).unwrap();

        let loaded = load_state(Some(&path)).unwrap();
        assert!(loaded.is_some());
        let loaded = loaded.unwrap();
        assert_eq!(loaded, state);

        delete_state(Some(&path)).unwrap();
    }

    #[test]
    fn test_load_nonexistent() {
        let path = "/tmp/propstack_nonexistent_state_12345.json";
        let loaded = load_state(Some(path)).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_restored_store_keeps_decisions() {
        let path = temp_path();
        let store = InMemoryAvailabilityStore::new();
        store
            .record(&make_sig("A"), false, DecisionSource::Manual("reviewer".into()))
            .unwrap();
        store
            .record(&make_sig("B"), true, DecisionSource::Manual("reviewer".into()))
            .unwrap();
        save_state(&EngineState::snapshot(&store, &builtin_rules()), Some(&path)).unwrap();

        let (restored, rules) = load_state(Some(&path)).unwrap().unwrap().into_store();
        assert_eq!(restored.status(&make_sig("A")), Availability::Unavailable);
        assert_eq!(restored.status(&make_sig("B")), Availability::Available);
        assert_eq!(restored.status(&make_sig("C")), Availability::Unknown);
        assert_ne!(restored.session(), store.session());
        assert_eq!(rules, builtin_rules());

        delete_state(Some(&path)).unwrap();
    }

    #[test]
    fn test_delete_state() {
        let path = temp_path();
        let store = InMemoryAvailabilityStore::new();
        save_state(&EngineState::snapshot(&store, &[]), Some(&path)).unwrap();
        assert!(Path::new(&path).exists());

        delete_state(Some(&path)).unwrap();
        assert!(!Path::new(&path).exists());
    }

    #[test]
    fn test_delete_nonexistent_ok() {
        let result = delete_state(Some("/tmp/propstack_does_not_exist_xyz.json"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_merge_rules_replaces_by_id() {
        let mut extra = builtin_rules()[0].clone();
        extra.active = false;
        let custom = RuleRecord {
            id: "custom".into(),
            description: "same game unders".into(),
            predicate: r#"{"same_game":true,"directions":["under","under"]}"#.into(),
            active: true,
            learn: false,
        };
        let merged = merge_rules(builtin_rules(), vec![extra.clone(), custom]);
        assert_eq!(merged.len(), builtin_rules().len() + 1);
        assert_eq!(merged[0], extra);
        assert_eq!(merged.last().unwrap().id, "custom");
    }

    #[test]
    fn test_load_slate_rejects_garbage() {
        let path = temp_path();
        std::fs::write(&path, "not json").unwrap();
        assert!(load_slate(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
