//! Learned prop availability.
//!
//! Tri-state record per prop signature. Within one session a rejection is
//! terminal; only an explicit manual acceptance in a later session can
//! revert it. Writers are serialized per signature through the map's
//! entry lock, readers see a snapshot of each record.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::types::{EngineError, PropSignature};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Unknown,
    Available,
    Unavailable,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Unknown => write!(f, "unknown"),
            Availability::Available => write!(f, "available"),
            Availability::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Who set an availability state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DecisionSource {
    /// Explicit accept/reject from a reviewer.
    Manual(String),
    /// A learning validation rule fired.
    AutoRule(String),
}

impl DecisionSource {
    /// Parse a free-form source label. `auto-rule:<id>` is a rule
    /// trigger, anything else is a manual reviewer.
    pub fn from_label(label: &str) -> Self {
        match label.trim().strip_prefix("auto-rule:") {
            Some(rule_id) => DecisionSource::AutoRule(rule_id.to_string()),
            None => DecisionSource::Manual(label.trim().to_string()),
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, DecisionSource::Manual(_))
    }
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionSource::Manual(who) => write!(f, "manual:{who}"),
            DecisionSource::AutoRule(id) => write!(f, "auto-rule:{id}"),
        }
    }
}

/// One row of the availability table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub signature: PropSignature,
    pub status: Availability,
    pub source: DecisionSource,
    pub updated_at: DateTime<Utc>,
    /// Session that last wrote this record.
    pub session: Uuid,
}

/// Outcome of a `record` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied { from: Availability, to: Availability },
    Unchanged(Availability),
}

/// One row of the validation-history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationHistoryEntry {
    pub parlay_id: Uuid,
    pub parlay_signature: String,
    /// Serialized leg candidates.
    pub legs: String,
    pub valid: bool,
    pub violations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Availability store injected into the validator, constructor and
/// rebuilder.
#[cfg_attr(test, mockall::automock)]
pub trait AvailabilityStore: Send + Sync {
    fn status(&self, signature: &PropSignature) -> Availability;

    /// Set a signature's status.
    ///
    /// Refused with `TransitionRefused` when:
    /// - an unavailable record would become available within the same
    ///   session, or through a non-manual source in a later session;
    /// - an automatic rule would overturn a reviewer's manual acceptance.
    ///   Only another manual decision may reject a manually accepted prop.
    fn record(
        &self,
        signature: &PropSignature,
        available: bool,
        source: DecisionSource,
    ) -> Result<Transition, EngineError>;

    /// Snapshot of every known record.
    fn records(&self) -> Vec<AvailabilityRecord>;

    fn append_history(&self, entry: ValidationHistoryEntry);

    fn history(&self) -> Vec<ValidationHistoryEntry>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

pub struct InMemoryAvailabilityStore {
    session: Uuid,
    records: DashMap<PropSignature, AvailabilityRecord>,
    history: Mutex<Vec<ValidationHistoryEntry>>,
}

impl InMemoryAvailabilityStore {
    /// Fresh store with a new session id.
    pub fn new() -> Self {
        Self {
            session: Uuid::new_v4(),
            records: DashMap::new(),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Start a new session over records and history persisted earlier.
    pub fn with_prior(
        records: Vec<AvailabilityRecord>,
        history: Vec<ValidationHistoryEntry>,
    ) -> Self {
        let store = Self::new();
        for record in records {
            store.records.insert(record.signature.clone(), record);
        }
        *store.history.lock().unwrap_or_else(PoisonError::into_inner) = history;
        info!(
            session = %store.session,
            records = store.records.len(),
            "Availability store restored"
        );
        store
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn refused(signature: &PropSignature, from: Availability, to: Availability) -> EngineError {
        EngineError::TransitionRefused {
            signature: signature.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl Default for InMemoryAvailabilityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityStore for InMemoryAvailabilityStore {
    fn status(&self, signature: &PropSignature) -> Availability {
        self.records
            .get(signature)
            .map(|r| r.status)
            .unwrap_or(Availability::Unknown)
    }

    fn record(
        &self,
        signature: &PropSignature,
        available: bool,
        source: DecisionSource,
    ) -> Result<Transition, EngineError> {
        let target = if available {
            Availability::Available
        } else {
            Availability::Unavailable
        };
        let fresh = |source: DecisionSource| AvailabilityRecord {
            signature: signature.clone(),
            status: target,
            source,
            updated_at: Utc::now(),
            session: self.session,
        };

        match self.records.entry(signature.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh(source.clone()));
                debug!(
                    signature = %signature,
                    to = %target,
                    source = %source,
                    "Availability recorded"
                );
                Ok(Transition::Applied { from: Availability::Unknown, to: target })
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get().clone();
                if current.status == target {
                    return Ok(Transition::Unchanged(target));
                }
                if current.status == Availability::Available
                    && current.source.is_manual()
                    && !source.is_manual()
                {
                    warn!(
                        signature = %signature,
                        source = %source,
                        "Refused to overturn a manual acceptance"
                    );
                    return Err(Self::refused(signature, current.status, target));
                }
                if current.status == Availability::Unavailable {
                    // Terminal for this session; a later session may only
                    // revert through an explicit manual acceptance.
                    if current.session == self.session || !source.is_manual() {
                        warn!(
                            signature = %signature,
                            source = %source,
                            "Refused to revert an unavailable prop"
                        );
                        return Err(Self::refused(signature, current.status, target));
                    }
                }
                slot.insert(fresh(source.clone()));
                debug!(
                    signature = %signature,
                    from = %current.status,
                    to = %target,
                    source = %source,
                    "Availability updated"
                );
                Ok(Transition::Applied { from: current.status, to: target })
            }
        }
    }

    fn records(&self) -> Vec<AvailabilityRecord> {
        let mut all: Vec<AvailabilityRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.signature.cmp(&b.signature));
        all
    }

    fn append_history(&self, entry: ValidationHistoryEntry) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    fn history(&self) -> Vec<ValidationHistoryEntry> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
