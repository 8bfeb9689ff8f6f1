//! Prop availability validator.
//!
//! Checks parlays against the compiled rule set and the learned
//! availability table, records manual decisions, and filters candidate
//! pools before construction. Learning rules write back into the store
//! so the next build avoids the same leg.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::availability::{
    Availability, AvailabilityStore, DecisionSource, Transition, ValidationHistoryEntry,
};
use super::rules::{RuleRecord, RuleSet};
use crate::types::{EngineError, Parlay, PropAnalysis, PropSignature, Violation};

/// Rule id reported for legs that are already known to be unavailable.
pub const UNAVAILABLE_RULE_ID: &str = "unavailable-leg";

/// Rule id reported for a parlay reusing a player.
pub const DUPLICATE_PLAYER_RULE_ID: &str = "duplicate-player";

/// How props with no recorded decision are treated by filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPolicy {
    #[default]
    Include,
    Exclude,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub parlay_id: uuid::Uuid,
    pub valid: bool,
    pub violations: Vec<Violation>,
    /// Signatures a learning rule marked unavailable during this call.
    pub learned: Vec<PropSignature>,
}

pub struct PropAvailabilityValidator {
    store: Arc<dyn AvailabilityStore>,
    rules: RuleSet,
    policy: UnknownPolicy,
}

impl PropAvailabilityValidator {
    pub fn new(
        store: Arc<dyn AvailabilityStore>,
        records: &[RuleRecord],
        policy: UnknownPolicy,
    ) -> Self {
        let rules = RuleSet::from_records(records);
        info!(
            rules = rules.rules().len(),
            skipped = rules.skipped().len(),
            "Validator ready"
        );
        Self { store, rules, policy }
    }

    pub fn store(&self) -> &Arc<dyn AvailabilityStore> {
        &self.store
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn policy(&self) -> UnknownPolicy {
        self.policy
    }

    /// Rule violations only, without touching the store.
    pub fn check_rules(&self, parlay: &Parlay) -> Vec<Violation> {
        let mut violations = Vec::new();
        for rule in self.rules.rules() {
            for i in 0..parlay.legs.len() {
                for j in (i + 1)..parlay.legs.len() {
                    if rule.matches(&parlay.legs[i], &parlay.legs[j]) {
                        violations.push(Violation {
                            rule_id: rule.id.clone(),
                            reason: format!(
                                "{}: {} / {}",
                                rule.description, parlay.legs[i].candidate, parlay.legs[j].candidate
                            ),
                            leg_indices: vec![i, j],
                        });
                    }
                }
            }
        }
        violations
    }

    fn structural_violations(&self, parlay: &Parlay) -> Vec<Violation> {
        let mut violations = Vec::new();

        let mut seen = HashSet::new();
        for (i, leg) in parlay.legs.iter().enumerate() {
            if !seen.insert(leg.player_key()) {
                violations.push(Violation {
                    rule_id: DUPLICATE_PLAYER_RULE_ID.to_string(),
                    reason: format!("player {} appears more than once", leg.candidate.player),
                    leg_indices: vec![i],
                });
            }
        }

        for (i, leg) in parlay.legs.iter().enumerate() {
            if self.store.status(&leg.signature()) == Availability::Unavailable {
                violations.push(Violation {
                    rule_id: UNAVAILABLE_RULE_ID.to_string(),
                    reason: format!("{} is marked unavailable", leg.signature()),
                    leg_indices: vec![i],
                });
            }
        }

        violations
    }

    /// Full validation: rules, duplicate players, and learned
    /// unavailability. Learning rules mark every offending leg except the
    /// highest-confidence one unavailable. The outcome is appended to the
    /// validation history.
    pub fn validate(&self, parlay: &Parlay) -> ValidationOutcome {
        let rule_violations = self.check_rules(parlay);
        let mut learned = Vec::new();

        for violation in &rule_violations {
            let learns = self.rules.get(&violation.rule_id).is_some_and(|r| r.learn);
            if !learns {
                continue;
            }
            for idx in Self::weaker_legs(parlay, &violation.leg_indices) {
                let signature = parlay.legs[idx].signature();
                match self.store.record(
                    &signature,
                    false,
                    DecisionSource::AutoRule(violation.rule_id.clone()),
                ) {
                    Ok(Transition::Applied { .. }) => {
                        info!(
                            signature = %signature,
                            rule_id = %violation.rule_id,
                            "Learned unavailable prop"
                        );
                        learned.push(signature);
                    }
                    Ok(Transition::Unchanged(_)) => {}
                    Err(e) => {
                        warn!(signature = %signature, error = %e, "Could not learn from rule")
                    }
                }
            }
        }

        let mut violations = rule_violations;
        violations.extend(self.structural_violations(parlay));
        let valid = violations.is_empty();

        let candidates: Vec<_> = parlay.legs.iter().map(|l| &l.candidate).collect();
        let legs_json = match serde_json::to_string(&candidates) {
            Ok(json) => json,
            Err(e) => {
                warn!(parlay = %parlay.id, error = %e, "Could not serialise legs for history");
                String::new()
            }
        };
        self.store.append_history(ValidationHistoryEntry {
            parlay_id: parlay.id,
            parlay_signature: parlay.signature(),
            legs: legs_json,
            valid,
            violations: violations.iter().map(|v| v.to_string()).collect(),
            timestamp: Utc::now(),
        });

        debug!(parlay = %parlay.id, valid, violations = violations.len(), "Parlay validated");

        ValidationOutcome {
            parlay_id: parlay.id,
            valid,
            violations,
            learned,
        }
    }

    /// Offending legs other than the strongest one. Ties keep the earlier leg.
    fn weaker_legs(parlay: &Parlay, indices: &[usize]) -> Vec<usize> {
        let keep = indices.iter().copied().fold(None, |best: Option<usize>, idx| match best {
            Some(b) if parlay.legs[b].confidence >= parlay.legs[idx].confidence => Some(b),
            _ => Some(idx),
        });
        indices.iter().copied().filter(|&i| Some(i) != keep).collect()
    }

    /// Record an explicit reviewer decision.
    pub fn record_decision(
        &self,
        signature: &PropSignature,
        available: bool,
        source: DecisionSource,
    ) -> Result<Transition, EngineError> {
        self.store.record(signature, available, source)
    }

    pub fn is_usable(&self, signature: &PropSignature, policy: UnknownPolicy) -> bool {
        match self.store.status(signature) {
            Availability::Available => true,
            Availability::Unavailable => false,
            Availability::Unknown => policy == UnknownPolicy::Include,
        }
    }

    /// Drop props that are not usable under the configured policy.
    pub fn filter_available(&self, props: &[PropAnalysis]) -> Vec<PropAnalysis> {
        self.filter_available_with(props, self.policy)
    }

    pub fn filter_available_with(
        &self,
        props: &[PropAnalysis],
        policy: UnknownPolicy,
    ) -> Vec<PropAnalysis> {
        let kept: Vec<PropAnalysis> = props
            .iter()
            .filter(|p| self.is_usable(&p.signature(), policy))
            .cloned()
            .collect();
        if kept.len() < props.len() {
            debug!(
                dropped = props.len() - kept.len(),
                kept = kept.len(),
                "Filtered unavailable props"
            );
        }
        kept
    }
}
