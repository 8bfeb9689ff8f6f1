//! Parlay reconstruction after validation.
//!
//! Salvages explicitly available legs from rejected parlays, merges them
//! with the availability-filtered pool and reruns construction with the
//! original targets. Output depends only on the store state and the
//! inputs, so reruns are safe.

use std::collections::{BTreeMap, HashSet};
use tracing::info;

use super::builder::{BuildReport, ParlayConstructor};
use crate::types::{Parlay, PropAnalysis};
use crate::validation::{Availability, AvailabilityStore, PropAvailabilityValidator};

pub struct ParlayRebuilder<'a> {
    constructor: &'a ParlayConstructor,
    validator: &'a PropAvailabilityValidator,
}

impl<'a> ParlayRebuilder<'a> {
    pub fn new(
        constructor: &'a ParlayConstructor,
        validator: &'a PropAvailabilityValidator,
    ) -> Self {
        Self { constructor, validator }
    }

    pub fn rebuild(
        &self,
        rejected: &[Parlay],
        full_pool: &[PropAnalysis],
        min_confidence: f64,
        targets: &BTreeMap<usize, usize>,
    ) -> BuildReport {
        let store = self.validator.store();
        let salvaged: Vec<PropAnalysis> = rejected
            .iter()
            .flat_map(|p| p.legs.iter())
            .filter(|leg| store.status(&leg.signature()) == Availability::Available)
            .cloned()
            .collect();

        let mut seen = HashSet::new();
        let merged: Vec<PropAnalysis> = salvaged
            .iter()
            .cloned()
            .chain(self.validator.filter_available(full_pool))
            .filter(|leg| seen.insert(leg.candidate.leg_key()))
            .collect();
        // Second pass covers salvaged legs rejected since they were extracted.
        let pool = self.validator.filter_available(&merged);

        info!(
            rejected = rejected.len(),
            salvaged = salvaged.len(),
            pool = pool.len(),
            "Rebuilding parlays"
        );

        self.constructor.build(&pool, min_confidence, targets)
    }
}
