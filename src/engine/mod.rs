//! Core engine: scoring → construction → validation → rebuild.
//!
//! `PropEngine` is the request-scoped facade over the agent registry,
//! aggregator, parlay constructor, validator and line-adjustment engine.
//! Agent fan-out runs on the blocking pool, one task per prop; the
//! aggregator is the barrier that waits for a prop's full score set.

pub mod aggregator;
pub mod line_adjust;

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::agents::{AgentRegistry, AnalysisContext};
use crate::config::AppConfig;
use crate::llm::CorrelationOracle;
use crate::parlay::{BuildReport, CorrelationAnalyzer, ParlayConstructor, ParlayRebuilder};
use crate::types::{EngineError, Parlay, PropAnalysis, PropCandidate, PropSignature};
use crate::validation::{
    AvailabilityStore, DecisionSource, PropAvailabilityValidator, RuleRecord, Transition,
    ValidationOutcome,
};
use aggregator::ConfidenceAggregator;
use line_adjust::{AdjustedResult, LineAdjustmentEngine};

/// One slate of input: candidates plus the context agents read from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slate {
    pub candidates: Vec<PropCandidate>,
    #[serde(default)]
    pub context: AnalysisContext,
}

/// Parlays split by validation outcome.
#[derive(Debug, Clone, Default)]
pub struct ValidationBatch {
    pub accepted: Vec<Parlay>,
    pub rejected: Vec<Parlay>,
    pub outcomes: Vec<ValidationOutcome>,
}

pub struct PropEngine {
    registry: Arc<AgentRegistry>,
    aggregator: ConfidenceAggregator,
    constructor: ParlayConstructor,
    validator: PropAvailabilityValidator,
    line_engine: LineAdjustmentEngine,
    min_confidence: f64,
    targets: BTreeMap<usize, usize>,
}

impl PropEngine {
    pub fn new(
        registry: AgentRegistry,
        constructor: ParlayConstructor,
        validator: PropAvailabilityValidator,
        line_engine: LineAdjustmentEngine,
        min_confidence: f64,
        targets: BTreeMap<usize, usize>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            aggregator: ConfidenceAggregator::new(),
            constructor,
            validator,
            line_engine,
            min_confidence,
            targets,
        }
    }

    /// Wire every component from configuration.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn AvailabilityStore>,
        rules: &[RuleRecord],
        oracle: Option<Arc<dyn CorrelationOracle>>,
    ) -> Self {
        let enabled = (!config.agents.enabled.is_empty()).then(|| config.agents.enabled.as_slice());
        let registry = AgentRegistry::with_overrides(&config.agents.weights, enabled);

        let mut correlation = CorrelationAnalyzer::new(config.correlation.analyzer_config());
        if let Some(oracle) = oracle {
            correlation = correlation.with_oracle(oracle);
        }

        Self::new(
            registry,
            ParlayConstructor::new(config.engine.constructor_config(), correlation),
            PropAvailabilityValidator::new(store, rules, config.validation.unknown_policy),
            LineAdjustmentEngine::new(config.line_adjustment.engine_config()),
            config.engine.min_confidence,
            config.engine.target_map(),
        )
    }

    pub fn validator(&self) -> &PropAvailabilityValidator {
        &self.validator
    }

    pub fn constructor(&self) -> &ParlayConstructor {
        &self.constructor
    }

    pub fn store(&self) -> &Arc<dyn AvailabilityStore> {
        self.validator.store()
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    pub fn targets(&self) -> &BTreeMap<usize, usize> {
        &self.targets
    }

    // -- Scoring -------------------------------------------------------------

    /// Score one prop synchronously.
    pub fn analyze_prop(&self, prop: &PropCandidate, context: &AnalysisContext) -> PropAnalysis {
        score_prop(&self.registry, &self.aggregator, prop, context)
    }

    /// Score a batch, one blocking task per prop. Output order matches input.
    pub async fn analyze_props(
        &self,
        props: &[PropCandidate],
        context: Arc<AnalysisContext>,
    ) -> Vec<PropAnalysis> {
        let handles: Vec<_> = props
            .iter()
            .cloned()
            .map(|prop| {
                let registry = Arc::clone(&self.registry);
                let context = Arc::clone(&context);
                let aggregator = self.aggregator.clone();
                tokio::task::spawn_blocking(move || {
                    score_prop(&registry, &aggregator, &prop, &context)
                })
            })
            .collect();

        let results = join_all(handles).await;
        let analyses: Vec<PropAnalysis> = results
            .into_iter()
            .zip(props)
            .map(|(result, prop)| match result {
                Ok(analysis) => analysis,
                Err(e) => {
                    warn!(player = %prop.player, error = %e, "Scoring task failed, scoring inline");
                    self.analyze_prop(prop, &context)
                }
            })
            .collect();

        let low_signal = analyses.iter().filter(|a| a.low_signal).count();
        info!(
            props = analyses.len(),
            low_signal,
            agents = self.registry.len(),
            "Props analyzed"
        );
        analyses
    }

    // -- Construction ----------------------------------------------------------

    /// Build with the configured threshold and targets, after dropping
    /// props the store marks unavailable.
    pub fn build_parlays(&self, analyses: &[PropAnalysis]) -> BuildReport {
        self.build_parlays_with(analyses, self.min_confidence, &self.targets)
    }

    pub fn build_parlays_with(
        &self,
        analyses: &[PropAnalysis],
        min_confidence: f64,
        targets: &BTreeMap<usize, usize>,
    ) -> BuildReport {
        let pool = self.validator.filter_available(analyses);
        self.constructor.build(&pool, min_confidence, targets)
    }

    /// Caller-supplied legs. Returns `None` when any leg is unusable under
    /// the validator's policy, or when the constructor refuses the set.
    pub fn custom_parlay(&self, legs: Vec<PropAnalysis>) -> Option<Parlay> {
        let policy = self.validator.policy();
        if let Some(leg) = legs
            .iter()
            .find(|l| !self.validator.is_usable(&l.signature(), policy))
        {
            warn!(signature = %leg.signature(), "Rejected custom parlay with an unavailable leg");
            return None;
        }
        self.constructor.custom(legs)
    }

    /// Re-score parlays with the correlation oracle, when one is configured.
    pub async fn enrich_parlays(&self, parlays: &[Parlay]) -> Vec<Parlay> {
        if !self.constructor.correlation().has_oracle() {
            return parlays.to_vec();
        }
        join_all(parlays.iter().map(|p| self.constructor.refine(p))).await
    }

    // -- Validation ------------------------------------------------------------

    pub fn validate_parlay(&self, parlay: &Parlay) -> ValidationOutcome {
        self.validator.validate(parlay)
    }

    pub fn validate_all(&self, parlays: &[Parlay]) -> ValidationBatch {
        let mut batch = ValidationBatch::default();
        for parlay in parlays {
            let outcome = self.validator.validate(parlay);
            if outcome.valid {
                batch.accepted.push(parlay.clone());
            } else {
                batch.rejected.push(parlay.clone());
            }
            batch.outcomes.push(outcome);
        }
        info!(
            accepted = batch.accepted.len(),
            rejected = batch.rejected.len(),
            "Validation pass complete"
        );
        batch
    }

    /// Record a reviewer decision from raw text (`player|stat|direction`).
    pub fn record_validation_decision(
        &self,
        signature: &str,
        available: bool,
        source: &str,
    ) -> Result<Transition, EngineError> {
        let signature: PropSignature = signature.parse()?;
        self.validator
            .record_decision(&signature, available, DecisionSource::from_label(source))
    }

    /// Rebuild with the configured threshold and targets.
    pub fn rebuild_parlays(&self, rejected: &[Parlay], full_pool: &[PropAnalysis]) -> BuildReport {
        self.rebuild_parlays_with(rejected, full_pool, self.min_confidence, &self.targets)
    }

    /// Rebuild with the threshold and targets the rejected set was built with.
    pub fn rebuild_parlays_with(
        &self,
        rejected: &[Parlay],
        full_pool: &[PropAnalysis],
        min_confidence: f64,
        targets: &BTreeMap<usize, usize>,
    ) -> BuildReport {
        ParlayRebuilder::new(&self.constructor, &self.validator).rebuild(
            rejected,
            full_pool,
            min_confidence,
            targets,
        )
    }

    // -- Line adjustment -------------------------------------------------------

    pub fn adjust_line(
        &self,
        analysis: &PropAnalysis,
        new_line: Decimal,
    ) -> Result<AdjustedResult, EngineError> {
        self.line_engine.adjust(analysis, new_line)
    }

    pub fn adjust_line_str(
        &self,
        analysis: &PropAnalysis,
        input: &str,
    ) -> Result<AdjustedResult, EngineError> {
        self.line_engine.adjust_str(analysis, input)
    }
}

/// Accepted parlays from a build followed by its rebuild. Rebuilt parlays
/// fill each leg-count bucket only up to its target, skipping ids already
/// accepted.
pub fn merge_accepted(
    first: &[Parlay],
    second: Vec<Parlay>,
    targets: &BTreeMap<usize, usize>,
) -> Vec<Parlay> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    let mut seen = HashSet::new();
    for parlay in first {
        seen.insert(parlay.id);
        *counts.entry(parlay.legs.len()).or_default() += 1;
    }

    let mut merged = first.to_vec();
    for parlay in second {
        let target = targets.get(&parlay.legs.len()).copied().unwrap_or(0);
        let count = counts.entry(parlay.legs.len()).or_default();
        if *count < target && seen.insert(parlay.id) {
            *count += 1;
            merged.push(parlay);
        }
    }
    merged
}

fn score_prop(
    registry: &AgentRegistry,
    aggregator: &ConfidenceAggregator,
    prop: &PropCandidate,
    context: &AnalysisContext,
) -> PropAnalysis {
    let scores = registry.evaluate_all(prop, context);
    aggregator.aggregate(prop, scores, context.projection(prop))
}
