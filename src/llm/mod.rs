//! External correlation reasoning.
//!
//! Defines the `CorrelationOracle` trait the correlation analyzer can
//! consult for richer leg-relationship reasoning, and an OpenRouter
//! implementation. The heuristic analyzer never depends on an oracle
//! being present.

pub mod openrouter;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::PropAnalysis;

/// What an oracle adds on top of the heuristic result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleAssessment {
    /// Optional refined adjustment (confidence points, signed).
    pub adjustment: Option<f64>,
    /// Explanation lines appended to the parlay's correlation notes.
    pub rationale: Vec<String>,
}

/// Abstraction over external correlation reasoners.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CorrelationOracle: Send + Sync {
    /// Assess how the given legs depend on each other.
    async fn assess(&self, legs: &[PropAnalysis]) -> Result<OracleAssessment>;
}
