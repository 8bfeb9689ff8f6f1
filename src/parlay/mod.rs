//! Parlay construction, correlation analysis and reconstruction.

pub mod builder;
pub mod correlation;
pub mod rebuilder;
pub mod risk;

pub use builder::{BuildReport, ConstructorConfig, ParlayConstructor, ParlayStyle};
pub use correlation::{CorrelationAnalyzer, CorrelationConfig, CorrelationReport, CorrelationSource};
pub use rebuilder::ParlayRebuilder;
