//! PROPSTACK: multi-signal prop scoring and parlay construction.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod agents;
pub mod engine;
pub mod parlay;
pub mod validation;
pub mod llm;
pub mod storage;
pub mod export;
