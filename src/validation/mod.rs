//! Parlay validation and learned prop availability.

pub mod availability;
pub mod rules;
pub mod validator;

pub use availability::{
    Availability, AvailabilityRecord, AvailabilityStore, DecisionSource, InMemoryAvailabilityStore,
    Transition, ValidationHistoryEntry,
};
pub use rules::{builtin_rules, RulePredicate, RuleRecord, RuleSet, ValidationRule};
pub use validator::{PropAvailabilityValidator, UnknownPolicy, ValidationOutcome};
