//! gantry-engine: the behavioral-contract state machine.
//!
//! Given a contract, a trigger name, and a record's current state, the
//! engine resolves the transition, evaluates its guards in list order
//! with fail-fast semantics, applies its effects, and advances the
//! record's `status`. The engine is pure over the record: persistence
//! belongs to the caller, which serializes the read-evaluate-persist
//! cycle behind the store's connection lock.

mod error;
mod machine;

pub use error::EngineError;
pub use machine::{
    apply_effects, evaluate_guards, find_transition, fire, TriggerContext, TriggerOutcome,
};

/// The record field holding the current state.
pub const STATUS_FIELD: &str = "status";
