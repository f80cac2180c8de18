//! Transition resolution, guard evaluation, and effect application.

use gantry_core::contract::{BehavioralContract, Effect, GuardOperator, Transition};
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::STATUS_FIELD;

/// The invoking context a trigger call runs under. `$caller.<field>`
/// references in guard values and effects resolve against it.
#[derive(Debug, Clone, Default)]
pub struct TriggerContext {
    pub caller: Value,
}

impl TriggerContext {
    pub fn new(caller: Value) -> Self {
        TriggerContext { caller }
    }

    /// Resolve a contract value: `$caller.<field>` indirection against
    /// the caller, anything else as a literal. A missing caller field
    /// resolves to null.
    pub fn resolve(&self, value: &Value) -> Value {
        if let Some(path) = value.as_str().and_then(|s| s.strip_prefix("$caller.")) {
            return get_path(&self.caller, path).cloned().unwrap_or(Value::Null);
        }
        value.clone()
    }
}

/// The successful result of a trigger call, not yet persisted.
#[derive(Debug, Clone)]
pub struct TriggerOutcome {
    /// The record with effects applied and `status` advanced.
    pub record: Value,
    pub from: String,
    pub to: String,
}

/// Scan the contract's transitions for `(trigger, from == status)`.
///
/// An unknown trigger and a known trigger fired from the wrong state are
/// distinct errors, so clients can tell a typo from an invalid-state call.
pub fn find_transition<'a>(
    contract: &'a BehavioralContract,
    trigger: &str,
    status: &str,
) -> Result<&'a Transition, EngineError> {
    let mut trigger_exists = false;
    for transition in &contract.transitions {
        if transition.trigger == trigger {
            trigger_exists = true;
            if transition.from == status {
                return Ok(transition);
            }
        }
    }
    if trigger_exists {
        Err(EngineError::WrongState {
            trigger: trigger.to_string(),
            status: status.to_string(),
        })
    } else {
        Err(EngineError::UnknownTrigger {
            trigger: trigger.to_string(),
        })
    }
}

/// Evaluate named guards in list order, stopping at the first failure.
pub fn evaluate_guards(
    names: &[String],
    contract: &BehavioralContract,
    record: &Value,
    ctx: &TriggerContext,
) -> Result<(), EngineError> {
    for name in names {
        let guard = contract
            .guards
            .get(name)
            .ok_or_else(|| EngineError::UndefinedGuard {
                guard: name.clone(),
            })?;
        let actual = get_path(record, &guard.field);
        match &guard.operator {
            GuardOperator::IsNull => {
                let is_null = actual.is_none_or(Value::is_null);
                if !is_null {
                    return Err(EngineError::GuardFailed {
                        guard: name.clone(),
                        reason: format!("field '{}' is already set", guard.field),
                    });
                }
            }
            GuardOperator::Equals => {
                let expected = ctx.resolve(&guard.value);
                let actual = actual.cloned().unwrap_or(Value::Null);
                if actual != expected {
                    return Err(EngineError::GuardFailed {
                        guard: name.clone(),
                        reason: format!(
                            "field '{}' is {}, expected {}",
                            guard.field, actual, expected
                        ),
                    });
                }
            }
            // Forward-compatibility: an operator this engine does not
            // implement passes, loudly.
            GuardOperator::Other(op) => {
                tracing::warn!(
                    guard = %name,
                    operator = %op,
                    "unrecognized guard operator passed without evaluation"
                );
            }
        }
    }
    Ok(())
}

/// Apply a transition's effects to the record in place.
///
/// Only `set` is executable; the other declared types are rejected so a
/// contract relying on them fails visibly instead of half-running.
pub fn apply_effects(
    effects: &[Effect],
    record: &mut Value,
    ctx: &TriggerContext,
) -> Result<(), EngineError> {
    for effect in effects {
        match effect {
            Effect::Set { field, value } => {
                set_path(record, field, ctx.resolve(value));
            }
            other => {
                return Err(EngineError::UnsupportedEffect {
                    kind: other.kind().to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Run a full trigger call: resolve the transition, evaluate guards,
/// apply effects, advance `status`. Pure over the record; the caller
/// persists the outcome.
pub fn fire(
    contract: &BehavioralContract,
    trigger: &str,
    record: Value,
    ctx: &TriggerContext,
) -> Result<TriggerOutcome, EngineError> {
    let status = record
        .get(STATUS_FIELD)
        .and_then(Value::as_str)
        .unwrap_or(&contract.initial_state)
        .to_string();

    let transition = find_transition(contract, trigger, &status)?;
    evaluate_guards(&transition.guards, contract, &record, ctx)?;

    let mut record = record;
    apply_effects(&transition.effects, &mut record, ctx)?;
    set_path(
        &mut record,
        STATUS_FIELD,
        Value::String(transition.to.clone()),
    );

    Ok(TriggerOutcome {
        record,
        from: transition.from.clone(),
        to: transition.to.clone(),
    })
}

/// Dot-path read into nested objects.
fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Dot-path write, creating intermediate objects as needed.
fn set_path(value: &mut Value, path: &str, new_value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = value;
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else { return };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), new_value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONTRACT_YAML: &str = r#"
states:
  pending:
  in_progress:
  closed:
initialState: pending
guards:
  assignedToIsNull:
    field: assignedToId
    operator: is_null
  assignedToCaller:
    field: assignedToId
    operator: equals
    value: $caller.id
  looksFine:
    field: riskScore
    operator: within_tolerance
    value: 10
transitions:
  - trigger: claim
    from: pending
    to: in_progress
    actors: [agent]
    guards: [assignedToIsNull]
    effects:
      - type: set
        field: assignedToId
        value: $caller.id
      - type: set
        field: audit.lastTrigger
        value: claim
  - trigger: release
    from: in_progress
    to: pending
    guards: [assignedToCaller]
    effects:
      - type: set
        field: assignedToId
        value: null
  - trigger: close
    from: in_progress
    to: closed
    guards: [looksFine]
"#;

    fn contract() -> BehavioralContract {
        serde_yaml::from_str(CONTRACT_YAML).expect("contract should parse")
    }

    fn agent() -> TriggerContext {
        TriggerContext::new(json!({"id": "agent-7"}))
    }

    #[test]
    fn claim_from_pending_assigns_and_advances() {
        let record = json!({"id": "c1", "status": "pending"});
        let outcome = fire(&contract(), "claim", record, &agent()).expect("claim should succeed");
        assert_eq!(outcome.from, "pending");
        assert_eq!(outcome.to, "in_progress");
        assert_eq!(outcome.record["status"], "in_progress");
        assert_eq!(outcome.record["assignedToId"], "agent-7");
        // Dot-path effect created the nested object.
        assert_eq!(outcome.record["audit"]["lastTrigger"], "claim");
    }

    #[test]
    fn claim_on_assigned_record_fails_first_guard() {
        let record = json!({"id": "c1", "status": "pending", "assignedToId": "agent-2"});
        let err = fire(&contract(), "claim", record, &agent()).unwrap_err();
        match err {
            EngineError::GuardFailed { guard, reason } => {
                assert_eq!(guard, "assignedToIsNull");
                assert!(reason.contains("assignedToId"));
            }
            other => panic!("expected GuardFailed, got {other:?}"),
        }
    }

    #[test]
    fn unknown_trigger_and_wrong_state_are_distinct() {
        let record = json!({"id": "c1", "status": "pending"});
        let err = fire(&contract(), "vaporize", record.clone(), &agent()).unwrap_err();
        assert_eq!(err.to_string(), "Unknown trigger: vaporize");

        let err = fire(&contract(), "close", record, &agent()).unwrap_err();
        assert_eq!(err.to_string(), "Cannot close: currently pending");
    }

    #[test]
    fn equals_guard_resolves_caller_indirection() {
        let record = json!({"id": "c1", "status": "in_progress", "assignedToId": "agent-7"});
        let outcome =
            fire(&contract(), "release", record, &agent()).expect("release should succeed");
        assert_eq!(outcome.record["status"], "pending");
        assert!(outcome.record["assignedToId"].is_null());

        let record = json!({"id": "c1", "status": "in_progress", "assignedToId": "agent-2"});
        let err = fire(&contract(), "release", record, &agent()).unwrap_err();
        assert!(matches!(err, EngineError::GuardFailed { guard, .. } if guard == "assignedToCaller"));
    }

    #[test]
    fn unrecognized_guard_operator_passes() {
        let record = json!({"id": "c1", "status": "in_progress", "riskScore": 99});
        let outcome = fire(&contract(), "close", record, &agent())
            .expect("unknown operator must pass, not block");
        assert_eq!(outcome.record["status"], "closed");
    }

    #[test]
    fn missing_status_falls_back_to_initial_state() {
        let record = json!({"id": "c1"});
        let outcome = fire(&contract(), "claim", record, &agent()).expect("claim from initial");
        assert_eq!(outcome.from, "pending");
    }

    #[test]
    fn is_null_treats_null_and_absent_alike() {
        let contract = contract();
        let ctx = agent();
        let names = vec!["assignedToIsNull".to_string()];
        assert!(evaluate_guards(&names, &contract, &json!({}), &ctx).is_ok());
        assert!(
            evaluate_guards(&names, &contract, &json!({"assignedToId": null}), &ctx).is_ok()
        );
    }

    #[test]
    fn unimplemented_effect_types_are_rejected() {
        let mut record = json!({"id": "c1"});
        let effect: Effect = serde_yaml::from_str(
            "type: event\nname: claim_closed\n",
        )
        .expect("effect should parse");
        let err = apply_effects(&[effect], &mut record, &agent()).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedEffect { kind } if kind == "event"));
    }
}
