//! Behavioral contract model: states, guards, transitions, effects.
//!
//! One contract per domain, loaded once at startup and treated as
//! read-only configuration by the state machine engine. Effect types form
//! a closed tagged enum, so a contract declaring a type this runtime does
//! not know is rejected at load time rather than silently accepted.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::LoadError;

/// A per-domain document governing RPC triggers for a resource.
#[derive(Debug, Clone, Deserialize)]
pub struct BehavioralContract {
    /// State name -> optional SLA metadata.
    pub states: BTreeMap<String, Option<StateMeta>>,
    #[serde(rename = "initialState")]
    pub initial_state: String,
    #[serde(default)]
    pub guards: BTreeMap<String, GuardDef>,
    /// Ordered: the first transition matching (trigger, from) wins.
    #[serde(default)]
    pub transitions: Vec<Transition>,
    /// Trigger name -> expected request body shape.
    #[serde(default, rename = "requestBodies")]
    pub request_bodies: BTreeMap<String, Value>,
}

/// Optional per-state metadata (SLA targets, descriptions).
#[derive(Debug, Clone, Deserialize)]
pub struct StateMeta {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "slaHours")]
    pub sla_hours: Option<f64>,
}

/// A named precondition evaluated against a record before a transition.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardDef {
    pub field: String,
    pub operator: GuardOperator,
    /// Literal, or a `$caller.<field>` reference resolved at evaluation time.
    #[serde(default)]
    pub value: Value,
}

/// Guard comparison operator.
///
/// `Other` carries operator names this runtime does not implement; the
/// engine passes them with a logged warning (forward-compatibility), but
/// the pass-through is visible in the type rather than a default branch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum GuardOperator {
    IsNull,
    Equals,
    Other(String),
}

impl From<String> for GuardOperator {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "is_null" => GuardOperator::IsNull,
            "equals" => GuardOperator::Equals,
            _ => GuardOperator::Other(raw),
        }
    }
}

impl fmt::Display for GuardOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardOperator::IsNull => write!(f, "is_null"),
            GuardOperator::Equals => write!(f, "equals"),
            GuardOperator::Other(name) => write!(f, "{}", name),
        }
    }
}

/// One guarded edge of the state machine.
#[derive(Debug, Clone, Deserialize)]
pub struct Transition {
    pub trigger: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub actors: Vec<String>,
    /// Guard names, evaluated in list order with fail-fast semantics.
    #[serde(default)]
    pub guards: Vec<String>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

/// A side-effecting action applied after a transition's guards pass.
///
/// Only `set` is executable today; the other declared types deserialize
/// (so authored contracts load) but the engine rejects them at execution.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Write `resolve(value, context)` into `resource[field]`.
    Set { field: String, value: Value },
    Create {
        resource: String,
        #[serde(default)]
        fields: BTreeMap<String, Value>,
    },
    Lookup {
        resource: String,
        field: String,
        #[serde(default)]
        target: Option<String>,
    },
    #[serde(rename = "evaluate-rules")]
    EvaluateRules {
        #[serde(rename = "ruleSet")]
        rule_set: String,
    },
    Event {
        name: String,
        #[serde(default)]
        payload: Value,
    },
}

impl Effect {
    /// The contract-facing type tag, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Set { .. } => "set",
            Effect::Create { .. } => "create",
            Effect::Lookup { .. } => "lookup",
            Effect::EvaluateRules { .. } => "evaluate-rules",
            Effect::Event { .. } => "event",
        }
    }
}

impl BehavioralContract {
    /// Load a contract from a YAML file.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let contract: BehavioralContract =
            serde_yaml::from_str(&text).map_err(|e| LoadError::Contract {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        contract.check(path)?;
        Ok(contract)
    }

    /// Structural checks deserialization cannot express.
    fn check(&self, path: &Path) -> Result<(), LoadError> {
        if !self.states.contains_key(&self.initial_state) {
            return Err(LoadError::Contract {
                path: path.to_path_buf(),
                message: format!("initialState '{}' is not a declared state", self.initial_state),
            });
        }
        for transition in &self.transitions {
            for state in [&transition.from, &transition.to] {
                if !self.states.contains_key(state) {
                    return Err(LoadError::Contract {
                        path: path.to_path_buf(),
                        message: format!(
                            "transition '{}' references undeclared state '{}'",
                            transition.trigger, state
                        ),
                    });
                }
            }
            for guard in &transition.guards {
                if !self.guards.contains_key(guard) {
                    return Err(LoadError::Contract {
                        path: path.to_path_buf(),
                        message: format!(
                            "transition '{}' references undeclared guard '{}'",
                            transition.trigger, guard
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// States with no outgoing transitions.
    pub fn terminal_states(&self) -> Vec<&str> {
        self.states
            .keys()
            .filter(|state| !self.transitions.iter().any(|t| &t.from == *state))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT_YAML: &str = r#"
states:
  pending:
  in_progress:
    slaHours: 48
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
  - trigger: close
    from: in_progress
    to: closed
    guards: [assignedToCaller]
requestBodies:
  claim:
    type: object
"#;

    #[test]
    fn contract_yaml_round_trip() {
        let contract: BehavioralContract =
            serde_yaml::from_str(CONTRACT_YAML).expect("contract should parse");
        assert_eq!(contract.initial_state, "pending");
        assert_eq!(contract.transitions.len(), 2);
        assert_eq!(contract.guards["assignedToIsNull"].operator, GuardOperator::IsNull);
        assert_eq!(contract.terminal_states(), vec!["closed"]);
        let sla = contract.states["in_progress"]
            .as_ref()
            .and_then(|m| m.sla_hours);
        assert_eq!(sla, Some(48.0));
    }

    #[test]
    fn set_effect_deserializes_with_tag() {
        let contract: BehavioralContract =
            serde_yaml::from_str(CONTRACT_YAML).expect("contract should parse");
        match &contract.transitions[0].effects[0] {
            Effect::Set { field, value } => {
                assert_eq!(field, "assignedToId");
                assert_eq!(value.as_str(), Some("$caller.id"));
            }
            other => panic!("expected set effect, got {}", other.kind()),
        }
    }

    #[test]
    fn undeclared_effect_type_is_a_load_error() {
        let yaml = r#"
states:
  a:
initialState: a
transitions:
  - trigger: go
    from: a
    to: a
    effects:
      - type: teleport
        field: x
"#;
        let result: Result<BehavioralContract, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_guard_operator_is_kept_as_other() {
        let guard: GuardDef = serde_yaml::from_str(
            "field: score\noperator: at_least\nvalue: 10\n",
        )
        .expect("guard should parse");
        assert_eq!(guard.operator, GuardOperator::Other("at_least".to_string()));
    }

    #[test]
    fn check_rejects_undeclared_guard_reference() {
        let yaml = r#"
states:
  a:
  b:
initialState: a
transitions:
  - trigger: go
    from: a
    to: b
    guards: [missing]
"#;
        let contract: BehavioralContract = serde_yaml::from_str(yaml).expect("parse");
        let err = contract.check(Path::new("c.yaml")).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
