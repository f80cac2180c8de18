//! Request/response body validation against a resolved schema.
//!
//! Wraps a compiled `jsonschema` validator and renders field-level error
//! detail: each error names the offending field path and a human-readable
//! reason. Validation runs before the store is touched; a failure never
//! mutates state.

use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use serde::Serialize;
use serde_json::Value;

use crate::error::LoadError;

/// One field-level validation failure.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    /// Instance path of the offending field, `$`-rooted.
    pub path: String,
    pub reason: String,
}

/// A schema compiled once at startup, reused per request.
pub struct SchemaValidator {
    validator: Validator,
}

impl SchemaValidator {
    pub fn compile(resource: &str, schema: &Value) -> Result<Self, LoadError> {
        let validator = jsonschema::validator_for(schema).map_err(|e| LoadError::SchemaCompile {
            resource: resource.to_string(),
            message: e.to_string(),
        })?;
        Ok(SchemaValidator { validator })
    }

    /// Validate a body, collecting every failure rather than stopping at
    /// the first.
    pub fn validate(&self, body: &Value) -> Result<(), Vec<FieldError>> {
        let errors: Vec<FieldError> = self
            .validator
            .iter_errors(body)
            .map(|error| {
                let raw_path = error.instance_path().to_string();
                let path = if raw_path.is_empty() {
                    "$".to_string()
                } else {
                    format!("${}", raw_path)
                };
                let reason = match error.kind() {
                    ValidationErrorKind::Required { .. } => {
                        format!("required property missing: {}", error)
                    }
                    ValidationErrorKind::Type { .. } => format!("type mismatch: {}", error),
                    ValidationErrorKind::AdditionalProperties { .. }
                    | ValidationErrorKind::UnevaluatedProperties { .. } => {
                        format!("additional property not allowed: {}", error)
                    }
                    ValidationErrorKind::Pattern { .. } => format!("pattern mismatch: {}", error),
                    _ => error.to_string(),
                };
                FieldError { path, reason }
            })
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claim_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "claimantName": { "type": "string", "pattern": "^[A-Za-z ]+$" },
                "income": { "type": "number" }
            },
            "required": ["claimantName"],
            "additionalProperties": false
        })
    }

    #[test]
    fn valid_body_passes() {
        let v = SchemaValidator::compile("claims", &claim_schema()).expect("compile");
        assert!(v.validate(&json!({"claimantName": "Ada", "income": 10.0})).is_ok());
    }

    #[test]
    fn missing_required_field_is_reported() {
        let v = SchemaValidator::compile("claims", &claim_schema()).expect("compile");
        let errors = v.validate(&json!({"income": 10.0})).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "$");
        assert!(errors[0].reason.starts_with("required property missing"));
    }

    #[test]
    fn type_mismatch_names_field_path() {
        let v = SchemaValidator::compile("claims", &claim_schema()).expect("compile");
        let errors = v
            .validate(&json!({"claimantName": "Ada", "income": "a lot"}))
            .unwrap_err();
        assert_eq!(errors[0].path, "$/income");
        assert!(errors[0].reason.starts_with("type mismatch"));
    }

    #[test]
    fn additional_property_is_reported() {
        let v = SchemaValidator::compile("claims", &claim_schema()).expect("compile");
        let errors = v
            .validate(&json!({"claimantName": "Ada", "rogue": true}))
            .unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.reason.starts_with("additional property not allowed")));
    }

    #[test]
    fn multiple_failures_collected() {
        let v = SchemaValidator::compile("claims", &claim_schema()).expect("compile");
        let errors = v.validate(&json!({"income": "x", "rogue": 1})).unwrap_err();
        assert!(errors.len() >= 2);
    }
}
