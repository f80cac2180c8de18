//! `$ref` / `allOf` schema resolution.
//!
//! Given a schema node possibly containing `$ref` or `allOf`, produces an
//! equivalent node with no unresolved references:
//!
//! - `#/...` resolves against the current document
//! - `./file.yaml#/fragment` loads the referenced YAML file and resolves
//!   with that file as the new context (nested refs follow the same rule)
//! - `allOf` members are resolved then merged: `properties` key-wise with
//!   later members overriding, `required` unioned and deduped,
//!   `type`/`description` last-non-empty
//!
//! Cycles are tracked with an explicit stack keyed by (file, fragment), so
//! a ref chain that revisits a pair is reported instead of truncated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::ResolveError;

/// What to do when a reference target does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Fail the load with a [`ResolveError::MissingTarget`]. The default.
    Strict,
    /// Substitute `null` and emit a warning. Development convenience only.
    Lenient,
}

/// Stateful resolver: caches cross-file documents and tracks the in-flight
/// reference stack for cycle detection.
pub struct Resolver {
    policy: ResolutionPolicy,
    documents: HashMap<PathBuf, Value>,
    in_flight: Vec<(String, String)>,
}

impl Resolver {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Resolver {
            policy,
            documents: HashMap::new(),
            in_flight: Vec::new(),
        }
    }

    /// Resolve every reference in `doc`, treating `doc` itself as the
    /// resolution context. `file` labels errors and anchors `./` refs.
    pub fn resolve_document(&mut self, doc: &Value, file: &Path) -> Result<Value, ResolveError> {
        self.resolve_node(doc, doc, file)
    }

    /// Resolve a single schema node against an explicit document context.
    pub fn resolve_schema(
        &mut self,
        node: &Value,
        doc: &Value,
        file: &Path,
    ) -> Result<Value, ResolveError> {
        self.resolve_node(node, doc, file)
    }

    fn resolve_node(&mut self, node: &Value, doc: &Value, file: &Path) -> Result<Value, ResolveError> {
        match node {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.resolve_ref(reference, doc, file);
                }
                if let Some(Value::Array(members)) = map.get("allOf") {
                    let mut resolved = Vec::with_capacity(members.len());
                    for member in members {
                        resolved.push(self.resolve_node(member, doc, file)?);
                    }
                    let mut merged = merge_all_of(&resolved);
                    // Sibling keys of the allOf node apply on top of the merge.
                    if let Value::Object(out) = &mut merged {
                        for (key, value) in map {
                            if key != "allOf" {
                                out.insert(key.clone(), self.resolve_node(value, doc, file)?);
                            }
                        }
                    }
                    return Ok(merged);
                }
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), self.resolve_node(value, doc, file)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_node(item, doc, file)?);
                }
                Ok(Value::Array(out))
            }
            scalar => Ok(scalar.clone()),
        }
    }

    fn resolve_ref(
        &mut self,
        reference: &str,
        doc: &Value,
        file: &Path,
    ) -> Result<Value, ResolveError> {
        let key = (file.display().to_string(), reference.to_string());
        if self.in_flight.contains(&key) {
            return Err(ResolveError::CircularReference {
                file: key.0,
                fragment: key.1,
            });
        }
        self.in_flight.push(key);
        let result = self.resolve_ref_inner(reference, doc, file);
        self.in_flight.pop();
        result
    }

    fn resolve_ref_inner(
        &mut self,
        reference: &str,
        doc: &Value,
        file: &Path,
    ) -> Result<Value, ResolveError> {
        if let Some(fragment) = reference.strip_prefix('#') {
            return match pointer_lookup(doc, fragment) {
                Some(target) => {
                    let target = target.clone();
                    self.resolve_node(&target, doc, file)
                }
                None => self.missing(reference, file),
            };
        }

        if reference.starts_with("./") || reference.starts_with("../") {
            let (rel, fragment) = match reference.split_once('#') {
                Some((rel, frag)) => (rel, Some(frag)),
                None => (reference, None),
            };
            let path = file.parent().unwrap_or_else(|| Path::new(".")).join(rel);
            // A referenced file that cannot be loaded falls under the
            // same policy as a missing fragment.
            let nested = match self.load_document(&path) {
                Ok(doc) => doc,
                Err(e) => {
                    return match self.policy {
                        ResolutionPolicy::Strict => Err(e),
                        ResolutionPolicy::Lenient => {
                            tracing::warn!(
                                reference,
                                file = %file.display(),
                                error = %e,
                                "unresolvable reference replaced with null (lenient mode)"
                            );
                            Ok(Value::Null)
                        }
                    }
                }
            };
            let target = match fragment {
                Some(frag) => match pointer_lookup(&nested, frag) {
                    Some(t) => t.clone(),
                    None => return self.missing(reference, file),
                },
                None => nested.clone(),
            };
            return self.resolve_node(&target, &nested, &path);
        }

        // Neither a fragment nor a relative file: not a form we resolve.
        self.missing(reference, file)
    }

    fn load_document(&mut self, path: &Path) -> Result<Value, ResolveError> {
        if let Some(doc) = self.documents.get(path) {
            return Ok(doc.clone());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Value = serde_yaml::from_str(&text).map_err(|source| ResolveError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        self.documents.insert(path.to_path_buf(), doc.clone());
        Ok(doc)
    }

    fn missing(&self, reference: &str, file: &Path) -> Result<Value, ResolveError> {
        match self.policy {
            ResolutionPolicy::Strict => Err(ResolveError::MissingTarget {
                file: file.display().to_string(),
                reference: reference.to_string(),
            }),
            ResolutionPolicy::Lenient => {
                tracing::warn!(
                    reference,
                    file = %file.display(),
                    "unresolvable reference replaced with null (lenient mode)"
                );
                Ok(Value::Null)
            }
        }
    }
}

/// Walk a `/`-separated fragment (`/components/schemas/Foo`) into a document.
fn pointer_lookup<'a>(doc: &'a Value, fragment: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in fragment.split('/').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Merge resolved `allOf` members into one object schema.
fn merge_all_of(members: &[Value]) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();
    let mut type_name: Option<Value> = None;
    let mut description: Option<Value> = None;
    let mut rest = Map::new();

    for member in members {
        let Value::Object(map) = member else { continue };
        for (key, value) in map {
            match key.as_str() {
                "properties" => {
                    if let Value::Object(props) = value {
                        for (name, schema) in props {
                            // Later members override colliding keys.
                            properties.insert(name.clone(), schema.clone());
                        }
                    }
                }
                "required" => {
                    if let Value::Array(names) = value {
                        for name in names {
                            if !required.contains(name) {
                                required.push(name.clone());
                            }
                        }
                    }
                }
                "type" => {
                    if !matches!(value, Value::Null) {
                        type_name = Some(value.clone());
                    }
                }
                "description" => {
                    if matches!(value, Value::String(s) if !s.is_empty()) {
                        description = Some(value.clone());
                    }
                }
                _ => {
                    rest.insert(key.clone(), value.clone());
                }
            }
        }
    }

    let mut out = Map::new();
    if let Some(ty) = type_name {
        out.insert("type".to_string(), ty);
    }
    if let Some(desc) = description {
        out.insert("description".to_string(), desc);
    }
    if !properties.is_empty() {
        out.insert("properties".to_string(), Value::Object(properties));
    }
    if !required.is_empty() {
        out.insert("required".to_string(), Value::Array(required));
    }
    for (key, value) in rest {
        out.insert(key, value);
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(doc: Value) -> Value {
        let mut resolver = Resolver::new(ResolutionPolicy::Strict);
        resolver
            .resolve_document(&doc, Path::new("spec.yaml"))
            .expect("resolution failed")
    }

    #[test]
    fn same_document_ref_is_inlined() {
        let doc = json!({
            "paths": { "schema": { "$ref": "#/components/schemas/Claim" } },
            "components": { "schemas": { "Claim": { "type": "object" } } }
        });
        let resolved = resolve(doc);
        assert_eq!(resolved["paths"]["schema"], json!({"type": "object"}));
    }

    #[test]
    fn chained_refs_terminate_in_literal_schema() {
        let doc = json!({
            "root": { "$ref": "#/a" },
            "a": { "$ref": "#/b" },
            "b": { "type": "string" }
        });
        assert_eq!(resolve(doc)["root"], json!({"type": "string"}));
    }

    #[test]
    fn all_of_unions_disjoint_properties() {
        let doc = json!({
            "schema": {
                "allOf": [
                    { "type": "object", "properties": { "a": { "type": "string" } }, "required": ["a"] },
                    { "properties": { "b": { "type": "integer" } }, "required": ["b", "a"] }
                ]
            }
        });
        let resolved = resolve(doc);
        let schema = &resolved["schema"];
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["a"].is_object());
        assert!(schema["properties"]["b"].is_object());
        assert_eq!(schema["required"], json!(["a", "b"]));
    }

    #[test]
    fn all_of_later_member_overrides_colliding_property() {
        let doc = json!({
            "schema": {
                "allOf": [
                    { "properties": { "a": { "type": "string" } } },
                    { "properties": { "a": { "type": "integer" } } }
                ]
            }
        });
        let resolved = resolve(doc);
        assert_eq!(resolved["schema"]["properties"]["a"]["type"], "integer");
    }

    #[test]
    fn missing_target_fails_strict() {
        let doc = json!({ "schema": { "$ref": "#/nope" } });
        let mut resolver = Resolver::new(ResolutionPolicy::Strict);
        let err = resolver
            .resolve_document(&doc, Path::new("spec.yaml"))
            .unwrap_err();
        match err {
            ResolveError::MissingTarget { reference, .. } => assert_eq!(reference, "#/nope"),
            other => panic!("expected MissingTarget, got {other:?}"),
        }
    }

    #[test]
    fn missing_target_is_null_in_lenient_mode() {
        let doc = json!({ "schema": { "$ref": "#/nope" } });
        let mut resolver = Resolver::new(ResolutionPolicy::Lenient);
        let resolved = resolver
            .resolve_document(&doc, Path::new("spec.yaml"))
            .expect("lenient mode must not fail");
        assert_eq!(resolved["schema"], Value::Null);
    }

    #[test]
    fn cycle_is_reported_not_truncated() {
        let doc = json!({
            "a": { "$ref": "#/b" },
            "b": { "$ref": "#/a" }
        });
        let mut resolver = Resolver::new(ResolutionPolicy::Strict);
        let err = resolver
            .resolve_document(&doc, Path::new("spec.yaml"))
            .unwrap_err();
        assert!(matches!(err, ResolveError::CircularReference { .. }));
    }

    #[test]
    fn cross_file_ref_with_fragment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shared = dir.path().join("shared.yaml");
        std::fs::write(
            &shared,
            "components:\n  schemas:\n    Money:\n      type: number\n",
        )
        .expect("write shared.yaml");

        let doc = json!({
            "schema": { "$ref": "./shared.yaml#/components/schemas/Money" }
        });
        let mut resolver = Resolver::new(ResolutionPolicy::Strict);
        let resolved = resolver
            .resolve_document(&doc, &dir.path().join("spec.yaml"))
            .expect("cross-file resolution failed");
        assert_eq!(resolved["schema"], json!({"type": "number"}));
    }

    #[test]
    fn cross_file_nested_ref_uses_nested_file_as_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("shared.yaml"),
            concat!(
                "components:\n",
                "  schemas:\n",
                "    Outer:\n",
                "      type: object\n",
                "      properties:\n",
                "        inner:\n",
                "          $ref: '#/components/schemas/Inner'\n",
                "    Inner:\n",
                "      type: boolean\n",
            ),
        )
        .expect("write shared.yaml");

        let doc = json!({
            "schema": { "$ref": "./shared.yaml#/components/schemas/Outer" }
        });
        let mut resolver = Resolver::new(ResolutionPolicy::Strict);
        let resolved = resolver
            .resolve_document(&doc, &dir.path().join("spec.yaml"))
            .expect("nested cross-file resolution failed");
        assert_eq!(
            resolved["schema"]["properties"]["inner"],
            json!({"type": "boolean"})
        );
    }

    #[test]
    fn missing_file_names_broken_path() {
        let doc = json!({ "schema": { "$ref": "./absent.yaml#/x" } });
        let mut resolver = Resolver::new(ResolutionPolicy::Strict);
        let err = resolver
            .resolve_document(&doc, Path::new("/nonexistent/spec.yaml"))
            .unwrap_err();
        assert!(matches!(err, ResolveError::Io { .. }));
    }

    #[test]
    fn missing_file_is_null_in_lenient_mode() {
        let doc = json!({ "schema": { "$ref": "./absent.yaml#/x" } });
        let mut resolver = Resolver::new(ResolutionPolicy::Lenient);
        let resolved = resolver
            .resolve_document(&doc, Path::new("/nonexistent/spec.yaml"))
            .expect("lenient mode must not fail on a missing file");
        assert_eq!(resolved["schema"], Value::Null);
    }
}
