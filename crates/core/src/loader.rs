//! Specification discovery and loading.
//!
//! `discover` walks a directory for top-level spec files; `load`
//! dereferences the document through the resolver and builds the
//! per-resource metadata the route generator consumes. A resolution
//! failure aborts the load: specs fail fast at startup, never at
//! request time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

use crate::contract::BehavioralContract;
use crate::error::LoadError;
use crate::resolver::{ResolutionPolicy, Resolver};
use crate::spec::{Endpoint, PaginationDefaults, ResourceSpecification};

/// Subtrees never scanned for spec files: generated output and the
/// per-resource behavioral contracts (loaded separately).
const EXCLUDED_DIRS: &[&str] = &["resolved", "generated", "contracts"];

/// A discovered raw spec file, not yet loaded.
#[derive(Debug, Clone)]
pub struct RawSpecRef {
    pub path: PathBuf,
}

/// Walk `dir` for top-level spec files (`*.yaml` / `*.yml`), excluding
/// generated/resolved subtrees. Results are sorted for determinism.
pub fn discover(dir: &Path) -> Result<Vec<RawSpecRef>, LoadError> {
    let mut refs = Vec::new();
    let walker = WalkDir::new(dir).into_iter().filter_entry(|entry| {
        if entry.file_type().is_dir() {
            let name = entry.file_name().to_string_lossy();
            return !EXCLUDED_DIRS.contains(&name.as_ref());
        }
        true
    });
    for entry in walker {
        let entry = entry.map_err(|source| LoadError::Discover {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        // Shared component files are only pulled in via `$ref`.
        let is_shared = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.starts_with('_') || s == "shared")
            .unwrap_or(false);
        if is_yaml && !is_shared {
            refs.push(RawSpecRef {
                path: path.to_path_buf(),
            });
        }
    }
    refs.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(refs)
}

/// Load one spec file into a [`ResourceSpecification`].
pub fn load(raw: &RawSpecRef, policy: ResolutionPolicy) -> Result<ResourceSpecification, LoadError> {
    let text = std::fs::read_to_string(&raw.path).map_err(|source| LoadError::Io {
        path: raw.path.clone(),
        source,
    })?;
    let doc: Value = serde_yaml::from_str(&text).map_err(|source| LoadError::Yaml {
        path: raw.path.clone(),
        source,
    })?;

    let mut resolver = Resolver::new(policy);
    let doc = resolver
        .resolve_document(&doc, &raw.path)
        .map_err(|source| LoadError::Resolve {
            path: raw.path.clone(),
            source,
        })?;

    let base_resource_path = base_path(&doc, &raw.path)?;
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| base_resource_path.trim_start_matches('/').to_string());
    let title = string_at(&doc, &["info", "title"])
        .or_else(|| string_at(&doc, &["title"]))
        .unwrap_or_else(|| name.clone());
    let version = string_at(&doc, &["info", "version"])
        .or_else(|| string_at(&doc, &["version"]))
        .unwrap_or_else(|| "0.0.0".to_string());

    let endpoints = build_endpoints(&doc, &base_resource_path);
    let schemas = schema_map(&doc);
    let pagination = pagination_defaults(&doc);

    Ok(ResourceSpecification {
        name,
        title,
        version,
        base_resource_path,
        endpoints,
        schemas,
        pagination,
        contract: None,
    })
}

/// Discover and load every spec under `dir`, attaching the behavioral
/// contract from `dir/contracts/<name>.contract.yaml` when present.
pub fn load_dir(
    dir: &Path,
    policy: ResolutionPolicy,
) -> Result<Vec<ResourceSpecification>, LoadError> {
    let mut specs = Vec::new();
    for raw in discover(dir)? {
        let mut spec = load(&raw, policy)?;
        let contract_path = dir
            .join("contracts")
            .join(format!("{}.contract.yaml", spec.name));
        if contract_path.is_file() {
            spec.contract = Some(BehavioralContract::from_path(&contract_path)?);
            tracing::info!(resource = %spec.name, "loaded behavioral contract");
        }
        specs.push(spec);
    }
    Ok(specs)
}

/// Base resource path: explicit `baseResourcePath`, or the shortest path key.
fn base_path(doc: &Value, file: &Path) -> Result<String, LoadError> {
    if let Some(base) = doc.get("baseResourcePath").and_then(Value::as_str) {
        return Ok(base.to_string());
    }
    let paths = doc
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| LoadError::MissingField {
            path: file.to_path_buf(),
            field: "paths".to_string(),
        })?;
    paths
        .keys()
        .min_by_key(|p| p.len())
        .cloned()
        .ok_or_else(|| LoadError::MissingField {
            path: file.to_path_buf(),
            field: "paths".to_string(),
        })
}

fn build_endpoints(doc: &Value, base: &str) -> Vec<Endpoint> {
    let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut endpoints = Vec::new();
    for (path, item) in paths {
        // More than one extra segment past the base is reserved for
        // specialized/behavioral sub-resources.
        if extra_segments(path, base) > 1 {
            continue;
        }
        let Some(operations) = item.as_object() else { continue };
        for (method, op) in operations {
            let method = method.to_ascii_uppercase();
            if !matches!(method.as_str(), "GET" | "POST" | "PUT" | "PATCH" | "DELETE") {
                continue;
            }
            endpoints.push(Endpoint {
                path: path.clone(),
                method,
                operation_id: op
                    .get("operationId")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                parameters: op
                    .get("parameters")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                request_schema: body_schema(op.get("requestBody")),
                response_schema: success_response_schema(op.get("responses")),
                error_schemas: error_response_schemas(op.get("responses")),
            });
        }
    }
    endpoints
}

/// Segments in `path` beyond the base resource path.
fn extra_segments(path: &str, base: &str) -> usize {
    let rest = path.strip_prefix(base).unwrap_or(path);
    rest.split('/').filter(|s| !s.is_empty()).count()
}

fn body_schema(request_body: Option<&Value>) -> Option<Value> {
    request_body?
        .get("content")?
        .get("application/json")?
        .get("schema")
        .cloned()
}

fn success_response_schema(responses: Option<&Value>) -> Option<Value> {
    let responses = responses?.as_object()?;
    responses
        .iter()
        .find(|(status, _)| status.starts_with('2'))
        .and_then(|(_, r)| body_schema_of_response(r))
}

fn error_response_schemas(responses: Option<&Value>) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    let Some(responses) = responses.and_then(Value::as_object) else {
        return out;
    };
    for (status, response) in responses {
        if status.starts_with('4') || status.starts_with('5') {
            if let Some(schema) = body_schema_of_response(response) {
                out.insert(status.clone(), schema);
            }
        }
    }
    out
}

fn body_schema_of_response(response: &Value) -> Option<Value> {
    response
        .get("content")?
        .get("application/json")?
        .get("schema")
        .cloned()
}

fn schema_map(doc: &Value) -> BTreeMap<String, Value> {
    doc.get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object)
        .map(|schemas| {
            schemas
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Pagination limits from named parameter components: a parameter named
/// `limit` contributes default/maximum, one named `offset` its default.
fn pagination_defaults(doc: &Value) -> PaginationDefaults {
    let mut defaults = PaginationDefaults::default();
    let Some(parameters) = doc
        .get("components")
        .and_then(|c| c.get("parameters"))
        .and_then(Value::as_object)
    else {
        return defaults;
    };
    for parameter in parameters.values() {
        let Some(name) = parameter.get("name").and_then(Value::as_str) else {
            continue;
        };
        let schema = parameter.get("schema");
        let number_at = |key: &str| schema.and_then(|s| s.get(key)).and_then(Value::as_u64);
        match name {
            "limit" => {
                if let Some(default) = number_at("default") {
                    defaults.limit_default = default;
                }
                if let Some(max) = number_at("maximum") {
                    defaults.limit_max = max;
                }
            }
            "offset" => {
                if let Some(default) = number_at("default") {
                    defaults.offset_default = default;
                }
            }
            _ => {}
        }
    }
    defaults
}

fn string_at(doc: &Value, keys: &[&str]) -> Option<String> {
    let mut current = doc;
    for key in keys {
        current = current.get(key)?;
    }
    current.as_str().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC_YAML: &str = r#"
name: claims
info:
  title: Claims API
  version: 1.2.0
baseResourcePath: /claims
paths:
  /claims:
    get:
      operationId: listClaims
      parameters:
        - $ref: '#/components/parameters/limitParam'
        - $ref: '#/components/parameters/offsetParam'
    post:
      operationId: createClaim
      requestBody:
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/Claim'
      responses:
        '201':
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Claim'
        '422':
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Error'
  /claims/{id}:
    get:
      operationId: getClaim
    patch:
      operationId: patchClaim
      requestBody:
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/ClaimPatch'
    delete:
      operationId: deleteClaim
  /claims/{id}/history/{entry}:
    get:
      operationId: claimHistoryEntry
components:
  parameters:
    limitParam:
      name: limit
      in: query
      schema:
        type: integer
        default: 10
        maximum: 50
    offsetParam:
      name: offset
      in: query
      schema:
        type: integer
        default: 0
  schemas:
    Claim:
      type: object
      properties:
        claimantName:
          type: string
        income:
          type: number
      required: [claimantName]
    ClaimPatch:
      type: object
    Error:
      type: object
"#;

    fn write_spec(dir: &Path) -> RawSpecRef {
        let path = dir.join("claims.yaml");
        std::fs::write(&path, SPEC_YAML).expect("write spec");
        RawSpecRef { path }
    }

    #[test]
    fn load_builds_resource_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = write_spec(dir.path());
        let spec = load(&raw, ResolutionPolicy::Strict).expect("load failed");

        assert_eq!(spec.name, "claims");
        assert_eq!(spec.title, "Claims API");
        assert_eq!(spec.version, "1.2.0");
        assert_eq!(spec.base_resource_path, "/claims");
        assert_eq!(spec.pagination.limit_default, 10);
        assert_eq!(spec.pagination.limit_max, 50);
        assert!(spec.schemas.contains_key("Claim"));
    }

    #[test]
    fn deep_sub_resource_paths_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = write_spec(dir.path());
        let spec = load(&raw, ResolutionPolicy::Strict).expect("load failed");

        // 2 methods on /claims + 3 on /claims/{id}; the two-extra-segment
        // history path is reserved and skipped.
        assert_eq!(spec.endpoints.len(), 5);
        assert!(spec
            .endpoints
            .iter()
            .all(|e| !e.path.contains("history")));
    }

    #[test]
    fn request_schema_is_dereferenced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = write_spec(dir.path());
        let spec = load(&raw, ResolutionPolicy::Strict).expect("load failed");

        let schema = spec
            .request_schema_for("POST")
            .expect("POST request schema");
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["claimantName"].is_object());
    }

    #[test]
    fn error_schemas_are_keyed_by_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = write_spec(dir.path());
        let spec = load(&raw, ResolutionPolicy::Strict).expect("load failed");

        let create = spec
            .endpoints
            .iter()
            .find(|e| e.method == "POST")
            .expect("POST endpoint");
        assert!(create.error_schemas.contains_key("422"));
        assert!(create.response_schema.is_some());
    }

    #[test]
    fn discover_skips_excluded_subtrees_and_shared_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_spec(dir.path());
        std::fs::write(dir.path().join("_shared.yaml"), "components: {}\n").expect("write");
        std::fs::create_dir(dir.path().join("resolved")).expect("mkdir");
        std::fs::write(dir.path().join("resolved/claims.yaml"), SPEC_YAML).expect("write");
        std::fs::create_dir(dir.path().join("contracts")).expect("mkdir");
        std::fs::write(dir.path().join("contracts/claims.contract.yaml"), "states: {}\n")
            .expect("write");

        let refs = discover(dir.path()).expect("discover failed");
        assert_eq!(refs.len(), 1);
        assert!(refs[0].path.ends_with("claims.yaml"));
    }

    #[test]
    fn load_dir_attaches_contract() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_spec(dir.path());
        std::fs::create_dir(dir.path().join("contracts")).expect("mkdir");
        std::fs::write(
            dir.path().join("contracts/claims.contract.yaml"),
            "states:\n  pending:\n  done:\ninitialState: pending\ntransitions:\n  - trigger: finish\n    from: pending\n    to: done\n",
        )
        .expect("write contract");

        let specs = load_dir(dir.path(), ResolutionPolicy::Strict).expect("load_dir failed");
        assert_eq!(specs.len(), 1);
        let contract = specs[0].contract.as_ref().expect("contract attached");
        assert_eq!(contract.initial_state, "pending");
    }
}
