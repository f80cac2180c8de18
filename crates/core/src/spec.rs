//! Resolved per-resource metadata: endpoints, schemas, pagination.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::contract::BehavioralContract;

/// Pagination defaults extracted from named parameter components.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PaginationDefaults {
    pub limit_default: u64,
    pub limit_max: u64,
    pub offset_default: u64,
}

impl Default for PaginationDefaults {
    fn default() -> Self {
        PaginationDefaults {
            limit_default: 25,
            limit_max: 100,
            offset_default: 0,
        }
    }
}

/// One HTTP method+path pair bound to a generic CRUD handler.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Path relative to the server root; may contain `{param}` segments.
    pub path: String,
    /// Uppercase HTTP method.
    pub method: String,
    pub operation_id: Option<String>,
    /// Resolved parameter objects, as authored.
    pub parameters: Vec<Value>,
    pub request_schema: Option<Value>,
    pub response_schema: Option<Value>,
    /// Status code -> error schema.
    pub error_schemas: BTreeMap<String, Value>,
}

/// Resolved schema + endpoint metadata for one API surface.
///
/// Built once at startup from the raw contract files; immutable thereafter.
#[derive(Debug, Clone)]
pub struct ResourceSpecification {
    pub name: String,
    pub title: String,
    pub version: String,
    /// Leading-slash base path all endpoints hang off, e.g. `/claims`.
    pub base_resource_path: String,
    pub endpoints: Vec<Endpoint>,
    /// Schema name -> fully resolved JSON Schema.
    pub schemas: BTreeMap<String, Value>,
    pub pagination: PaginationDefaults,
    /// Optional behavioral contract governing RPC triggers.
    pub contract: Option<BehavioralContract>,
}

impl ResourceSpecification {
    /// The resolved request schema for a given method on the base path.
    pub fn request_schema_for(&self, method: &str) -> Option<&Value> {
        self.endpoints
            .iter()
            .find(|e| e.method == method && e.request_schema.is_some())
            .and_then(|e| e.request_schema.as_ref())
    }
}
