//! Per-resource runtime context shared by the generated handlers.

use gantry_core::{ResourceSpecification, SchemaValidator};
use gantry_storage::RecordStore;
use parking_lot::Mutex;

/// Everything a generic handler needs for one resource: the resolved
/// specification, compiled body validators, and the record store.
pub(crate) struct ResourceContext {
    pub(crate) spec: ResourceSpecification,
    pub(crate) store: RecordStore,
    /// Compiled from the POST endpoint's request schema, when declared.
    pub(crate) create_validator: Option<SchemaValidator>,
    /// Compiled from the PATCH endpoint's request schema, falling back
    /// to the POST schema.
    pub(crate) update_validator: Option<SchemaValidator>,
    /// Serializes trigger calls per resource: the guard-evaluate ->
    /// apply-effects -> persist cycle must not interleave.
    pub(crate) rpc_lock: Mutex<()>,
}
