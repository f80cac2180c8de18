//! gantry-core: resource specification loading for the Gantry runtime.
//!
//! Turns declarative YAML artifacts into the runtime's in-memory model:
//!
//! - [`resolver`] -- dereferences `$ref` (same-file and cross-file) and
//!   flattens `allOf` compositions into literal object schemas
//! - [`loader`] -- discovers raw spec files and builds one
//!   [`ResourceSpecification`] per API surface
//! - [`contract`] -- the behavioral contract model (states, guards,
//!   transitions, effects) governing RPC triggers
//! - [`validate`] -- request-body validation against a resolved schema
//!
//! Both artifact kinds are read once at startup and immutable thereafter;
//! nothing in this crate writes them back.

pub mod contract;
pub mod error;
pub mod loader;
pub mod resolver;
pub mod spec;
pub mod validate;

pub use contract::{BehavioralContract, Effect, GuardDef, GuardOperator, Transition};
pub use error::{LoadError, ResolveError};
pub use loader::{discover, load, load_dir, RawSpecRef};
pub use resolver::{ResolutionPolicy, Resolver};
pub use spec::{Endpoint, PaginationDefaults, ResourceSpecification};
pub use validate::{FieldError, SchemaValidator};
