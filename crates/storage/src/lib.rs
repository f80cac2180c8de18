//! gantry-storage: generic per-resource durable record store.
//!
//! Records are opaque JSON objects keyed by `id`, with server-assigned
//! `createdAt`/`updatedAt` stamps. One logical store per resource name,
//! lazily created on first access, all backed by a single SQLite
//! connection owned by the [`StoreRegistry`]. The connection mutex is
//! what serializes the read-modify-write cycle of concurrent requests
//! (single-process, single active writer model).

mod error;
mod record;
mod registry;

pub use error::StorageError;
pub use record::{shallow_merge, stamp_new, Page, PageRequest};
pub use registry::{RecordStore, StoreRegistry};
