//! The store registry and per-resource record stores.
//!
//! The registry owns one SQLite connection behind a mutex; `store()`
//! hands out cheap per-resource views. All records live in a single
//! `records` table keyed `(resource, id)`; a monotonic `seq` column
//! breaks `created_at` ties in insertion order.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::StorageError;
use crate::record::{shallow_merge, stamp_new, Page, PageRequest};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    resource   TEXT NOT NULL,
    id         TEXT NOT NULL,
    created_at TEXT NOT NULL,
    body       TEXT NOT NULL,
    UNIQUE (resource, id)
);
CREATE INDEX IF NOT EXISTS idx_records_order
    ON records (resource, created_at DESC, seq DESC);
";

/// Owns the backing connection; hands out [`RecordStore`] views.
pub struct StoreRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl StoreRegistry {
    /// Open (or create) a registry backed by a SQLite file.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a registry backed by an in-memory database. Used by tests
    /// and throwaway deployments.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(StoreRegistry {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// The store for a resource name. Stores are lazily materialized:
    /// a resource exists as soon as its first record is inserted.
    pub fn store(&self, resource: &str) -> RecordStore {
        RecordStore {
            conn: Arc::clone(&self.conn),
            resource: resource.to_string(),
        }
    }

    /// Drop the backing connection. Outstanding [`RecordStore`] handles
    /// keep it alive until they are dropped too.
    pub fn close_all(self) {
        drop(self);
    }
}

/// A per-resource view over the shared connection.
#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
    resource: String,
}

impl RecordStore {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Stamp and insert a new record, returning the stored form.
    pub fn insert(&self, body: Value) -> Result<Value, StorageError> {
        let record = stamp_new(body);
        let id = record["id"].as_str().unwrap_or_default().to_string();
        let created_at = record["createdAt"].as_str().unwrap_or_default().to_string();
        let body_text = serde_json::to_string(&record)?;

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO records (resource, id, created_at, body) VALUES (?1, ?2, ?3, ?4)",
            params![self.resource, id, created_at, body_text],
        );
        match result {
            Ok(_) => Ok(record),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::DuplicateId {
                    resource: self.resource.clone(),
                    id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Value>, StorageError> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM records WHERE resource = ?1 AND id = ?2",
                params![self.resource, id],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// All matching records ordered `createdAt` descending (ties broken
    /// by insertion order, newest first), windowed by `page`. `total`
    /// counts matches before the window is applied.
    pub fn find_all<F>(&self, filter: F, page: PageRequest) -> Result<Page, StorageError>
    where
        F: Fn(&Value) -> bool,
    {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT body FROM records WHERE resource = ?1
             ORDER BY created_at DESC, seq DESC",
        )?;
        let rows = stmt.query_map(params![self.resource], |row| row.get::<_, String>(0))?;

        let mut matching = Vec::new();
        for row in rows {
            let record: Value = serde_json::from_str(&row?)?;
            if filter(&record) {
                matching.push(record);
            }
        }

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();
        Ok(Page { items, total })
    }

    /// Shallow-merge `partial` into the stored record. Returns the
    /// merged record, or `None` for an unknown id. The whole
    /// read-merge-write cycle holds the connection lock.
    pub fn update(&self, id: &str, partial: &Value) -> Result<Option<Value>, StorageError> {
        let conn = self.conn.lock();
        let existing: Option<String> = conn
            .query_row(
                "SELECT body FROM records WHERE resource = ?1 AND id = ?2",
                params![self.resource, id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(existing) = existing else {
            return Ok(None);
        };
        let existing: Value = serde_json::from_str(&existing)?;
        let merged = shallow_merge(&existing, partial);
        let body_text = serde_json::to_string(&merged)?;
        conn.execute(
            "UPDATE records SET body = ?1 WHERE resource = ?2 AND id = ?3",
            params![body_text, self.resource, id],
        )?;
        Ok(Some(merged))
    }

    /// Idempotent delete: `false` when the id did not exist.
    pub fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let affected = conn.execute(
            "DELETE FROM records WHERE resource = ?1 AND id = ?2",
            params![self.resource, id],
        )?;
        Ok(affected > 0)
    }

    pub fn count(&self) -> Result<u64, StorageError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE resource = ?1",
            params![self.resource],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
