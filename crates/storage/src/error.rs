/// All errors that can be returned by the record store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Unique-constraint violation on create: the id already exists
    /// within the resource's store.
    #[error("record '{id}' already exists in resource '{resource}'")]
    DuplicateId { resource: String, id: String },

    /// A stored body failed to round-trip as JSON.
    #[error("stored record is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// A backend-specific storage error (connection, SQL, I/O).
    #[error("storage backend error: {0}")]
    Backend(#[from] rusqlite::Error),
}
