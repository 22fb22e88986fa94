use thiserror::Error;

/// Errors raised by the rank and ban tables.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened.
    #[error("Store unavailable at {path}: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A statement failed after the connection was established.
    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// Table and schema names are spliced into SQL, so only plain
    /// identifiers are accepted.
    #[error("Invalid table identifier: {0:?}")]
    InvalidTableName(String),

    #[error("Schema repair failed: {0}")]
    SchemaRepairFailed(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
