use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the sqlite-backed store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("migration {version} failed: {reason}")]
    Migration { version: i64, reason: String },

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("invalid table name: {0}")]
    InvalidTableName(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("failed to serialize stored value: {0}")]
    Serialize(#[from] serde_json::Error),
}
