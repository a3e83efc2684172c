use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to open database at '{path}': {source}")]
    DatabaseOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("database at '{path}' does not exist and cannot be created read-only")]
    ReadOnlyMissing { path: PathBuf },

    #[error("failed to open index store at '{path}': {reason}")]
    StoreOpen { path: PathBuf, reason: String },

    #[error("failed to read unit '{unit}': {reason}")]
    UnitRead { unit: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
