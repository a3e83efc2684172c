//! Error types for the symbol index system.
//!
//! Construction failures surface through these enums exactly once; query
//! operations report only completed-vs-terminated booleans and never carry
//! an error channel.

use thiserror::Error;

use crate::storage::StorageError;

/// Top-level error for building and operating an index system.
#[derive(Error, Debug)]
pub enum IndexError {
    /// No index-store reader library is available for the store path.
    #[error("could not determine indexstore library")]
    StoreLibraryUnavailable,

    /// Database or index-store failures during construction.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The datastore could not complete its initial unit registration.
    #[error("failed to initialize index datastore: {reason}")]
    DatastoreInit { reason: String },

    /// Invalid settings (bad paths, unparseable config file).
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

pub type IndexResult<T> = Result<T, IndexError>;
