//! On-disk storage: the database wrapper that owns the shared record
//! tables, and the index-store reader for translation-unit artifacts.

mod database;
mod error;
mod store;

pub use database::Database;
pub(crate) use database::{IncludeEdge, UnitEntry};
pub use error::{StorageError, StorageResult};
pub use store::{
    GlobalIndexStoreLibraryProvider, IncludeRecord, IndexStore, IndexStoreLibrary,
    IndexStoreLibraryProvider, OccurrenceRecord, RelationRecord, StoreUnitRecord,
};
