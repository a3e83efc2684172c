//! symdex - persistent source-code symbol index.
//!
//! Ingests compiler-produced index-store artifacts (one record per
//! translation unit, with per-file symbol occurrences, roles, and
//! inter-symbol relations) and answers the queries code tools need:
//! where is this symbol defined, called, or overridden; which files
//! include which; what tests exercise this binary output.
//!
//! The entry point is [`IndexSystem`], a façade composing the on-disk
//! database, the index-store reader, the symbol and path sub-indexes, the
//! visibility checker, and the datastore behind one handle. Delegate
//! notifications about ingestion and staleness are dispatched serially on
//! a background worker; queries stream results through receiver callbacks
//! that can stop enumeration early by returning `false`.

pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod paths;
pub mod storage;
pub mod system;
pub mod types;

pub use config::Settings;
pub use error::{IndexError, IndexResult};
pub use index::{FilePathIndex, FileVisibilityChecker, IndexDatastore, SymbolIndex};
pub use paths::{CanonicalFilePath, CanonicalPathCache};
pub use storage::{
    Database, GlobalIndexStoreLibraryProvider, IndexStore, IndexStoreLibrary,
    IndexStoreLibraryProvider, StoreUnitRecord,
};
pub use system::{
    AsyncIndexDelegate, IndexSystem, IndexSystemDelegate, SystemOptions, UnitOutOfDateHint,
};
pub use types::{
    StoreUnitInfo, Symbol, SymbolKind, SymbolLocation, SymbolOccurrence, SymbolOccurrenceRef,
    SymbolPropertySet, SymbolRef, SymbolRelation, SymbolRoleSet,
};
