//! Database wrapper owning the shared record tables.
//!
//! The database is the one mutable store every sub-index reads from: the
//! symbol sub-index queries the occurrence tables, the path sub-index the
//! file/include tables, and the datastore maintains the unit table while
//! ingesting. Table layout is private to this module; collaborators go
//! through the typed accessors on the sub-indexes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::paths::CanonicalFilePath;
use crate::types::{StoreUnitInfo, SymbolOccurrenceRef};

use super::error::{StorageError, StorageResult};

/// An include edge recorded for one unit.
#[derive(Debug, Clone)]
pub(crate) struct IncludeEdge {
    pub source: CanonicalFilePath,
    pub target: CanonicalFilePath,
    pub line: u32,
}

/// Bookkeeping for one registered unit.
#[derive(Debug, Clone)]
pub(crate) struct UnitEntry {
    pub info: StoreUnitInfo,
    pub provider: Option<String>,
    pub is_system: bool,
    pub dependencies: Vec<String>,
}

/// Occurrence tables maintained by the symbol sub-index.
///
/// Occurrences are stored in one arena with tombstones; the secondary
/// indexes hold arena slots and are filtered against tombstones on read.
#[derive(Default)]
pub(crate) struct SymbolTables {
    pub occurrences: Vec<Option<SymbolOccurrenceRef>>,
    pub by_usr: HashMap<Arc<str>, Vec<usize>>,
    /// Slots of occurrences carrying a relation to the keyed USR.
    pub related_by_usr: HashMap<Arc<str>, Vec<usize>>,
    pub canonical_by_usr: HashMap<Arc<str>, usize>,
    pub usrs_by_name: BTreeMap<Arc<str>, Vec<Arc<str>>>,
    pub by_unit: HashMap<Arc<str>, Vec<usize>>,
    pub provider_files: BTreeMap<String, BTreeSet<PathBuf>>,
}

/// File and include tables maintained by the path sub-index.
#[derive(Default)]
pub(crate) struct PathTables {
    /// Known files with a per-unit reference count.
    pub known_files: HashMap<CanonicalFilePath, usize>,
    pub files_of_unit: HashMap<String, Vec<CanonicalFilePath>>,
    pub units_containing_file: HashMap<CanonicalFilePath, BTreeSet<String>>,
    pub includes_of_unit: HashMap<String, Vec<IncludeEdge>>,
}

/// Unit table maintained by the datastore.
#[derive(Default)]
pub(crate) struct UnitTables {
    pub by_name: HashMap<String, UnitEntry>,
    pub by_out_path: HashMap<PathBuf, String>,
}

/// Handle to the opened database directory and its record tables.
pub struct Database {
    path: PathBuf,
    readonly: bool,
    pub(crate) symbols: RwLock<SymbolTables>,
    pub(crate) paths: RwLock<PathTables>,
    pub(crate) units: RwLock<UnitTables>,
}

impl Database {
    /// Open (creating, unless read-only) the database at `path`.
    ///
    /// `initial_size` is a capacity hint for the occurrence arena; it never
    /// bounds growth.
    pub fn create(
        path: &Path,
        readonly: bool,
        initial_size: Option<usize>,
    ) -> StorageResult<Arc<Database>> {
        if readonly {
            if !path.is_dir() {
                return Err(StorageError::ReadOnlyMissing {
                    path: path.to_path_buf(),
                });
            }
        } else {
            std::fs::create_dir_all(path).map_err(|source| StorageError::DatabaseOpen {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let mut symbols = SymbolTables::default();
        if let Some(hint) = initial_size {
            symbols.occurrences.reserve(hint);
        }

        tracing::debug!(target: "storage", "opened database at {}", path.display());

        Ok(Arc::new(Database {
            path: path.to_path_buf(),
            readonly,
            symbols: RwLock::new(symbols),
            paths: RwLock::new(PathTables::default()),
            units: RwLock::new(UnitTables::default()),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("readonly", &self.readonly)
            .finish()
    }
}
