//! Index-store reader: enumerates and decodes translation-unit artifacts.
//!
//! The store is a directory the compiler (or a build integration) fills
//! with one record per unit under `units/`. The encoding is owned by this
//! module and opaque to everything above it; the reader library handle
//! pins the record format version a store was written with.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::{SymbolKind, SymbolPropertySet, SymbolRoleSet};

use super::error::{StorageError, StorageResult};

/// Record format version understood by the built-in reader.
const UNIT_FORMAT_VERSION: u32 = 1;

const UNITS_SUBDIR: &str = "units";
const UNIT_EXTENSION: &str = "json";

/// Opaque handle to an index-store reader implementation.
#[derive(Debug, Clone)]
pub struct IndexStoreLibrary {
    format_version: u32,
}

impl IndexStoreLibrary {
    pub fn new(format_version: u32) -> Self {
        Self { format_version }
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }
}

/// Resolves the reader library to use for a given store path.
pub trait IndexStoreLibraryProvider: Send + Sync {
    fn library_for_store_path(&self, store_path: &Path) -> Option<IndexStoreLibrary>;
}

/// Provider handing out the built-in reader for every store path.
pub struct GlobalIndexStoreLibraryProvider;

impl IndexStoreLibraryProvider for GlobalIndexStoreLibraryProvider {
    fn library_for_store_path(&self, _store_path: &Path) -> Option<IndexStoreLibrary> {
        Some(IndexStoreLibrary::new(UNIT_FORMAT_VERSION))
    }
}

/// A relation carried by one occurrence record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationRecord {
    pub roles: SymbolRoleSet,
    pub usr: String,
    pub name: String,
    pub kind: SymbolKind,
}

/// One symbol occurrence as serialized in a unit artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccurrenceRecord {
    pub usr: String,
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub properties: SymbolPropertySet,
    pub roles: SymbolRoleSet,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    #[serde(default)]
    pub relations: Vec<RelationRecord>,
}

/// One include edge as serialized in a unit artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeRecord {
    pub source: PathBuf,
    pub target: PathBuf,
    pub line: u32,
}

/// Decoded translation-unit artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreUnitRecord {
    pub unit_name: String,
    pub main_file: PathBuf,
    pub out_file: PathBuf,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub unit_dependencies: Vec<String>,
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub includes: Vec<IncludeRecord>,
    #[serde(default)]
    pub occurrences: Vec<OccurrenceRecord>,
}

/// Open handle onto one store directory.
pub struct IndexStore {
    path: PathBuf,
    library: IndexStoreLibrary,
}

impl IndexStore {
    /// Open the store at `store_path` with the resolved reader library.
    ///
    /// Fails if the store path is not a readable directory.
    pub fn create(store_path: &Path, library: IndexStoreLibrary) -> StorageResult<Arc<IndexStore>> {
        if !store_path.is_dir() {
            return Err(StorageError::StoreOpen {
                path: store_path.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        std::fs::read_dir(store_path).map_err(|e| StorageError::StoreOpen {
            path: store_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Arc::new(IndexStore {
            path: store_path.to_path_buf(),
            library,
        }))
    }

    pub fn store_path(&self) -> &Path {
        &self.path
    }

    pub fn library(&self) -> &IndexStoreLibrary {
        &self.library
    }

    fn units_dir(&self) -> PathBuf {
        self.path.join(UNITS_SUBDIR)
    }

    fn unit_file(&self, unit_name: &str) -> PathBuf {
        // Unit names may contain dots; append rather than replace.
        self.units_dir().join(format!("{unit_name}.{UNIT_EXTENSION}"))
    }

    /// Names of every unit currently present in the store.
    ///
    /// A store without a `units/` directory is an empty store, not an
    /// error.
    pub fn unit_names(&self) -> StorageResult<Vec<String>> {
        let units_dir = self.units_dir();
        if !units_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&units_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(UNIT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn has_unit(&self, unit_name: &str) -> bool {
        self.unit_file(unit_name).is_file()
    }

    /// Filesystem modification time of a unit artifact.
    pub fn unit_mod_time(&self, unit_name: &str) -> Option<SystemTime> {
        std::fs::metadata(self.unit_file(unit_name))
            .and_then(|m| m.modified())
            .ok()
    }

    /// Decode one unit artifact.
    pub fn read_unit(&self, unit_name: &str) -> StorageResult<StoreUnitRecord> {
        let path = self.unit_file(unit_name);
        let bytes = std::fs::read(&path).map_err(|e| StorageError::UnitRead {
            unit: unit_name.to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::UnitRead {
            unit: unit_name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Write one unit artifact. Test and build-integration entry point;
    /// the index itself only reads.
    pub fn write_unit(&self, record: &StoreUnitRecord) -> StorageResult<()> {
        let units_dir = self.units_dir();
        std::fs::create_dir_all(&units_dir)?;
        let path = self.unit_file(&record.unit_name);
        let bytes = serde_json::to_vec_pretty(record)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("path", &self.path)
            .field("format_version", &self.library.format_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(name: &str) -> StoreUnitRecord {
        StoreUnitRecord {
            unit_name: name.to_string(),
            main_file: PathBuf::from("/src/main.code"),
            out_file: PathBuf::from(format!("/build/{name}.o")),
            provider: None,
            is_system: false,
            unit_dependencies: Vec::new(),
            files: vec![PathBuf::from("/src/main.code")],
            includes: Vec::new(),
            occurrences: Vec::new(),
        }
    }

    #[test]
    fn test_open_requires_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("absent");
        let err = IndexStore::create(&missing, IndexStoreLibrary::new(1)).unwrap_err();
        assert!(matches!(err, StorageError::StoreOpen { .. }));
    }

    #[test]
    fn test_unit_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = IndexStore::create(dir.path(), IndexStoreLibrary::new(1)).unwrap();

        assert_eq!(store.unit_names().unwrap().len(), 0);
        store.write_unit(&sample_record("alpha")).unwrap();
        store.write_unit(&sample_record("beta")).unwrap();

        assert_eq!(store.unit_names().unwrap(), vec!["alpha", "beta"]);
        assert!(store.has_unit("alpha"));
        assert!(store.unit_mod_time("alpha").is_some());

        let decoded = store.read_unit("beta").unwrap();
        assert_eq!(decoded.out_file, PathBuf::from("/build/beta.o"));
    }

    #[test]
    fn test_read_missing_unit_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = IndexStore::create(dir.path(), IndexStoreLibrary::new(1)).unwrap();
        assert!(matches!(
            store.read_unit("ghost"),
            Err(StorageError::UnitRead { .. })
        ));
    }
}
