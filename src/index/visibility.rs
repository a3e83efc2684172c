//! File visibility registry.
//!
//! Tracks which main files a client has registered (per product name) and
//! which unit output paths are explicitly enabled. When the system runs
//! with explicit output units, only units whose output path has been added
//! are visible to queries; otherwise every registered unit is visible.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::paths::{CanonicalFilePath, CanonicalPathCache};
use crate::storage::Database;

#[derive(Default)]
struct VisibilityState {
    /// Registered main files, each with the product names that claim it.
    main_files: HashMap<CanonicalFilePath, BTreeSet<String>>,
    /// Explicitly enabled unit output paths.
    out_unit_paths: HashSet<PathBuf>,
}

pub struct FileVisibilityChecker {
    database: Arc<Database>,
    cache: Arc<CanonicalPathCache>,
    use_explicit_output_units: bool,
    state: RwLock<VisibilityState>,
}

impl FileVisibilityChecker {
    pub fn new(
        database: Arc<Database>,
        cache: Arc<CanonicalPathCache>,
        use_explicit_output_units: bool,
    ) -> Self {
        Self {
            database,
            cache,
            use_explicit_output_units,
            state: RwLock::new(VisibilityState::default()),
        }
    }

    pub fn register_main_files(&self, file_paths: &[PathBuf], product_name: &str) {
        let mut state = self.state.write();
        for path in file_paths {
            let canonical = self.cache.canonicalize(path);
            state
                .main_files
                .entry(canonical)
                .or_default()
                .insert(product_name.to_string());
        }
    }

    pub fn unregister_main_files(&self, file_paths: &[PathBuf], product_name: &str) {
        let mut state = self.state.write();
        for path in file_paths {
            let canonical = self.cache.canonicalize(path);
            if let Some(products) = state.main_files.get_mut(&canonical) {
                products.remove(product_name);
                if products.is_empty() {
                    state.main_files.remove(&canonical);
                }
            }
        }
    }

    pub fn add_unit_out_file_paths(&self, file_paths: &[PathBuf]) {
        let mut state = self.state.write();
        for path in file_paths {
            state.out_unit_paths.insert(path.clone());
        }
    }

    pub fn remove_unit_out_file_paths(&self, file_paths: &[PathBuf]) {
        let mut state = self.state.write();
        for path in file_paths {
            state.out_unit_paths.remove(path);
        }
    }

    pub fn is_registered_main_file(&self, path: &Path) -> bool {
        let canonical = self.cache.canonicalize(path);
        self.state.read().main_files.contains_key(&canonical)
    }

    /// Product names registered for a main file.
    pub fn products_for_main_file(&self, path: &Path) -> Vec<String> {
        let canonical = self.cache.canonicalize(path);
        self.state
            .read()
            .main_files
            .get(&canonical)
            .map(|products| products.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether occurrences from `unit_name` may surface in query results.
    pub fn is_unit_visible(&self, unit_name: &str) -> bool {
        if !self.use_explicit_output_units {
            return true;
        }
        let units = self.database.units.read();
        match units.by_name.get(unit_name) {
            Some(entry) => self
                .state
                .read()
                .out_unit_paths
                .contains(&entry.info.out_file_path),
            None => false,
        }
    }
}
