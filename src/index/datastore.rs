//! Datastore: registers translation-unit artifacts from the store into
//! the sub-indexes and answers out-of-date queries about them.
//!
//! Registration is driven by polling the store. Each poll brackets the
//! work with `processing_added_pending` / `processing_completed` delegate
//! events and reports every registered unit; all events go through the
//! async delegate wrapper, so callers needing to observe them must drain
//! it afterwards.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{IndexError, IndexResult};
use crate::paths::CanonicalPathCache;
use crate::storage::{Database, IndexStore, StoreUnitRecord, UnitEntry};
use crate::system::{AsyncIndexDelegate, IndexSystemDelegate, UnitOutOfDateHint};
use crate::types::{
    StoreUnitInfo, Symbol, SymbolLocation, SymbolOccurrence, SymbolOccurrenceRef, SymbolRef,
    SymbolRelation,
};

use super::path_index::FilePathIndex;
use super::symbol_index::SymbolIndex;

/// Behavior flags forwarded from system construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatastoreOptions {
    pub use_explicit_output_units: bool,
    pub readonly: bool,
    pub enable_out_of_date_file_watching: bool,
    pub listen_to_unit_events: bool,
    pub wait_until_done_initializing: bool,
}

pub struct IndexDatastore {
    store: Arc<IndexStore>,
    database: Arc<Database>,
    symbol_index: Arc<SymbolIndex>,
    path_index: Arc<FilePathIndex>,
    delegate: Arc<AsyncIndexDelegate>,
    cache: Arc<CanonicalPathCache>,
    options: DatastoreOptions,
}

impl IndexDatastore {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        store: Arc<IndexStore>,
        database: Arc<Database>,
        symbol_index: Arc<SymbolIndex>,
        path_index: Arc<FilePathIndex>,
        delegate: Arc<AsyncIndexDelegate>,
        cache: Arc<CanonicalPathCache>,
        options: DatastoreOptions,
    ) -> IndexResult<Self> {
        let datastore = Self {
            store,
            database,
            symbol_index,
            path_index,
            delegate,
            cache,
            options,
        };

        if options.listen_to_unit_events && options.wait_until_done_initializing {
            datastore
                .poll_for_unit_changes()
                .map_err(|e| IndexError::DatastoreInit {
                    reason: e.to_string(),
                })?;
        }

        Ok(datastore)
    }

    // =========================================================================
    // Store polling and unit registration
    // =========================================================================

    /// Scan the store, register added or changed units, and drop units
    /// that disappeared. Returns the number of units registered.
    pub fn poll_for_unit_changes(&self) -> IndexResult<usize> {
        let names = self.store.unit_names().map_err(IndexError::Storage)?;

        let mut pending: Vec<(String, SystemTime)> = Vec::new();
        let removed: Vec<String>;
        {
            let units = self.database.units.read();
            for name in &names {
                let mod_time = self
                    .store
                    .unit_mod_time(name)
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                match units.by_name.get(name) {
                    Some(entry) if entry.info.mod_time >= mod_time => {}
                    _ => pending.push((name.clone(), mod_time)),
                }
            }

            let present: HashSet<&String> = names.iter().collect();
            removed = units
                .by_name
                .keys()
                .filter(|name| !present.contains(name))
                .cloned()
                .collect();
        }

        let mut registered = 0;
        if !pending.is_empty() {
            self.delegate.processing_added_pending(pending.len());
            for (name, mod_time) in pending {
                match self.store.read_unit(&name) {
                    Ok(record) => {
                        self.register_unit_record(record, mod_time);
                        registered += 1;
                    }
                    Err(e) => {
                        tracing::warn!(target: "datastore", "skipping unit '{name}': {e}");
                    }
                }
            }
            self.delegate.processing_completed(registered);
        }

        for name in removed {
            self.remove_unit(&name);
        }

        if self.options.enable_out_of_date_file_watching {
            self.report_stale_registered_units();
        }

        Ok(registered)
    }

    /// Poll and finish all unit registration before returning. Delegate
    /// events may still be in flight; the façade drains them.
    pub fn poll_for_unit_changes_and_wait(&self) {
        if let Err(e) = self.poll_for_unit_changes() {
            tracing::warn!(target: "datastore", "poll failed: {e}");
        }
    }

    /// Register one decoded unit artifact, replacing any previous
    /// registration of the same unit.
    pub fn register_unit_record(&self, record: StoreUnitRecord, mod_time: SystemTime) {
        if self.database.units.read().by_name.contains_key(&record.unit_name) {
            self.remove_unit(&record.unit_name);
        }

        let info = StoreUnitInfo {
            unit_name: record.unit_name.clone(),
            main_file: self.cache.canonicalize(&record.main_file),
            out_file_path: record.out_file.clone(),
            mod_time,
        };

        {
            let mut units = self.database.units.write();
            units.by_name.insert(
                record.unit_name.clone(),
                UnitEntry {
                    info: info.clone(),
                    provider: record.provider.clone(),
                    is_system: record.is_system,
                    dependencies: record.unit_dependencies.clone(),
                },
            );
            units
                .by_out_path
                .insert(record.out_file.clone(), record.unit_name.clone());
        }

        let canonical_files = self.path_index.add_unit_paths(&record);
        if let Some(provider) = &record.provider {
            self.symbol_index
                .associate_provider_files(provider, &canonical_files);
        }

        let occurrences = self.build_occurrences(&record);
        self.symbol_index
            .add_unit_symbols(&record.unit_name, occurrences);

        crate::debug_event!("datastore", "registered", "{}", record.unit_name);
        self.delegate.processed_store_unit(info);
    }

    fn build_occurrences(&self, record: &StoreUnitRecord) -> Vec<SymbolOccurrenceRef> {
        // Symbols repeat across occurrences of one unit; intern per record.
        let mut symbols: std::collections::HashMap<String, SymbolRef> =
            std::collections::HashMap::new();
        let mut intern = |usr: &str, name: &str, kind, properties| -> SymbolRef {
            if let Some(found) = symbols.get(usr) {
                return found.clone();
            }
            let symbol: SymbolRef =
                Arc::new(Symbol::new(usr, name, kind).with_properties(properties));
            symbols.insert(usr.to_string(), symbol.clone());
            symbol
        };

        record
            .occurrences
            .iter()
            .map(|occ| {
                let symbol = intern(&occ.usr, &occ.name, occ.kind, occ.properties);
                let relations = occ
                    .relations
                    .iter()
                    .map(|rel| SymbolRelation {
                        roles: rel.roles,
                        symbol: intern(&rel.usr, &rel.name, rel.kind, Default::default()),
                    })
                    .collect();
                Arc::new(SymbolOccurrence::new(
                    symbol,
                    occ.roles,
                    SymbolLocation {
                        path: self.cache.canonicalize(&occ.file),
                        line: occ.line,
                        column: occ.column,
                    },
                    record.unit_name.as_str(),
                    relations,
                ))
            })
            .collect()
    }

    fn remove_unit(&self, unit_name: &str) {
        self.symbol_index.remove_unit(unit_name);
        self.path_index.remove_unit(unit_name);
        let mut units = self.database.units.write();
        if let Some(entry) = units.by_name.remove(unit_name) {
            units.by_out_path.remove(&entry.info.out_file_path);
        }
    }

    /// Drop registered units whose artifact is no longer in the store.
    pub fn purge_stale_data(&self) {
        let stale: Vec<String> = {
            let units = self.database.units.read();
            units
                .by_name
                .keys()
                .filter(|name| !self.store.has_unit(name))
                .cloned()
                .collect()
        };
        for name in stale {
            crate::log_event!("datastore", "purged", "{name}");
            self.remove_unit(&name);
        }
    }

    // =========================================================================
    // Out-of-date queries
    // =========================================================================

    /// Whether the unit producing `unit_out_path` depends on any of the
    /// given dirty files. Unknown units are out of date by definition.
    pub fn is_unit_out_of_date(&self, unit_out_path: &Path, dirty_files: &[PathBuf]) -> bool {
        let Some(unit_name) = self.unit_for_out_path(unit_out_path) else {
            return true;
        };

        let unit_files = {
            let paths = self.database.paths.read();
            paths
                .files_of_unit
                .get(&unit_name)
                .cloned()
                .unwrap_or_default()
        };
        dirty_files
            .iter()
            .map(|dirty| self.cache.canonicalize(dirty))
            .any(|dirty| unit_files.contains(&dirty))
    }

    /// Whether the unit producing `unit_out_path` was registered from an
    /// artifact older than `out_of_date_mod_time`.
    pub fn is_unit_out_of_date_since(
        &self,
        unit_out_path: &Path,
        out_of_date_mod_time: SystemTime,
    ) -> bool {
        let Some(unit_name) = self.unit_for_out_path(unit_out_path) else {
            return true;
        };
        let units = self.database.units.read();
        match units.by_name.get(&unit_name) {
            Some(entry) => entry.info.mod_time < out_of_date_mod_time,
            None => true,
        }
    }

    /// If `file` is newer on disk than any unit containing it, report
    /// those units (and units depending on them) stale via the delegate.
    pub fn check_unit_containing_file_is_out_of_date(&self, file: &Path) {
        let canonical = self.cache.canonicalize(file);
        let Ok(file_mod_time) = std::fs::metadata(canonical.as_path()).and_then(|m| m.modified())
        else {
            return;
        };

        let containing: Vec<String> = {
            let paths = self.database.paths.read();
            paths
                .units_containing_file
                .get(&canonical)
                .map(|units| units.iter().cloned().collect())
                .unwrap_or_default()
        };

        let hint = UnitOutOfDateHint::file(canonical.to_path_buf());
        let mut visited = HashSet::new();
        for unit_name in containing {
            let stale = {
                let units = self.database.units.read();
                units
                    .by_name
                    .get(&unit_name)
                    .map(|entry| entry.info.mod_time < file_mod_time)
                    .unwrap_or(false)
            };
            if stale {
                self.report_out_of_date(&unit_name, file_mod_time, hint.clone(), &mut visited);
            }
        }
    }

    fn report_out_of_date(
        &self,
        unit_name: &str,
        mod_time: SystemTime,
        hint: Arc<UnitOutOfDateHint>,
        visited: &mut HashSet<String>,
    ) {
        if !visited.insert(unit_name.to_string()) {
            return;
        }

        let info = {
            let units = self.database.units.read();
            match units.by_name.get(unit_name) {
                Some(entry) => entry.info.clone(),
                None => return,
            }
        };
        self.delegate
            .unit_is_out_of_date(info, mod_time, hint.clone(), false);

        // Units depending on a stale unit inherit its staleness.
        let dependents: Vec<String> = {
            let units = self.database.units.read();
            units
                .by_name
                .iter()
                .filter(|(_, entry)| {
                    entry
                        .dependencies
                        .iter()
                        .any(|dependency| dependency == unit_name)
                })
                .map(|(name, _)| name.clone())
                .collect()
        };
        for dependent in dependents {
            let chained = UnitOutOfDateHint::unit(unit_name.to_string(), hint.clone());
            self.report_out_of_date(&dependent, mod_time, chained, visited);
        }
    }

    fn report_stale_registered_units(&self) {
        let registered: Vec<(String, SystemTime)> = {
            let units = self.database.units.read();
            units
                .by_name
                .iter()
                .map(|(name, entry)| (name.clone(), entry.info.mod_time))
                .collect()
        };

        for (unit_name, unit_mod_time) in registered {
            let files = {
                let paths = self.database.paths.read();
                paths
                    .files_of_unit
                    .get(&unit_name)
                    .cloned()
                    .unwrap_or_default()
            };
            for file in files {
                let Ok(file_mod_time) =
                    std::fs::metadata(file.as_path()).and_then(|m| m.modified())
                else {
                    continue;
                };
                if file_mod_time > unit_mod_time {
                    let mut visited = HashSet::new();
                    self.report_out_of_date(
                        &unit_name,
                        file_mod_time,
                        UnitOutOfDateHint::file(file.to_path_buf()),
                        &mut visited,
                    );
                    break;
                }
            }
        }
    }

    // =========================================================================
    // Explicit output-unit management
    // =========================================================================

    /// Register store units producing the given output paths. Processing
    /// happens before this returns; `wait_for_processing` additionally
    /// waits for nothing further here because registration is synchronous.
    pub fn add_unit_out_file_paths(&self, paths: &[PathBuf], _wait_for_processing: bool) {
        let wanted: HashSet<&PathBuf> = paths.iter().collect();
        let names = match self.store.unit_names() {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(target: "datastore", "store scan failed: {e}");
                return;
            }
        };

        let mut matched: Vec<(StoreUnitRecord, SystemTime)> = Vec::new();
        for name in names {
            let already = {
                let units = self.database.units.read();
                units.by_name.contains_key(&name)
            };
            if already {
                continue;
            }
            let Ok(record) = self.store.read_unit(&name) else {
                continue;
            };
            if wanted.contains(&record.out_file) {
                let mod_time = self
                    .store
                    .unit_mod_time(&name)
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                matched.push((record, mod_time));
            }
        }

        if matched.is_empty() {
            return;
        }
        self.delegate.processing_added_pending(matched.len());
        let count = matched.len();
        for (record, mod_time) in matched {
            self.register_unit_record(record, mod_time);
        }
        self.delegate.processing_completed(count);
    }

    /// Drop the units producing the given output paths.
    pub fn remove_unit_out_file_paths(&self, paths: &[PathBuf], _wait_for_processing: bool) {
        for path in paths {
            if let Some(unit_name) = self.unit_for_out_path(path) {
                self.remove_unit(&unit_name);
            }
        }
    }

    fn unit_for_out_path(&self, out_path: &Path) -> Option<String> {
        let units = self.database.units.read();
        units.by_out_path.get(out_path).cloned()
    }
}
