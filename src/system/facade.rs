//! The index system façade: one handle composing the database, the index
//! store, the sub-indexes, the datastore, and the async delegate wrapper.
//!
//! Construction wires every collaborator in leaves-first order and either
//! yields a fully initialized system or an error; partial construction is
//! never observable. Query operations forward to the owning collaborator,
//! canonicalizing path arguments on the way in. Every `foreach_*` returns
//! `true` when the enumeration completed and `false` when the receiver
//! terminated it early.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{IndexError, IndexResult};
use crate::index::{
    DatastoreOptions, FilePathIndex, FileVisibilityChecker, IndexDatastore, SymbolIndex,
};
use crate::paths::{CanonicalFilePath, CanonicalPathCache};
use crate::storage::{Database, IndexStore, IndexStoreLibraryProvider};
use crate::types::{StoreUnitInfo, SymbolKind, SymbolOccurrenceRef, SymbolRef, SymbolRoleSet};

use super::call_resolver::CallResolver;
use super::delegate::{AsyncIndexDelegate, IndexSystemDelegate};
use super::path_queries::PathQueryAdapter;

/// Construction flags for [`IndexSystem::create`].
#[derive(Debug, Clone)]
pub struct SystemOptions {
    /// Only units whose output path was explicitly added are visible.
    pub use_explicit_output_units: bool,
    /// Open the database read-only and never create the store path.
    pub readonly: bool,
    /// Re-check registered units against file modification times while
    /// polling, reporting stale units through the delegate.
    pub enable_out_of_date_file_watching: bool,
    /// Process store units at all; disable for a query-only façade over
    /// an existing database.
    pub listen_to_unit_events: bool,
    /// Perform the initial store scan before `create` returns.
    pub wait_until_done_initializing: bool,
    /// Capacity hint for the occurrence tables.
    pub initial_db_size: Option<usize>,
}

impl Default for SystemOptions {
    fn default() -> Self {
        Self {
            use_explicit_output_units: false,
            readonly: false,
            enable_out_of_date_file_watching: false,
            listen_to_unit_events: true,
            wait_until_done_initializing: true,
            initial_db_size: None,
        }
    }
}

/// Handle to a fully constructed symbol index system.
pub struct IndexSystem {
    // Declared first so it drops first: ingestion stops before the shared
    // handles below release.
    datastore: IndexDatastore,
    store_path: PathBuf,
    database_path: PathBuf,
    delegate: Arc<AsyncIndexDelegate>,
    visibility: Arc<FileVisibilityChecker>,
    symbol_index: Arc<SymbolIndex>,
    path_index: Arc<FilePathIndex>,
    path_queries: PathQueryAdapter,
}

impl IndexSystem {
    /// Construct the system over `store_path` and `database_path`.
    pub fn create(
        store_path: impl Into<PathBuf>,
        database_path: impl Into<PathBuf>,
        store_lib_provider: Arc<dyn IndexStoreLibraryProvider>,
        delegate: Option<Arc<dyn IndexSystemDelegate>>,
        options: SystemOptions,
    ) -> IndexResult<Arc<IndexSystem>> {
        let store_path = store_path.into();
        let database_path = database_path.into();

        let database = Database::create(&database_path, options.readonly, options.initial_db_size)?;

        let library = store_lib_provider
            .library_for_store_path(&store_path)
            .ok_or(IndexError::StoreLibraryUnavailable)?;

        if !options.readonly {
            // Create the index store path, if it does not already exist.
            if let Err(e) = std::fs::create_dir_all(&store_path) {
                tracing::error!(
                    target: "system",
                    "could not create directories for data store path {}: {e}",
                    store_path.display()
                );
            }
        }

        let store = IndexStore::create(&store_path, library)?;

        let cache = Arc::new(CanonicalPathCache::new());
        let visibility = Arc::new(FileVisibilityChecker::new(
            database.clone(),
            cache.clone(),
            options.use_explicit_output_units,
        ));
        let symbol_index = Arc::new(SymbolIndex::new(
            database.clone(),
            store.clone(),
            visibility.clone(),
        ));
        let path_index = Arc::new(FilePathIndex::new(
            database.clone(),
            store.clone(),
            visibility.clone(),
            cache.clone(),
        ));

        let delegate = Arc::new(AsyncIndexDelegate::new(delegate));
        let datastore = IndexDatastore::create(
            store,
            database,
            symbol_index.clone(),
            path_index.clone(),
            delegate.clone(),
            cache,
            DatastoreOptions {
                use_explicit_output_units: options.use_explicit_output_units,
                readonly: options.readonly,
                enable_out_of_date_file_watching: options.enable_out_of_date_file_watching,
                listen_to_unit_events: options.listen_to_unit_events,
                wait_until_done_initializing: options.wait_until_done_initializing,
            },
        )?;

        crate::log_event!("system", "opened", "{}", store_path.display());

        Ok(Arc::new(IndexSystem {
            datastore,
            store_path,
            database_path,
            delegate,
            visibility,
            symbol_index,
            path_queries: PathQueryAdapter::new(path_index.clone()),
            path_index,
        }))
    }

    /// Construct the system from the configuration layer.
    pub fn with_settings(
        settings: &crate::config::Settings,
        store_lib_provider: Arc<dyn IndexStoreLibraryProvider>,
        delegate: Option<Arc<dyn IndexSystemDelegate>>,
    ) -> IndexResult<Arc<IndexSystem>> {
        Self::create(
            settings.store_path.clone(),
            settings.database_path.clone(),
            store_lib_provider,
            delegate,
            settings.system_options(),
        )
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    // =========================================================================
    // Out-of-date queries and invalidation (datastore)
    // =========================================================================

    pub fn is_unit_out_of_date(&self, unit_out_path: &Path, dirty_files: &[PathBuf]) -> bool {
        self.datastore.is_unit_out_of_date(unit_out_path, dirty_files)
    }

    pub fn is_unit_out_of_date_since(
        &self,
        unit_out_path: &Path,
        out_of_date_mod_time: SystemTime,
    ) -> bool {
        self.datastore
            .is_unit_out_of_date_since(unit_out_path, out_of_date_mod_time)
    }

    pub fn check_unit_containing_file_is_out_of_date(&self, file: &Path) {
        self.datastore.check_unit_containing_file_is_out_of_date(file)
    }

    pub fn purge_stale_data(&self) {
        self.datastore.purge_stale_data()
    }

    /// Poll for unit changes and wait until every resulting delegate
    /// notification has been observed.
    pub fn poll_for_unit_changes_and_wait(&self) {
        self.datastore.poll_for_unit_changes_and_wait();
        self.delegate.drain();
    }

    // =========================================================================
    // Main-file and output-file registration
    // =========================================================================

    pub fn register_main_files(&self, file_paths: &[PathBuf], product_name: &str) {
        self.visibility.register_main_files(file_paths, product_name)
    }

    pub fn unregister_main_files(&self, file_paths: &[PathBuf], product_name: &str) {
        self.visibility
            .unregister_main_files(file_paths, product_name)
    }

    /// The visibility checker observes the mutation before the datastore,
    /// so ingestion events find consistent visibility state.
    pub fn add_unit_out_file_paths(&self, file_paths: &[PathBuf], wait_for_processing: bool) {
        self.visibility.add_unit_out_file_paths(file_paths);
        self.datastore
            .add_unit_out_file_paths(file_paths, wait_for_processing);
    }

    pub fn remove_unit_out_file_paths(&self, file_paths: &[PathBuf], wait_for_processing: bool) {
        self.visibility.remove_unit_out_file_paths(file_paths);
        self.datastore
            .remove_unit_out_file_paths(file_paths, wait_for_processing);
    }

    // =========================================================================
    // Symbol queries (symbol sub-index)
    // =========================================================================

    pub fn foreach_symbol_occurrence_by_usr(
        &self,
        usr: &str,
        roles: SymbolRoleSet,
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_symbol_occurrence_by_usr(usr, roles, receiver)
    }

    pub fn foreach_related_symbol_occurrence_by_usr(
        &self,
        usr: &str,
        roles: SymbolRoleSet,
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_related_symbol_occurrence_by_usr(usr, roles, receiver)
    }

    pub fn foreach_canonical_symbol_occurrence_containing_pattern(
        &self,
        pattern: &str,
        anchor_start: bool,
        anchor_end: bool,
        subsequence: bool,
        ignore_case: bool,
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_canonical_symbol_occurrence_containing_pattern(
                pattern,
                anchor_start,
                anchor_end,
                subsequence,
                ignore_case,
                receiver,
            )
    }

    pub fn foreach_canonical_symbol_occurrence_by_name(
        &self,
        name: &str,
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_canonical_symbol_occurrence_by_name(name, receiver)
    }

    pub fn foreach_symbol_name(&self, receiver: impl FnMut(&str) -> bool) -> bool {
        self.symbol_index.foreach_symbol_name(receiver)
    }

    pub fn foreach_canonical_symbol_occurrence_by_usr(
        &self,
        usr: &str,
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_canonical_symbol_occurrence_by_usr(usr, receiver)
    }

    pub fn count_of_canonical_symbols_with_kind(
        &self,
        kind: SymbolKind,
        workspace_only: bool,
    ) -> usize {
        self.symbol_index
            .count_of_canonical_symbols_with_kind(kind, workspace_only)
    }

    pub fn foreach_canonical_symbol_occurrence_by_kind(
        &self,
        kind: SymbolKind,
        workspace_only: bool,
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_canonical_symbol_occurrence_by_kind(kind, workspace_only, receiver)
    }

    pub fn foreach_unit_test_symbol_referenced_by_output_paths(
        &self,
        out_paths: &[PathBuf],
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_unit_test_symbol_referenced_by_output_paths(out_paths, receiver)
    }

    // =========================================================================
    // Call resolution
    // =========================================================================

    /// Enumerate occurrences that may call `callee`, accounting for
    /// dynamic dispatch, protocol conformance, and class extension.
    pub fn foreach_symbol_call_occurrence(
        &self,
        callee: &SymbolOccurrenceRef,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        CallResolver::new(&self.symbol_index).foreach_call_occurrence(callee, &mut receiver)
    }

    /// Transitive override/base closure of `symbol`, deduplicated by USR,
    /// not including `symbol` itself.
    pub fn get_base_methods_or_classes(&self, symbol: &SymbolRef) -> Vec<SymbolRef> {
        CallResolver::new(&self.symbol_index).base_methods_or_classes(symbol)
    }

    // =========================================================================
    // Path queries (path sub-index, canonicalizing adapter)
    // =========================================================================

    pub fn is_known_file(&self, file_path: &Path) -> bool {
        self.path_queries.is_known_file(file_path)
    }

    pub fn foreach_main_unit_containing_file(
        &self,
        file_path: &Path,
        receiver: impl FnMut(&StoreUnitInfo) -> bool,
    ) -> bool {
        self.path_queries
            .foreach_main_unit_containing_file(file_path, receiver)
    }

    pub fn foreach_file_of_unit(
        &self,
        unit_name: &str,
        follow_dependencies: bool,
        receiver: impl FnMut(&CanonicalFilePath) -> bool,
    ) -> bool {
        self.path_index
            .foreach_file_of_unit(unit_name, follow_dependencies, receiver)
    }

    pub fn foreach_filename_containing_pattern(
        &self,
        pattern: &str,
        anchor_start: bool,
        anchor_end: bool,
        subsequence: bool,
        ignore_case: bool,
        receiver: impl FnMut(&CanonicalFilePath) -> bool,
    ) -> bool {
        self.path_index.foreach_filename_containing_pattern(
            pattern,
            anchor_start,
            anchor_end,
            subsequence,
            ignore_case,
            receiver,
        )
    }

    pub fn foreach_file_including_file(
        &self,
        target_path: &Path,
        receiver: impl FnMut(&CanonicalFilePath, u32) -> bool,
    ) -> bool {
        self.path_queries
            .foreach_file_including_file(target_path, receiver)
    }

    pub fn foreach_file_included_by_file(
        &self,
        source_path: &Path,
        receiver: impl FnMut(&CanonicalFilePath, u32) -> bool,
    ) -> bool {
        self.path_queries
            .foreach_file_included_by_file(source_path, receiver)
    }

    pub fn foreach_include_of_unit(
        &self,
        unit_name: &str,
        receiver: impl FnMut(&CanonicalFilePath, &CanonicalFilePath, u32) -> bool,
    ) -> bool {
        self.path_index.foreach_include_of_unit(unit_name, receiver)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn print_stats(&self, out: &mut dyn Write) -> std::io::Result<()> {
        self.symbol_index.print_stats(out)
    }

    pub fn dump_provider_file_associations(&self, out: &mut dyn Write) -> std::io::Result<()> {
        self.symbol_index.dump_provider_file_associations(out)
    }
}

impl std::fmt::Debug for IndexSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSystem")
            .field("store_path", &self.store_path)
            .field("database_path", &self.database_path)
            .finish()
    }
}
