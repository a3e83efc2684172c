//! Path sub-index: file, unit, and include-graph queries over the
//! database tables.
//!
//! All lookups are keyed by canonical paths; `get_canonical_path` is the
//! boundary where caller-supplied spellings are normalized.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::paths::{CanonicalFilePath, CanonicalPathCache};
use crate::storage::{Database, IncludeEdge, IndexStore, StoreUnitRecord};
use crate::types::StoreUnitInfo;

use super::pattern::NamePattern;
use super::visibility::FileVisibilityChecker;

pub struct FilePathIndex {
    database: Arc<Database>,
    /// Keeps the store handle alive as long as this sub-index.
    _store: Arc<IndexStore>,
    visibility: Arc<FileVisibilityChecker>,
    cache: Arc<CanonicalPathCache>,
}

impl FilePathIndex {
    pub fn new(
        database: Arc<Database>,
        store: Arc<IndexStore>,
        visibility: Arc<FileVisibilityChecker>,
        cache: Arc<CanonicalPathCache>,
    ) -> Self {
        Self {
            database,
            _store: store,
            visibility,
            cache,
        }
    }

    /// Canonical form of a caller-supplied path spelling.
    pub fn get_canonical_path(&self, raw: &Path) -> CanonicalFilePath {
        self.cache.canonicalize(raw)
    }

    pub fn is_known_file(&self, path: &CanonicalFilePath) -> bool {
        self.database.paths.read().known_files.contains_key(path)
    }

    /// Enumerate the units whose artifact contains `path`, yielding each
    /// unit's descriptor.
    pub fn foreach_main_unit_containing_file(
        &self,
        path: &CanonicalFilePath,
        mut receiver: impl FnMut(&StoreUnitInfo) -> bool,
    ) -> bool {
        let unit_names = {
            let paths = self.database.paths.read();
            match paths.units_containing_file.get(path) {
                Some(units) => units.iter().cloned().collect::<Vec<_>>(),
                None => return true,
            }
        };

        for unit_name in &unit_names {
            if !self.visibility.is_unit_visible(unit_name) {
                continue;
            }
            let info = {
                let units = self.database.units.read();
                units.by_name.get(unit_name).map(|entry| entry.info.clone())
            };
            if let Some(info) = info {
                if !receiver(&info) {
                    return false;
                }
            }
        }
        true
    }

    /// Enumerate the files of a unit, optionally walking its transitive
    /// unit dependencies. Files are yielded at most once.
    pub fn foreach_file_of_unit(
        &self,
        unit_name: &str,
        follow_dependencies: bool,
        mut receiver: impl FnMut(&CanonicalFilePath) -> bool,
    ) -> bool {
        let mut queue = vec![unit_name.to_string()];
        let mut visited_units = HashSet::new();
        let mut yielded = HashSet::new();

        while let Some(unit) = queue.pop() {
            if !visited_units.insert(unit.clone()) {
                continue;
            }

            let files = {
                let paths = self.database.paths.read();
                paths.files_of_unit.get(&unit).cloned().unwrap_or_default()
            };
            for file in files {
                if yielded.insert(file.clone()) && !receiver(&file) {
                    return false;
                }
            }

            if follow_dependencies {
                let units = self.database.units.read();
                if let Some(entry) = units.by_name.get(&unit) {
                    queue.extend(entry.dependencies.iter().cloned());
                }
            }
        }
        true
    }

    pub fn foreach_filename_containing_pattern(
        &self,
        pattern: &str,
        anchor_start: bool,
        anchor_end: bool,
        subsequence: bool,
        ignore_case: bool,
        mut receiver: impl FnMut(&CanonicalFilePath) -> bool,
    ) -> bool {
        let pattern = NamePattern::new(pattern, anchor_start, anchor_end, subsequence, ignore_case);
        let matches = {
            let paths = self.database.paths.read();
            let mut found = paths
                .known_files
                .keys()
                .filter(|file| file.file_name().is_some_and(|name| pattern.matches(name)))
                .cloned()
                .collect::<Vec<_>>();
            found.sort();
            found
        };

        for file in &matches {
            if !receiver(file) {
                return false;
            }
        }
        true
    }

    /// Enumerate `(source, line)` pairs for files that include `target`.
    pub fn foreach_file_including_file(
        &self,
        target: &CanonicalFilePath,
        mut receiver: impl FnMut(&CanonicalFilePath, u32) -> bool,
    ) -> bool {
        let edges = self.collect_edges(|edge| &edge.target == target);
        let mut seen = HashSet::new();
        for edge in &edges {
            if !seen.insert((edge.source.clone(), edge.line)) {
                continue;
            }
            if !receiver(&edge.source, edge.line) {
                return false;
            }
        }
        true
    }

    /// Enumerate `(target, line)` pairs for files included by `source`.
    pub fn foreach_file_included_by_file(
        &self,
        source: &CanonicalFilePath,
        mut receiver: impl FnMut(&CanonicalFilePath, u32) -> bool,
    ) -> bool {
        let edges = self.collect_edges(|edge| &edge.source == source);
        let mut seen = HashSet::new();
        for edge in &edges {
            if !seen.insert((edge.target.clone(), edge.line)) {
                continue;
            }
            if !receiver(&edge.target, edge.line) {
                return false;
            }
        }
        true
    }

    pub fn foreach_include_of_unit(
        &self,
        unit_name: &str,
        mut receiver: impl FnMut(&CanonicalFilePath, &CanonicalFilePath, u32) -> bool,
    ) -> bool {
        let edges = {
            let paths = self.database.paths.read();
            paths
                .includes_of_unit
                .get(unit_name)
                .cloned()
                .unwrap_or_default()
        };
        for edge in &edges {
            if !receiver(&edge.source, &edge.target, edge.line) {
                return false;
            }
        }
        true
    }

    fn collect_edges(&self, keep: impl Fn(&IncludeEdge) -> bool) -> Vec<IncludeEdge> {
        let paths = self.database.paths.read();
        let mut edges = paths
            .includes_of_unit
            .iter()
            .filter(|(unit, _)| self.visibility.is_unit_visible(unit))
            .flat_map(|(_, edges)| edges.iter())
            .filter(|edge| keep(edge))
            .cloned()
            .collect::<Vec<_>>();
        edges.sort_by(|a, b| (&a.source, &a.target, a.line).cmp(&(&b.source, &b.target, b.line)));
        edges
    }

    // =========================================================================
    // Ingestion (datastore entry points)
    // =========================================================================

    /// Register the file set and include graph of one unit. Returns the
    /// canonical forms of the unit's files.
    pub fn add_unit_paths(&self, record: &StoreUnitRecord) -> Vec<CanonicalFilePath> {
        let mut canonical_files = Vec::with_capacity(record.files.len());
        let mut paths = self.database.paths.write();

        for file in &record.files {
            let canonical = self.cache.canonicalize(file);
            *paths.known_files.entry(canonical.clone()).or_insert(0) += 1;
            paths
                .units_containing_file
                .entry(canonical.clone())
                .or_default()
                .insert(record.unit_name.clone());
            canonical_files.push(canonical);
        }
        paths
            .files_of_unit
            .insert(record.unit_name.clone(), canonical_files.clone());

        let edges = record
            .includes
            .iter()
            .map(|include| IncludeEdge {
                source: self.cache.canonicalize(&include.source),
                target: self.cache.canonicalize(&include.target),
                line: include.line,
            })
            .collect();
        paths.includes_of_unit.insert(record.unit_name.clone(), edges);

        canonical_files
    }

    /// Drop the path records of one unit.
    pub fn remove_unit(&self, unit_name: &str) {
        let mut paths = self.database.paths.write();
        let files = paths.files_of_unit.remove(unit_name).unwrap_or_default();
        for file in files {
            if let Some(count) = paths.known_files.get_mut(&file) {
                *count -= 1;
                if *count == 0 {
                    paths.known_files.remove(&file);
                }
            }
            if let Some(units) = paths.units_containing_file.get_mut(&file) {
                units.remove(unit_name);
                if units.is_empty() {
                    paths.units_containing_file.remove(&file);
                }
            }
        }
        paths.includes_of_unit.remove(unit_name);
    }
}
