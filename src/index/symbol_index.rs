//! Symbol sub-index: occurrence and canonical-symbol queries over the
//! database tables.
//!
//! Every `foreach_*` returns `true` when the enumeration ran to completion
//! and `false` when the receiver stopped it early. Receivers run with no
//! table lock held; matching occurrences are snapshotted first so a
//! receiver may issue further queries.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::paths::CanonicalFilePath;
use crate::storage::{Database, IndexStore};
use crate::types::{
    SymbolKind, SymbolOccurrenceRef, SymbolPropertySet, SymbolRoleSet,
};

use super::pattern::NamePattern;
use super::visibility::FileVisibilityChecker;

pub struct SymbolIndex {
    database: Arc<Database>,
    store: Arc<IndexStore>,
    visibility: Arc<FileVisibilityChecker>,
}

impl SymbolIndex {
    pub fn new(
        database: Arc<Database>,
        store: Arc<IndexStore>,
        visibility: Arc<FileVisibilityChecker>,
    ) -> Self {
        Self {
            database,
            store,
            visibility,
        }
    }

    // =========================================================================
    // Occurrence queries
    // =========================================================================

    /// Enumerate occurrences of the symbol identified by `usr` whose roles
    /// intersect `roles`. An empty role set matches every occurrence.
    pub fn foreach_symbol_occurrence_by_usr(
        &self,
        usr: &str,
        roles: SymbolRoleSet,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        let matches = {
            let tables = self.database.symbols.read();
            let Some(slots) = tables.by_usr.get(usr) else {
                return true;
            };
            slots
                .iter()
                .filter_map(|&slot| tables.occurrences[slot].clone())
                .filter(|occ| roles.is_empty() || occ.roles().intersects(roles))
                .collect::<Vec<_>>()
        };

        for occ in &matches {
            if !self.visibility.is_unit_visible(occ.unit_name()) {
                continue;
            }
            if !receiver(occ) {
                return false;
            }
        }
        true
    }

    /// Enumerate occurrences that carry a relation to the symbol
    /// identified by `usr` whose relation roles intersect `roles`.
    pub fn foreach_related_symbol_occurrence_by_usr(
        &self,
        usr: &str,
        roles: SymbolRoleSet,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        let matches = {
            let tables = self.database.symbols.read();
            let Some(slots) = tables.related_by_usr.get(usr) else {
                return true;
            };
            slots
                .iter()
                .filter_map(|&slot| tables.occurrences[slot].clone())
                .filter(|occ| {
                    occ.relations().iter().any(|rel| {
                        rel.symbol.usr.as_ref() == usr
                            && (roles.is_empty() || rel.roles.intersects(roles))
                    })
                })
                .collect::<Vec<_>>()
        };

        for occ in &matches {
            if !self.visibility.is_unit_visible(occ.unit_name()) {
                continue;
            }
            if !receiver(occ) {
                return false;
            }
        }
        true
    }

    // =========================================================================
    // Canonical-symbol queries
    // =========================================================================

    pub fn foreach_canonical_symbol_occurrence_by_usr(
        &self,
        usr: &str,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        let canonical = {
            let tables = self.database.symbols.read();
            tables
                .canonical_by_usr
                .get(usr)
                .and_then(|&slot| tables.occurrences[slot].clone())
        };

        match canonical {
            Some(occ) if self.visibility.is_unit_visible(occ.unit_name()) => receiver(&occ),
            _ => true,
        }
    }

    pub fn foreach_canonical_symbol_occurrence_by_name(
        &self,
        name: &str,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        let canonicals = {
            let tables = self.database.symbols.read();
            let Some(usrs) = tables.usrs_by_name.get(name) else {
                return true;
            };
            usrs.iter()
                .filter_map(|usr| tables.canonical_by_usr.get(usr))
                .filter_map(|&slot| tables.occurrences[slot].clone())
                .collect::<Vec<_>>()
        };

        for occ in &canonicals {
            if !self.visibility.is_unit_visible(occ.unit_name()) {
                continue;
            }
            if !receiver(occ) {
                return false;
            }
        }
        true
    }

    pub fn foreach_canonical_symbol_occurrence_containing_pattern(
        &self,
        pattern: &str,
        anchor_start: bool,
        anchor_end: bool,
        subsequence: bool,
        ignore_case: bool,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        let pattern = NamePattern::new(pattern, anchor_start, anchor_end, subsequence, ignore_case);
        let canonicals = {
            let tables = self.database.symbols.read();
            tables
                .usrs_by_name
                .iter()
                .filter(|(name, _)| pattern.matches(name))
                .flat_map(|(_, usrs)| usrs.iter())
                .filter_map(|usr| tables.canonical_by_usr.get(usr))
                .filter_map(|&slot| tables.occurrences[slot].clone())
                .collect::<Vec<_>>()
        };

        for occ in &canonicals {
            if !self.visibility.is_unit_visible(occ.unit_name()) {
                continue;
            }
            if !receiver(occ) {
                return false;
            }
        }
        true
    }

    /// Enumerate every distinct symbol name, in sorted order.
    pub fn foreach_symbol_name(&self, mut receiver: impl FnMut(&str) -> bool) -> bool {
        let names = {
            let tables = self.database.symbols.read();
            tables.usrs_by_name.keys().cloned().collect::<Vec<_>>()
        };
        for name in &names {
            if !receiver(name) {
                return false;
            }
        }
        true
    }

    pub fn count_of_canonical_symbols_with_kind(
        &self,
        kind: SymbolKind,
        workspace_only: bool,
    ) -> usize {
        let mut count = 0;
        self.foreach_canonical_symbol_occurrence_by_kind(kind, workspace_only, |_| {
            count += 1;
            true
        });
        count
    }

    pub fn foreach_canonical_symbol_occurrence_by_kind(
        &self,
        kind: SymbolKind,
        workspace_only: bool,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        let canonicals = {
            let tables = self.database.symbols.read();
            let mut found = tables
                .canonical_by_usr
                .values()
                .filter_map(|&slot| tables.occurrences[slot].clone())
                .filter(|occ| occ.symbol().kind == kind)
                .collect::<Vec<_>>();
            // Sorted for deterministic enumeration across hash-map layouts.
            found.sort_by(|a, b| a.symbol().usr.cmp(&b.symbol().usr));
            found
        };

        for occ in &canonicals {
            if !self.visibility.is_unit_visible(occ.unit_name()) {
                continue;
            }
            if workspace_only && !self.is_workspace_unit(occ.unit_name()) {
                continue;
            }
            if !receiver(occ) {
                return false;
            }
        }
        true
    }

    /// Enumerate unit-test symbols defined by the units producing the
    /// given output paths, deduplicated by USR.
    pub fn foreach_unit_test_symbol_referenced_by_output_paths(
        &self,
        out_paths: &[PathBuf],
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        let unit_names: Vec<Arc<str>> = {
            let units = self.database.units.read();
            out_paths
                .iter()
                .filter_map(|path| units.by_out_path.get(path))
                .map(|name| Arc::from(name.as_str()))
                .collect()
        };

        let candidates = {
            let tables = self.database.symbols.read();
            unit_names
                .iter()
                .filter_map(|unit| tables.by_unit.get(unit))
                .flatten()
                .filter_map(|&slot| tables.occurrences[slot].clone())
                .filter(|occ| {
                    occ.symbol()
                        .properties
                        .contains(SymbolPropertySet::UNIT_TEST)
                })
                .collect::<Vec<_>>()
        };

        let mut seen = HashSet::new();
        for occ in &candidates {
            if !seen.insert(occ.symbol().usr.clone()) {
                continue;
            }
            if !receiver(occ) {
                return false;
            }
        }
        true
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn print_stats(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let (occurrence_count, symbol_count, name_count, unit_count) = {
            let tables = self.database.symbols.read();
            (
                tables.occurrences.iter().filter(|o| o.is_some()).count(),
                tables.canonical_by_usr.len(),
                tables.usrs_by_name.len(),
                tables.by_unit.len(),
            )
        };
        writeln!(out, "store: {}", self.store.store_path().display())?;
        writeln!(out, "database: {}", self.database.path().display())?;
        writeln!(out, "units: {unit_count}")?;
        writeln!(out, "symbols: {symbol_count}")?;
        writeln!(out, "symbol names: {name_count}")?;
        writeln!(out, "occurrences: {occurrence_count}")?;
        Ok(())
    }

    pub fn dump_provider_file_associations(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let tables = self.database.symbols.read();
        for (provider, files) in &tables.provider_files {
            writeln!(out, "{provider}:")?;
            for file in files {
                writeln!(out, "  {}", file.display())?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Ingestion (datastore entry points)
    // =========================================================================

    /// Register the occurrences of one unit.
    pub fn add_unit_symbols(&self, unit_name: &str, occurrences: Vec<SymbolOccurrenceRef>) {
        let mut tables = self.database.symbols.write();
        let unit: Arc<str> = Arc::from(unit_name);

        for occ in occurrences {
            let slot = tables.occurrences.len();
            let usr = occ.symbol().usr.clone();
            let name = occ.symbol().name.clone();

            tables.by_usr.entry(usr.clone()).or_default().push(slot);
            for relation in occ.relations() {
                tables
                    .related_by_usr
                    .entry(relation.symbol.usr.clone())
                    .or_default()
                    .push(slot);
            }
            tables.by_unit.entry(unit.clone()).or_default().push(slot);

            let usrs = tables.usrs_by_name.entry(name).or_default();
            if !usrs.contains(&usr) {
                usrs.push(usr.clone());
            }

            let replace = match tables.canonical_by_usr.get(&usr) {
                Some(&current) => {
                    let current_rank = tables.occurrences[current]
                        .as_ref()
                        .map(|o| canonical_rank(o.roles()))
                        .unwrap_or(usize::MAX);
                    canonical_rank(occ.roles()) < current_rank
                }
                None => true,
            };
            if replace {
                tables.canonical_by_usr.insert(usr, slot);
            }

            tables.occurrences.push(Some(occ));
        }
    }

    /// Record which files a provider contributed, for diagnostics.
    pub fn associate_provider_files(&self, provider: &str, files: &[CanonicalFilePath]) {
        let mut tables = self.database.symbols.write();
        let entry = tables
            .provider_files
            .entry(provider.to_string())
            .or_default();
        for file in files {
            entry.insert(file.to_path_buf());
        }
    }

    /// Drop every occurrence registered for `unit_name`.
    pub fn remove_unit(&self, unit_name: &str) {
        let mut tables = self.database.symbols.write();
        let Some(slots) = tables.by_unit.remove(unit_name) else {
            return;
        };

        let mut affected: Vec<(Arc<str>, Arc<str>)> = Vec::new();
        for slot in slots {
            let Some(occ) = tables.occurrences[slot].take() else {
                continue;
            };
            let usr = occ.symbol().usr.clone();
            let name = occ.symbol().name.clone();
            affected.push((usr.clone(), name));

            if let Some(entries) = tables.by_usr.get_mut(&usr) {
                entries.retain(|&s| s != slot);
            }
            for relation in occ.relations() {
                let now_empty = match tables.related_by_usr.get_mut(&relation.symbol.usr) {
                    Some(entries) => {
                        entries.retain(|&s| s != slot);
                        entries.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    tables.related_by_usr.remove(&relation.symbol.usr);
                }
            }
        }

        for (usr, name) in affected {
            let remaining = tables.by_usr.get(&usr).map(|v| v.clone()).unwrap_or_default();
            if remaining.is_empty() {
                tables.by_usr.remove(&usr);
                tables.canonical_by_usr.remove(&usr);
                if let Some(usrs) = tables.usrs_by_name.get_mut(&name) {
                    usrs.retain(|u| u != &usr);
                    if usrs.is_empty() {
                        tables.usrs_by_name.remove(&name);
                    }
                }
                continue;
            }

            let best = remaining
                .iter()
                .filter_map(|&slot| {
                    tables.occurrences[slot]
                        .as_ref()
                        .map(|o| (canonical_rank(o.roles()), slot))
                })
                .min();
            if let Some((_, slot)) = best {
                tables.canonical_by_usr.insert(usr, slot);
            }
        }
    }

    fn is_workspace_unit(&self, unit_name: &str) -> bool {
        let units = self.database.units.read();
        units
            .by_name
            .get(unit_name)
            .map(|entry| !entry.is_system)
            .unwrap_or(true)
    }
}

/// Preference order for the canonical occurrence of a USR: definitions
/// first, then declarations, then anything else.
fn canonical_rank(roles: SymbolRoleSet) -> usize {
    if roles.contains(SymbolRoleSet::DEFINITION) {
        0
    } else if roles.contains(SymbolRoleSet::DECLARATION) {
        1
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::CanonicalPathCache;
    use crate::storage::IndexStoreLibrary;
    use crate::types::{Symbol, SymbolLocation, SymbolOccurrence, SymbolRelation};
    use std::path::Path;

    struct Fixture {
        _dir: tempfile::TempDir,
        cache: Arc<CanonicalPathCache>,
        index: SymbolIndex,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::TempDir::new().unwrap();
        let database = Database::create(&dir.path().join("db"), false, None).unwrap();
        let store_path = dir.path().join("store");
        std::fs::create_dir_all(&store_path).unwrap();
        let store = IndexStore::create(&store_path, IndexStoreLibrary::new(1)).unwrap();
        let cache = Arc::new(CanonicalPathCache::new());
        let visibility = Arc::new(FileVisibilityChecker::new(
            database.clone(),
            cache.clone(),
            false,
        ));
        let index = SymbolIndex::new(database, store, visibility);
        Fixture {
            _dir: dir,
            cache,
            index,
        }
    }

    fn occurrence(
        fixture: &Fixture,
        usr: &str,
        name: &str,
        kind: SymbolKind,
        roles: SymbolRoleSet,
        line: u32,
    ) -> SymbolOccurrenceRef {
        Arc::new(SymbolOccurrence::new(
            Arc::new(Symbol::new(usr, name, kind)),
            roles,
            SymbolLocation {
                path: fixture.cache.canonicalize(Path::new("/src/a.code")),
                line,
                column: 1,
            },
            "unit-a",
            Vec::new(),
        ))
    }

    #[test]
    fn test_role_filtered_enumeration() {
        let f = fixture();
        f.index.add_unit_symbols(
            "unit-a",
            vec![
                occurrence(
                    &f,
                    "c:f",
                    "f",
                    SymbolKind::Function,
                    SymbolRoleSet::DEFINITION,
                    1,
                ),
                occurrence(&f, "c:f", "f", SymbolKind::Function, SymbolRoleSet::CALL, 9),
            ],
        );

        let mut calls = 0;
        assert!(f
            .index
            .foreach_symbol_occurrence_by_usr("c:f", SymbolRoleSet::CALL, |occ| {
                assert!(occ.roles().contains(SymbolRoleSet::CALL));
                calls += 1;
                true
            }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_early_termination_propagates() {
        let f = fixture();
        f.index.add_unit_symbols(
            "unit-a",
            vec![
                occurrence(&f, "c:f", "f", SymbolKind::Function, SymbolRoleSet::CALL, 1),
                occurrence(&f, "c:f", "f", SymbolKind::Function, SymbolRoleSet::CALL, 2),
                occurrence(&f, "c:f", "f", SymbolKind::Function, SymbolRoleSet::CALL, 3),
            ],
        );

        let mut seen = 0;
        let completed =
            f.index
                .foreach_symbol_occurrence_by_usr("c:f", SymbolRoleSet::CALL, |_| {
                    seen += 1;
                    seen < 2
                });
        assert!(!completed);
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_canonical_prefers_definition() {
        let f = fixture();
        f.index.add_unit_symbols(
            "unit-a",
            vec![
                occurrence(
                    &f,
                    "c:f",
                    "f",
                    SymbolKind::Function,
                    SymbolRoleSet::DECLARATION,
                    1,
                ),
                occurrence(
                    &f,
                    "c:f",
                    "f",
                    SymbolKind::Function,
                    SymbolRoleSet::DEFINITION,
                    5,
                ),
            ],
        );

        let mut lines = Vec::new();
        f.index.foreach_canonical_symbol_occurrence_by_usr("c:f", |occ| {
            lines.push(occ.location().line);
            true
        });
        assert_eq!(lines, vec![5]);
    }

    #[test]
    fn test_remove_unit_drops_occurrences() {
        let f = fixture();
        f.index.add_unit_symbols(
            "unit-a",
            vec![occurrence(
                &f,
                "c:f",
                "f",
                SymbolKind::Function,
                SymbolRoleSet::DEFINITION,
                1,
            )],
        );
        f.index.remove_unit("unit-a");

        let mut seen = 0;
        f.index
            .foreach_symbol_occurrence_by_usr("c:f", SymbolRoleSet::empty(), |_| {
                seen += 1;
                true
            });
        assert_eq!(seen, 0);
        assert!(f.index.foreach_symbol_name(|_| false));
    }

    #[test]
    fn test_remove_unit_drops_empty_relation_entries() {
        let f = fixture();
        let receiver = Arc::new(Symbol::new("c:D", "D", SymbolKind::Class));
        let occ = Arc::new(SymbolOccurrence::new(
            Arc::new(Symbol::new("c:m", "m", SymbolKind::InstanceMethod)),
            SymbolRoleSet::CALL,
            SymbolLocation {
                path: f.cache.canonicalize(Path::new("/src/a.code")),
                line: 4,
                column: 1,
            },
            "unit-a",
            vec![SymbolRelation {
                roles: SymbolRoleSet::REL_RECEIVED_BY,
                symbol: receiver,
            }],
        ));
        f.index.add_unit_symbols("unit-a", vec![occ]);
        {
            let tables = f.index.database.symbols.read();
            assert!(tables.related_by_usr.contains_key("c:D"));
        }

        // Repeated remove/re-register cycles must not accumulate stale
        // relation keys.
        f.index.remove_unit("unit-a");

        let tables = f.index.database.symbols.read();
        assert!(tables.related_by_usr.is_empty());
        assert!(tables.by_usr.is_empty());
    }

    #[test]
    fn test_pattern_query_finds_names() {
        let f = fixture();
        f.index.add_unit_symbols(
            "unit-a",
            vec![
                occurrence(
                    &f,
                    "c:redrawAll",
                    "redrawAll",
                    SymbolKind::Function,
                    SymbolRoleSet::DEFINITION,
                    1,
                ),
                occurrence(
                    &f,
                    "c:resize",
                    "resize",
                    SymbolKind::Function,
                    SymbolRoleSet::DEFINITION,
                    2,
                ),
            ],
        );

        let mut names = Vec::new();
        f.index
            .foreach_canonical_symbol_occurrence_containing_pattern(
                "draw", false, false, false, true,
                |occ| {
                    names.push(occ.symbol().name.to_string());
                    true
                },
            );
        assert_eq!(names, vec!["redrawAll"]);
    }
}
