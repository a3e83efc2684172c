//! Construction, teardown, query forwarding, path canonicalization, and
//! unit bookkeeping through the system façade.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use symdex::storage::OccurrenceRecord;
use symdex::{
    GlobalIndexStoreLibraryProvider, IndexError, IndexStore, IndexStoreLibrary,
    IndexStoreLibraryProvider, IndexSystem, StoreUnitRecord, SymbolKind, SymbolPropertySet,
    SymbolRoleSet, SystemOptions,
};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    store_path: PathBuf,
    src_dir: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store_path = dir.path().join("store");
        let src_dir = dir.path().join("src");
        std::fs::create_dir_all(&store_path).unwrap();
        std::fs::create_dir_all(&src_dir).unwrap();
        Self {
            dir,
            store_path,
            src_dir,
        }
    }

    fn source_file(&self, name: &str) -> PathBuf {
        let path = self.src_dir.join(name);
        std::fs::write(&path, format!("// {name}\n")).unwrap();
        path
    }

    fn write_unit(&self, record: &StoreUnitRecord) {
        let store = IndexStore::create(&self.store_path, IndexStoreLibrary::new(1)).unwrap();
        store.write_unit(record).unwrap();
    }

    fn open(&self, options: SystemOptions) -> Arc<IndexSystem> {
        IndexSystem::create(
            &self.store_path,
            self.dir.path().join("db"),
            Arc::new(GlobalIndexStoreLibraryProvider),
            None,
            options,
        )
        .unwrap()
    }
}

fn unit_record(name: &str, main_file: &Path, files: Vec<PathBuf>) -> StoreUnitRecord {
    StoreUnitRecord {
        unit_name: name.to_string(),
        main_file: main_file.to_path_buf(),
        out_file: PathBuf::from(format!("/build/{name}.o")),
        provider: None,
        is_system: false,
        unit_dependencies: Vec::new(),
        files,
        includes: Vec::new(),
        occurrences: Vec::new(),
    }
}

fn definition(usr: &str, name: &str, kind: SymbolKind, file: &Path) -> OccurrenceRecord {
    OccurrenceRecord {
        usr: usr.to_string(),
        name: name.to_string(),
        kind,
        properties: Default::default(),
        roles: SymbolRoleSet::DEFINITION,
        file: file.to_path_buf(),
        line: 1,
        column: 1,
        relations: Vec::new(),
    }
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_create_without_store_library_fails() {
    struct NoLibraryProvider;
    impl IndexStoreLibraryProvider for NoLibraryProvider {
        fn library_for_store_path(&self, _store_path: &Path) -> Option<IndexStoreLibrary> {
            None
        }
    }

    let workspace = Workspace::new();
    let result = IndexSystem::create(
        &workspace.store_path,
        workspace.dir.path().join("db"),
        Arc::new(NoLibraryProvider),
        None,
        SystemOptions::default(),
    );
    assert!(matches!(result, Err(IndexError::StoreLibraryUnavailable)));
}

#[test]
fn test_create_readonly_with_missing_database_fails() {
    let workspace = Workspace::new();
    let result = IndexSystem::create(
        &workspace.store_path,
        workspace.dir.path().join("no-such-db"),
        Arc::new(GlobalIndexStoreLibraryProvider),
        None,
        SystemOptions {
            readonly: true,
            ..SystemOptions::default()
        },
    );
    assert!(matches!(result, Err(IndexError::Storage(_))));
}

#[test]
fn test_create_readonly_never_creates_the_store_path() {
    let workspace = Workspace::new();
    let missing_store = workspace.dir.path().join("no-such-store");
    std::fs::create_dir_all(workspace.dir.path().join("db")).unwrap();

    let result = IndexSystem::create(
        &missing_store,
        workspace.dir.path().join("db"),
        Arc::new(GlobalIndexStoreLibraryProvider),
        None,
        SystemOptions {
            readonly: true,
            ..SystemOptions::default()
        },
    );
    assert!(matches!(result, Err(IndexError::Storage(_))));
    assert!(!missing_store.exists());
}

#[test]
fn test_create_makes_missing_store_path_when_writable() {
    let workspace = Workspace::new();
    let fresh_store = workspace.dir.path().join("fresh-store");

    let system = IndexSystem::create(
        &fresh_store,
        workspace.dir.path().join("db"),
        Arc::new(GlobalIndexStoreLibraryProvider),
        None,
        SystemOptions::default(),
    )
    .unwrap();
    assert!(fresh_store.is_dir());
    assert_eq!(system.store_path(), fresh_store.as_path());
}

// =============================================================================
// Path canonicalization
// =============================================================================

#[test]
fn test_path_queries_accept_any_spelling() {
    let workspace = Workspace::new();
    let main = workspace.source_file("main.code");
    let header = workspace.source_file("util.h");

    let mut record = unit_record("app", &main, vec![main.clone(), header.clone()]);
    record.includes = vec![symdex::storage::IncludeRecord {
        source: main.clone(),
        target: header.clone(),
        line: 2,
    }];
    workspace.write_unit(&record);

    let system = workspace.open(SystemOptions::default());

    let dotted = workspace.src_dir.join("./main.code");
    let parented = workspace.src_dir.join("nested/../main.code");
    assert!(system.is_known_file(&main));
    assert!(system.is_known_file(&dotted));
    assert!(system.is_known_file(&parented));

    let mut units = Vec::new();
    assert!(system.foreach_main_unit_containing_file(&dotted, |info| {
        units.push(info.unit_name.clone());
        true
    }));
    assert_eq!(units, vec!["app"]);

    let spelled_header = workspace.src_dir.join("./util.h");
    let mut includers = Vec::new();
    assert!(system.foreach_file_including_file(&spelled_header, |source, line| {
        includers.push((source.to_path_buf(), line));
        true
    }));
    assert_eq!(includers.len(), 1);
    assert_eq!(includers[0].1, 2);

    let mut included = Vec::new();
    assert!(system.foreach_file_included_by_file(&parented, |target, line| {
        included.push((target.to_path_buf(), line));
        true
    }));
    assert_eq!(included.len(), 1);
    assert_eq!(included[0].1, 2);
}

// =============================================================================
// Unit queries and bookkeeping
// =============================================================================

#[test]
fn test_files_of_unit_follow_dependencies() {
    let workspace = Workspace::new();
    let app_main = workspace.source_file("app.code");
    let core_main = workspace.source_file("core.code");

    let mut app = unit_record("app", &app_main, vec![app_main.clone()]);
    app.unit_dependencies = vec!["core".to_string()];
    workspace.write_unit(&app);
    workspace.write_unit(&unit_record("core", &core_main, vec![core_main.clone()]));

    let system = workspace.open(SystemOptions::default());

    let mut direct = Vec::new();
    system.foreach_file_of_unit("app", false, |file| {
        direct.push(file.to_path_buf());
        true
    });
    assert_eq!(direct.len(), 1);

    let mut transitive = Vec::new();
    system.foreach_file_of_unit("app", true, |file| {
        transitive.push(file.to_path_buf());
        true
    });
    assert_eq!(transitive.len(), 2);
}

#[test]
fn test_out_of_date_queries() {
    let workspace = Workspace::new();
    let main = workspace.source_file("main.code");
    let other = workspace.source_file("other.code");
    workspace.write_unit(&unit_record("app", &main, vec![main.clone()]));

    let system = workspace.open(SystemOptions::default());
    let out_path = PathBuf::from("/build/app.o");

    assert!(system.is_unit_out_of_date(&out_path, std::slice::from_ref(&main)));
    assert!(!system.is_unit_out_of_date(&out_path, std::slice::from_ref(&other)));
    // Unknown output paths are out of date by definition.
    assert!(system.is_unit_out_of_date(Path::new("/build/ghost.o"), &[]));

    assert!(!system.is_unit_out_of_date_since(&out_path, SystemTime::UNIX_EPOCH));
    assert!(system
        .is_unit_out_of_date_since(&out_path, SystemTime::now() + Duration::from_secs(60)));
}

#[test]
fn test_purge_drops_units_gone_from_store() {
    let workspace = Workspace::new();
    let main = workspace.source_file("main.code");
    workspace.write_unit(&unit_record("app", &main, vec![main.clone()]));

    let system = workspace.open(SystemOptions::default());
    assert!(system.is_known_file(&main));

    std::fs::remove_file(workspace.store_path.join("units/app.json")).unwrap();
    system.purge_stale_data();
    assert!(!system.is_known_file(&main));
}

#[test]
fn test_poll_picks_up_new_units() {
    let workspace = Workspace::new();
    let system = workspace.open(SystemOptions::default());

    let main = workspace.source_file("late.code");
    workspace.write_unit(&unit_record("late", &main, vec![main.clone()]));
    assert!(!system.is_known_file(&main));

    system.poll_for_unit_changes_and_wait();
    assert!(system.is_known_file(&main));
}

// =============================================================================
// Explicit output units and registration ordering
// =============================================================================

#[test]
fn test_explicit_output_units_gate_visibility() {
    let workspace = Workspace::new();
    let main = workspace.source_file("main.code");
    let mut record = unit_record("app", &main, vec![main.clone()]);
    record.occurrences = vec![definition("c:f", "f", SymbolKind::Function, &main)];
    workspace.write_unit(&record);

    let system = workspace.open(SystemOptions {
        use_explicit_output_units: true,
        ..SystemOptions::default()
    });

    let mut seen = 0;
    system.foreach_symbol_occurrence_by_usr("c:f", SymbolRoleSet::empty(), |_| {
        seen += 1;
        true
    });
    assert_eq!(seen, 0, "unit visible before its output path was added");

    system.add_unit_out_file_paths(&[PathBuf::from("/build/app.o")], true);
    system.foreach_symbol_occurrence_by_usr("c:f", SymbolRoleSet::empty(), |_| {
        seen += 1;
        true
    });
    assert_eq!(seen, 1);

    system.remove_unit_out_file_paths(&[PathBuf::from("/build/app.o")], true);
    let mut after_removal = 0;
    system.foreach_symbol_occurrence_by_usr("c:f", SymbolRoleSet::empty(), |_| {
        after_removal += 1;
        true
    });
    assert_eq!(after_removal, 0);
}

#[test]
fn test_main_file_registration_round_trip() {
    let workspace = Workspace::new();
    let main = workspace.source_file("main.code");
    let system = workspace.open(SystemOptions::default());

    system.register_main_files(std::slice::from_ref(&main), "App");
    system.register_main_files(std::slice::from_ref(&main), "AppTests");
    system.unregister_main_files(std::slice::from_ref(&main), "App");
    system.unregister_main_files(std::slice::from_ref(&main), "AppTests");
}

// =============================================================================
// Symbol surface
// =============================================================================

#[test]
fn test_symbol_queries_through_facade() {
    let workspace = Workspace::new();
    let main = workspace.source_file("main.code");
    let mut record = unit_record("app", &main, vec![main.clone()]);
    record.occurrences = vec![
        definition("c:render", "render", SymbolKind::Function, &main),
        definition("c:Shape", "Shape", SymbolKind::Class, &main),
    ];
    workspace.write_unit(&record);

    let mut system_record = unit_record("sys", &main, vec![main.clone()]);
    system_record.is_system = true;
    system_record.occurrences = vec![definition("c:libc", "libc", SymbolKind::Class, &main)];
    workspace.write_unit(&system_record);

    let system = workspace.open(SystemOptions::default());

    let mut names = Vec::new();
    assert!(system.foreach_symbol_name(|name| {
        names.push(name.to_string());
        true
    }));
    assert_eq!(names, vec!["Shape", "libc", "render"]);

    let mut by_name = 0;
    system.foreach_canonical_symbol_occurrence_by_name("render", |occ| {
        assert_eq!(occ.symbol().usr.as_ref(), "c:render");
        by_name += 1;
        true
    });
    assert_eq!(by_name, 1);

    assert_eq!(
        system.count_of_canonical_symbols_with_kind(SymbolKind::Class, false),
        2
    );
    assert_eq!(
        system.count_of_canonical_symbols_with_kind(SymbolKind::Class, true),
        1
    );

    let mut matched = Vec::new();
    system.foreach_canonical_symbol_occurrence_containing_pattern(
        "rend", true, false, false, false,
        |occ| {
            matched.push(occ.symbol().name.to_string());
            true
        },
    );
    assert_eq!(matched, vec!["render"]);
}

#[test]
fn test_unit_test_symbols_by_output_path() {
    let workspace = Workspace::new();
    let main = workspace.source_file("tests.code");
    let mut record = unit_record("app-tests", &main, vec![main.clone()]);
    record.occurrences = vec![
        OccurrenceRecord {
            properties: SymbolPropertySet::UNIT_TEST,
            ..definition("c:testRender", "testRender", SymbolKind::InstanceMethod, &main)
        },
        definition("c:helper", "helper", SymbolKind::Function, &main),
    ];
    workspace.write_unit(&record);

    let system = workspace.open(SystemOptions::default());

    let mut tests = Vec::new();
    assert!(system.foreach_unit_test_symbol_referenced_by_output_paths(
        &[PathBuf::from("/build/app-tests.o")],
        |occ| {
            tests.push(occ.symbol().name.to_string());
            true
        }
    ));
    assert_eq!(tests, vec!["testRender"]);

    let mut none = Vec::new();
    system.foreach_unit_test_symbol_referenced_by_output_paths(
        &[PathBuf::from("/build/other.o")],
        |occ| {
            none.push(occ.symbol().name.to_string());
            true
        },
    );
    assert!(none.is_empty());
}

// =============================================================================
// Diagnostics
// =============================================================================

#[test]
fn test_print_stats_reports_counts() {
    let workspace = Workspace::new();
    let main = workspace.source_file("main.code");
    let mut record = unit_record("app", &main, vec![main.clone()]);
    record.provider = Some("clang".to_string());
    record.occurrences = vec![definition("c:f", "f", SymbolKind::Function, &main)];
    workspace.write_unit(&record);

    let system = workspace.open(SystemOptions::default());

    let mut stats = Vec::new();
    system.print_stats(&mut stats).unwrap();
    let stats = String::from_utf8(stats).unwrap();
    assert!(stats.contains("units: 1"));
    assert!(stats.contains("symbols: 1"));

    let mut associations = Vec::new();
    system
        .dump_provider_file_associations(&mut associations)
        .unwrap();
    let associations = String::from_utf8(associations).unwrap();
    assert!(associations.contains("clang:"));
    assert!(associations.contains("main.code"));
}
