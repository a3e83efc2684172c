//! Path-normalizing adapter in front of the path sub-index.
//!
//! The façade routes every path-taking query through this adapter so that
//! caller-supplied spellings are canonicalized exactly once, at the
//! boundary, before any path-keyed lookup.

use std::path::Path;
use std::sync::Arc;

use crate::index::FilePathIndex;
use crate::paths::CanonicalFilePath;
use crate::types::StoreUnitInfo;

pub(crate) struct PathQueryAdapter {
    path_index: Arc<FilePathIndex>,
}

impl PathQueryAdapter {
    pub fn new(path_index: Arc<FilePathIndex>) -> Self {
        Self { path_index }
    }

    pub fn is_known_file(&self, file_path: &Path) -> bool {
        let canonical = self.path_index.get_canonical_path(file_path);
        self.path_index.is_known_file(&canonical)
    }

    pub fn foreach_main_unit_containing_file(
        &self,
        file_path: &Path,
        receiver: impl FnMut(&StoreUnitInfo) -> bool,
    ) -> bool {
        let canonical = self.path_index.get_canonical_path(file_path);
        self.path_index
            .foreach_main_unit_containing_file(&canonical, receiver)
    }

    pub fn foreach_file_including_file(
        &self,
        target_path: &Path,
        receiver: impl FnMut(&CanonicalFilePath, u32) -> bool,
    ) -> bool {
        let canonical = self.path_index.get_canonical_path(target_path);
        self.path_index
            .foreach_file_including_file(&canonical, receiver)
    }

    pub fn foreach_file_included_by_file(
        &self,
        source_path: &Path,
        receiver: impl FnMut(&CanonicalFilePath, u32) -> bool,
    ) -> bool {
        let canonical = self.path_index.get_canonical_path(source_path);
        self.path_index
            .foreach_file_included_by_file(&canonical, receiver)
    }
}
