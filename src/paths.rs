//! Canonical file path interning.
//!
//! Two physically identical paths must map to the same key no matter how
//! the caller spelled them. The cache resolves spellings once and hands out
//! cheap shared handles; every path-keyed table in the index is keyed by
//! [`CanonicalFilePath`].

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use parking_lot::RwLock;
use std::sync::Arc;

/// A normalized, interned filesystem path.
///
/// Cheap to clone and hash; obtained from [`CanonicalPathCache`] or the
/// path sub-index, never built directly from caller input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalFilePath(Arc<Path>);

impl CanonicalFilePath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.0.to_path_buf()
    }

    /// Final path component, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|n| n.to_str())
    }
}

impl std::fmt::Display for CanonicalFilePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for CanonicalFilePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Cache from raw path spellings to canonical interned paths.
///
/// Resolution prefers the real filesystem (`fs::canonicalize`, which also
/// collapses symlinks); paths that do not exist fall back to lexical
/// normalization against the process working directory.
pub struct CanonicalPathCache {
    cache: RwLock<HashMap<PathBuf, CanonicalFilePath>>,
}

impl CanonicalPathCache {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Canonical form of `raw`, from cache or freshly resolved.
    pub fn canonicalize(&self, raw: &Path) -> CanonicalFilePath {
        if let Some(found) = self.cache.read().get(raw) {
            return found.clone();
        }

        let resolved = match std::fs::canonicalize(raw) {
            Ok(real) => real,
            Err(_) => lexical_normalize(raw),
        };
        let canonical = CanonicalFilePath(Arc::from(resolved.as_path()));

        self.cache
            .write()
            .insert(raw.to_path_buf(), canonical.clone());
        canonical
    }

    /// Number of distinct spellings resolved so far.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

impl Default for CanonicalPathCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute path with `.` and `..` components removed, without touching
/// the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_spellings_intern_to_same_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("main.code");
        std::fs::write(&file, "x").unwrap();

        let cache = CanonicalPathCache::new();
        let direct = cache.canonicalize(&file);
        let dotted = cache.canonicalize(&dir.path().join("./main.code"));
        let parented = cache.canonicalize(&dir.path().join("sub/../main.code"));

        assert_eq!(direct, dotted);
        assert_eq!(direct, parented);
    }

    #[test]
    fn test_missing_file_normalizes_lexically() {
        let cache = CanonicalPathCache::new();
        let a = cache.canonicalize(Path::new("/no/such/./dir/file.code"));
        let b = cache.canonicalize(Path::new("/no/such/dir/other/../file.code"));
        assert_eq!(a, b);
        assert_eq!(a.as_path(), Path::new("/no/such/dir/file.code"));
    }

    #[test]
    fn test_cache_reuses_resolutions() {
        let cache = CanonicalPathCache::new();
        let raw = Path::new("/no/such/file.code");
        let first = cache.canonicalize(raw);
        let second = cache.canonicalize(raw);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }
}
