//! Extraction cache keyed by path and content hash
//!
//! Lives inside a [`crate::context::RunContext`], so repeated runs over the
//! same project (watch mode) only re-extract files whose bytes changed.

use crate::parser::FileExtraction;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct CacheEntry {
    content_hash: String,
    extraction: Arc<FileExtraction>,
}

/// Per-context cache of extraction results
#[derive(Debug, Default)]
pub struct ExtractionCache {
    files: HashMap<PathBuf, CacheEntry>,
    hits: usize,
    misses: usize,
}

impl ExtractionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached extraction for `path`, only if the content hash still matches
    pub fn get(&mut self, path: &Path, content_hash: &str) -> Option<Arc<FileExtraction>> {
        match self.files.get(path) {
            Some(entry) if entry.content_hash == content_hash => {
                self.hits += 1;
                Some(Arc::clone(&entry.extraction))
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, path: PathBuf, content_hash: String, extraction: Arc<FileExtraction>) {
        self.files.insert(
            path,
            CacheEntry {
                content_hash,
                extraction,
            },
        );
    }

    /// Drop entries for files that are no longer part of the scan
    pub fn retain_paths<'a>(&mut self, live: impl IntoIterator<Item = &'a Path>) {
        let live: std::collections::HashSet<&Path> = live.into_iter().collect();
        self.files.retain(|path, _| live.contains(path.as_path()));
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_files: self.files.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total_files: usize,
    pub hits: usize,
    pub misses: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} files cached, {} hits, {} misses",
            self.total_files, self.hits, self.misses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_requires_matching_hash() {
        let mut cache = ExtractionCache::new();
        cache.insert(
            PathBuf::from("a.py"),
            "abc".to_string(),
            Arc::new(FileExtraction::opaque()),
        );

        assert!(cache.get(Path::new("a.py"), "abc").is_some());
        assert!(cache.get(Path::new("a.py"), "def").is_none());
        assert!(cache.get(Path::new("b.py"), "abc").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.to_string(), "1 files cached, 1 hits, 2 misses");
    }

    #[test]
    fn test_retain_paths_prunes_deleted_files() {
        let mut cache = ExtractionCache::new();
        for name in ["a.py", "b.py"] {
            cache.insert(
                PathBuf::from(name),
                "h".to_string(),
                Arc::new(FileExtraction::opaque()),
            );
        }

        cache.retain_paths([Path::new("b.py")]);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(Path::new("b.py"), "h").is_some());
    }
}
