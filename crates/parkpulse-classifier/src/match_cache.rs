//! Exact-match classification cache.
//!
//! JSON file keyed by `"<park_id>:<ride_id>"` holding previously accepted
//! classifications. Successful AI classifications are written back so a
//! ride is only ever researched once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClassifierError;

/// One cached classification entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub tier: i32,
    pub confidence: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// File-backed exact-match cache.
#[derive(Debug, Clone, Default)]
pub struct MatchCache {
    path: Option<PathBuf>,
    entries: HashMap<String, CachedEntry>,
}

impl MatchCache {
    /// Create an in-memory cache with no backing file.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache from a JSON file; a missing file starts empty.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| ClassifierError::SourceFile(format!("{}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| ClassifierError::SourceFile(format!("{}: {e}", path.display())))?
        } else {
            HashMap::new()
        };

        debug!(count = entries.len(), path = %path.display(), "Loaded classification cache");
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
        })
    }

    fn key(park_id: i32, ride_id: i32) -> String {
        format!("{park_id}:{ride_id}")
    }

    /// Look up a cached classification.
    #[must_use]
    pub fn get(&self, park_id: i32, ride_id: i32) -> Option<&CachedEntry> {
        self.entries.get(&Self::key(park_id, ride_id))
    }

    /// Insert a classification and persist when file-backed.
    pub fn insert(
        &mut self,
        park_id: i32,
        ride_id: i32,
        entry: CachedEntry,
    ) -> Result<(), ClassifierError> {
        self.entries.insert(Self::key(park_id, ride_id), entry);
        self.save()
    }

    /// Persist the cache to its backing file, if any.
    pub fn save(&self) -> Result<(), ClassifierError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let raw = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| ClassifierError::SourceFile(e.to_string()))?;
        std::fs::write(path, raw)
            .map_err(|e| ClassifierError::SourceFile(format!("{}: {e}", path.display())))
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_round_trip() {
        let mut cache = MatchCache::in_memory();
        assert!(cache.get(1, 42).is_none());

        cache
            .insert(
                1,
                42,
                CachedEntry {
                    tier: 2,
                    confidence: 0.95,
                    category: Some("ATTRACTION".into()),
                    reasoning: None,
                },
            )
            .unwrap();

        let hit = cache.get(1, 42).unwrap();
        assert_eq!(hit.tier, 2);
        assert_eq!(hit.confidence, 0.95);
        // Different park, same ride id misses
        assert!(cache.get(2, 42).is_none());
    }

    #[test]
    fn test_file_backed_persistence() {
        let path = std::env::temp_dir().join(format!(
            "match-cache-test-{}-{:?}.json",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = std::fs::remove_file(&path);

        let mut cache = MatchCache::load(&path).unwrap();
        assert!(cache.is_empty());
        cache
            .insert(
                3,
                7,
                CachedEntry {
                    tier: 1,
                    confidence: 0.9,
                    category: None,
                    reasoning: Some("flagship coaster".into()),
                },
            )
            .unwrap();

        let reloaded = MatchCache::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get(3, 7).unwrap().tier, 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let path = std::env::temp_dir().join(format!(
            "match-cache-corrupt-{}-{:?}.json",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::write(&path, "not json at all").unwrap();
        assert!(MatchCache::load(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
