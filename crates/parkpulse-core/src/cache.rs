//! In-memory cache layer using Moka.
//!
//! Provides short-TTL caches for ranking, chart, and heatmap query results.
//! Keys encode the full query shape (period + filter + limit), so a cache
//! entry can never serve a different query's payload.

use moka::future::Cache;
use std::time::Duration;

/// Application cache wrapper for all in-memory caches.
#[derive(Clone)]
pub struct AppCache {
    /// Cache for ranking query results, keyed by query shape.
    pub rankings: Cache<String, serde_json::Value>,
    /// Cache for chart query results.
    pub charts: Cache<String, serde_json::Value>,
    /// Cache for heatmap responses.
    pub heatmaps: Cache<String, serde_json::Value>,
}

impl AppCache {
    /// Create a new AppCache instance with configured caches.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rankings: Cache::builder()
                .max_capacity(500)
                .time_to_live(Duration::from_secs(60)) // one collection cycle at most
                .build(),

            charts: Cache::builder()
                .max_capacity(500)
                .time_to_live(Duration::from_secs(300)) // 5 minutes
                .build(),

            heatmaps: Cache::builder()
                .max_capacity(100)
                .time_to_live(Duration::from_secs(300)) // 5 minutes
                .build(),
        }
    }

    /// Build a cache key from the query shape.
    #[must_use]
    pub fn query_key(endpoint: &str, period: &str, filter: &str, limit: i64) -> String {
        format!("{endpoint}:{period}:{filter}:{limit}")
    }

    /// Clear all caches (useful for testing or manual invalidation).
    pub fn clear_all(&self) {
        self.rankings.invalidate_all();
        self.charts.invalidate_all();
        self.heatmaps.invalidate_all();
    }

    /// Get cache sizes for monitoring.
    #[must_use]
    pub fn get_stats(&self) -> CacheStats {
        CacheStats {
            rankings_size: self.rankings.entry_count(),
            charts_size: self.charts.entry_count(),
            heatmaps_size: self.heatmaps.entry_count(),
        }
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of entries in the rankings cache.
    pub rankings_size: u64,
    /// Number of entries in the charts cache.
    pub charts_size: u64,
    /// Number of entries in the heatmaps cache.
    pub heatmaps_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_key_encodes_full_shape() {
        let a = AppCache::query_key("parks/downtime", "today", "all-parks", 50);
        let b = AppCache::query_key("parks/downtime", "today", "disney-universal", 50);
        let c = AppCache::query_key("parks/downtime", "yesterday", "all-parks", 50);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let cache = AppCache::new();
        let key = AppCache::query_key("rides/waittimes", "live", "all-parks", 10);
        cache
            .rankings
            .insert(key.clone(), serde_json::json!([{"ride_id": 1}]))
            .await;

        let hit = cache.rankings.get(&key).await;
        assert!(hit.is_some());

        cache.clear_all();
        // moka invalidation is async-visible; run pending tasks
        cache.rankings.run_pending_tasks().await;
        assert_eq!(cache.rankings.entry_count(), 0);
    }
}
