//! Entity resolver.
//!
//! Maps upstream identifiers to internal ids in three steps, short-
//! circuiting on the first hit:
//!
//! 1. Exact match on stored external UUID
//! 2. Exact match on (park_id, normalized name)
//! 3. Fuzzy match on normalized name, Levenshtein distance <= 3, accepted
//!    only at confidence >= 0.80
//!
//! Unmatched records are auto-created when enabled, otherwise dropped and
//! logged as `MAPPING_FAILED` by the caller. Per-park caches fill lazily
//! and are invalidated on any write within that park.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use sqlx::PgPool;
use tracing::{debug, info, warn};

/// Maximum Levenshtein distance for fuzzy matching.
const MAX_FUZZY_DISTANCE: usize = 3;

/// Minimum confidence for accepting a fuzzy match.
const MIN_CONFIDENCE: f64 = 0.80;

/// How a mapping was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    ExactUuid,
    ExactName,
    FuzzyName,
    Created,
    NotFound,
}

/// Result of an id mapping attempt.
#[derive(Debug, Clone)]
pub struct MappingResult {
    pub ride_id: Option<i32>,
    pub park_id: Option<i32>,
    pub match_type: MatchType,
    pub confidence: f64,
    pub matched_name: Option<String>,
    pub distance: Option<usize>,
}

impl MappingResult {
    fn not_found(park_id: Option<i32>) -> Self {
        Self {
            ride_id: None,
            park_id,
            match_type: MatchType::NotFound,
            confidence: 0.0,
            matched_name: None,
            distance: None,
        }
    }
}

/// Mapping statistics for one resolver lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingStats {
    pub exact_uuid: u64,
    pub exact_name: u64,
    pub fuzzy_name: u64,
    pub created: u64,
    pub not_found: u64,
    pub cache_hits: u64,
}

/// Maps upstream UUIDs and names to internal integer ids.
pub struct EntityResolver {
    auto_create: bool,
    ride_uuid_cache: HashMap<String, i32>,
    ride_name_cache: HashMap<(i32, String), i32>,
    rides_by_park: HashMap<i32, Vec<(i32, String)>>,
    park_external_cache: HashMap<String, i32>,
    stats: MappingStats,
}

impl EntityResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(auto_create: bool) -> Self {
        Self {
            auto_create,
            ride_uuid_cache: HashMap::new(),
            ride_name_cache: HashMap::new(),
            rides_by_park: HashMap::new(),
            park_external_cache: HashMap::new(),
            stats: MappingStats::default(),
        }
    }

    /// Current mapping statistics.
    #[must_use]
    pub const fn stats(&self) -> MappingStats {
        self.stats
    }

    /// Drop every cache entry for one park. Called after any write within
    /// that park.
    pub fn invalidate_park(&mut self, park_id: i32) {
        self.rides_by_park.remove(&park_id);
        self.ride_name_cache.retain(|(pid, _), _| *pid != park_id);
        // UUID cache entries cannot be keyed by park without a reverse
        // index; they are correct-by-construction (ids never move parks),
        // so they stay.
    }

    /// Resolve an upstream park identifier (numeric Queue-Times id or wiki
    /// UUID) to an internal park id.
    pub async fn resolve_park(
        &mut self,
        pool: &PgPool,
        external_id: &str,
    ) -> Result<Option<i32>, sqlx::Error> {
        if let Some(park_id) = self.park_external_cache.get(external_id) {
            self.stats.cache_hits += 1;
            return Ok(Some(*park_id));
        }

        let row: Option<(i32,)> = if let Ok(numeric) = external_id.parse::<i64>() {
            sqlx::query_as("SELECT park_id FROM parks WHERE queue_times_id = $1")
                .bind(numeric)
                .fetch_optional(pool)
                .await?
        } else {
            sqlx::query_as("SELECT park_id FROM parks WHERE wiki_entity_id = $1")
                .bind(external_id)
                .fetch_optional(pool)
                .await?
        };

        if let Some((park_id,)) = row {
            self.park_external_cache
                .insert(external_id.to_string(), park_id);
            return Ok(Some(park_id));
        }
        Ok(None)
    }

    /// Resolve an upstream ride to an internal ride id.
    pub async fn resolve_ride(
        &mut self,
        pool: &PgPool,
        park_id: i32,
        external_id: Option<&str>,
        name: &str,
    ) -> Result<MappingResult, sqlx::Error> {
        let normalized = normalize_name(name);

        // Step 1: exact external UUID
        if let Some(external) = external_id {
            if let Some(ride_id) = self.ride_uuid_cache.get(external) {
                self.stats.cache_hits += 1;
                return Ok(MappingResult {
                    ride_id: Some(*ride_id),
                    park_id: Some(park_id),
                    match_type: MatchType::ExactUuid,
                    confidence: 1.0,
                    matched_name: Some(name.to_string()),
                    distance: None,
                });
            }

            let row: Option<(i32,)> = sqlx::query_as(
                "SELECT ride_id FROM rides WHERE wiki_entity_id = $1 OR queue_times_id::TEXT = $1",
            )
            .bind(external)
            .fetch_optional(pool)
            .await?;

            if let Some((ride_id,)) = row {
                self.ride_uuid_cache.insert(external.to_string(), ride_id);
                self.stats.exact_uuid += 1;
                return Ok(MappingResult {
                    ride_id: Some(ride_id),
                    park_id: Some(park_id),
                    match_type: MatchType::ExactUuid,
                    confidence: 1.0,
                    matched_name: Some(name.to_string()),
                    distance: None,
                });
            }
        }

        // Step 2: exact normalized name within the park
        self.load_rides_for_park(pool, park_id).await?;
        let name_key = (park_id, normalized.clone());
        if let Some(ride_id) = self.ride_name_cache.get(&name_key) {
            self.stats.exact_name += 1;
            return Ok(MappingResult {
                ride_id: Some(*ride_id),
                park_id: Some(park_id),
                match_type: MatchType::ExactName,
                confidence: 1.0,
                matched_name: Some(name.to_string()),
                distance: None,
            });
        }

        // Step 3: fuzzy name within the park
        let mut best: Option<(i32, String, usize)> = None;
        if let Some(rides) = self.rides_by_park.get(&park_id) {
            for (ride_id, ride_name) in rides {
                let dist = levenshtein_distance(&normalized, ride_name);
                if dist <= MAX_FUZZY_DISTANCE
                    && best.as_ref().map_or(true, |(_, _, d)| dist < *d)
                {
                    best = Some((*ride_id, ride_name.clone(), dist));
                }
            }
        }

        if let Some((ride_id, matched_name, distance)) = best {
            let max_len = normalized.len().max(matched_name.len());
            let confidence = if max_len > 0 {
                1.0 - (distance as f64 / max_len as f64)
            } else {
                0.0
            };

            if confidence >= MIN_CONFIDENCE {
                // Remember the external UUID for future exact lookups
                if let Some(external) = external_id {
                    self.backfill_external_id(pool, ride_id, external).await?;
                }
                self.stats.fuzzy_name += 1;
                return Ok(MappingResult {
                    ride_id: Some(ride_id),
                    park_id: Some(park_id),
                    match_type: MatchType::FuzzyName,
                    confidence,
                    matched_name: Some(matched_name),
                    distance: Some(distance),
                });
            }
        }

        // Step 4: auto-create when enabled
        if self.auto_create {
            let generated_id = generated_external_id(external_id.unwrap_or(name));
            let row: (i32,) = sqlx::query_as(
                r"
                INSERT INTO rides
                    (park_id, queue_times_id, wiki_entity_id, name, category, tier, is_active)
                VALUES ($1, $2, $3, $4, 'ATTRACTION', 2, TRUE)
                RETURNING ride_id
                ",
            )
            .bind(park_id)
            .bind(generated_id)
            .bind(external_id)
            .bind(name)
            .fetch_one(pool)
            .await?;

            let ride_id = row.0;
            info!(ride_id, name = %name, "Auto-created unmatched ride");

            self.invalidate_park(park_id);
            if let Some(external) = external_id {
                self.ride_uuid_cache.insert(external.to_string(), ride_id);
            }
            self.stats.created += 1;
            return Ok(MappingResult {
                ride_id: Some(ride_id),
                park_id: Some(park_id),
                match_type: MatchType::Created,
                confidence: 1.0,
                matched_name: Some(name.to_string()),
                distance: None,
            });
        }

        self.stats.not_found += 1;
        warn!(
            external_id = external_id.unwrap_or("-"),
            name = %name,
            park_id,
            "Could not map ride"
        );
        Ok(MappingResult::not_found(Some(park_id)))
    }

    /// Load every ride of a park into the caches, once.
    async fn load_rides_for_park(
        &mut self,
        pool: &PgPool,
        park_id: i32,
    ) -> Result<(), sqlx::Error> {
        if self.rides_by_park.contains_key(&park_id) {
            return Ok(());
        }

        let rows: Vec<(i32, String, Option<String>)> = sqlx::query_as(
            "SELECT ride_id, name, wiki_entity_id FROM rides WHERE park_id = $1",
        )
        .bind(park_id)
        .fetch_all(pool)
        .await?;

        debug!(park_id, count = rows.len(), "Loaded park rides into resolver cache");

        let mut normalized_rides = Vec::with_capacity(rows.len());
        for (ride_id, name, wiki_id) in rows {
            let normalized = normalize_name(&name);
            self.ride_name_cache
                .insert((park_id, normalized.clone()), ride_id);
            if let Some(wiki_id) = wiki_id {
                self.ride_uuid_cache.insert(wiki_id, ride_id);
            }
            normalized_rides.push((ride_id, normalized));
        }
        self.rides_by_park.insert(park_id, normalized_rides);
        Ok(())
    }

    /// Write the upstream UUID back after a fuzzy match, when unset.
    async fn backfill_external_id(
        &mut self,
        pool: &PgPool,
        ride_id: i32,
        external_id: &str,
    ) -> Result<(), sqlx::Error> {
        let updated = sqlx::query(
            "UPDATE rides SET wiki_entity_id = $2 WHERE ride_id = $1 AND wiki_entity_id IS NULL",
        )
        .bind(ride_id)
        .bind(external_id)
        .execute(pool)
        .await?;

        if updated.rows_affected() > 0 {
            info!(ride_id, external_id = %external_id, "Backfilled ride external id");
            self.ride_uuid_cache.insert(external_id.to_string(), ride_id);
        }
        Ok(())
    }
}

/// Normalize a ride name for comparison.
///
/// Lowercases, strips apostrophes and trademark symbols, collapses
/// whitespace, and removes leading "the" and "disneys".
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}' | '\u{2122}' | '\u{00ae}'))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    for prefix in ["the ", "disneys "] {
        if let Some(rest) = collapsed.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    collapsed
}

/// Derive a stable negative external id from an upstream identifier.
///
/// Negative values distinguish generated ids from real Queue-Times ids.
fn generated_external_id(upstream_id: &str) -> i64 {
    let mut hasher = DefaultHasher::new();
    upstream_id.hash(&mut hasher);
    -((hasher.finish() % 1_000_000_000) as i64)
}

/// Calculate Levenshtein distance between two strings.
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let s1_len = s1_chars.len();
    let s2_len = s2_chars.len();

    if s1_len == 0 {
        return s2_len;
    }
    if s2_len == 0 {
        return s1_len;
    }

    let mut matrix = vec![vec![0; s2_len + 1]; s1_len + 1];

    for i in 0..=s1_len {
        matrix[i][0] = i;
    }
    for j in 0..=s2_len {
        matrix[0][j] = j;
    }

    for i in 1..=s1_len {
        for j in 1..=s2_len {
            let cost = usize::from(s1_chars[i - 1] != s2_chars[j - 1]);
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[s1_len][s2_len]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_strips() {
        assert_eq!(normalize_name("Space Mountain"), "space mountain");
        assert_eq!(normalize_name("Pirate's Cove\u{2122}"), "pirates cove");
        assert_eq!(normalize_name("  Big   Thunder  "), "big thunder");
    }

    #[test]
    fn test_normalize_drops_leading_articles() {
        assert_eq!(normalize_name("The Haunted Mansion"), "haunted mansion");
        assert_eq!(
            normalize_name("Disney's Animal Kingdom Safari"),
            "animal kingdom safari"
        );
        // "the" mid-name stays
        assert_eq!(
            normalize_name("Journey to the Center"),
            "journey to the center"
        );
    }

    #[test]
    fn test_levenshtein_basic() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("space mountain", "space mountain"), 0);
    }

    #[test]
    fn test_levenshtein_close_names() {
        // A one-character typo lands well inside the fuzzy threshold
        let d = levenshtein_distance("splash mountain", "splash montain");
        assert_eq!(d, 1);
        let max_len = "splash mountain".len();
        let confidence = 1.0 - d as f64 / max_len as f64;
        assert!(confidence >= MIN_CONFIDENCE);
    }

    #[test]
    fn test_short_names_fail_confidence_even_at_small_distance() {
        // "toad" vs "road": distance 1, confidence 0.75 < 0.80
        let d = levenshtein_distance("toad", "road");
        assert_eq!(d, 1);
        let confidence = 1.0 - d as f64 / 4.0;
        assert!(confidence < MIN_CONFIDENCE);
    }

    #[test]
    fn test_generated_external_id_is_negative_and_stable() {
        let a = generated_external_id("abc-123");
        let b = generated_external_id("abc-123");
        let c = generated_external_id("def-456");
        assert!(a <= 0);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
