//! Classification service: the four-step hierarchy.
//!
//! First match wins: manual override, cached match, pattern, AI. The
//! classification row and the ride's denormalized tier column are written
//! in the same transaction.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ClassifierError;
use crate::match_cache::{CachedEntry, MatchCache};
use crate::overrides::ManualOverrides;
use crate::patterns::PatternMatcher;
use crate::provider::TierModel;
use crate::types::{ClassificationMethod, TierAssignment};

/// Confidence recorded when every step fails and tier 2 is assumed.
const FALLBACK_CONFIDENCE: f64 = 0.50;

/// Ride tier classification service.
pub struct ClassificationService {
    overrides: ManualOverrides,
    cache: Mutex<MatchCache>,
    patterns: PatternMatcher,
    model: Option<Arc<dyn TierModel>>,
}

impl ClassificationService {
    /// Create a new service.
    #[must_use]
    pub fn new(
        overrides: ManualOverrides,
        cache: MatchCache,
        model: Option<Arc<dyn TierModel>>,
    ) -> Self {
        Self {
            overrides,
            cache: Mutex::new(cache),
            patterns: PatternMatcher::new(),
            model,
        }
    }

    /// Run the hierarchy for one ride.
    pub async fn classify(
        &self,
        park_id: i32,
        ride_id: i32,
        park_name: &str,
        ride_name: &str,
    ) -> TierAssignment {
        // Step 1: manual override
        if let Some((tier, reason)) = self.overrides.get(park_id, ride_id) {
            return TierAssignment::new(
                tier,
                ClassificationMethod::ManualOverride,
                1.00,
                reason,
            );
        }

        // Step 2: exact cached match
        if let Some(entry) = self.cache.lock().await.get(park_id, ride_id) {
            return TierAssignment::new(
                entry.tier,
                ClassificationMethod::CachedMatch,
                entry.confidence,
                entry.reasoning.clone().unwrap_or_default(),
            );
        }

        // Step 3: keyword patterns
        if let Some(pattern) = self.patterns.classify(ride_name) {
            return TierAssignment::new(
                pattern.tier,
                ClassificationMethod::Pattern,
                pattern.confidence,
                format!("matched pattern '{}'", pattern.matched_pattern),
            );
        }

        // Step 4: AI, falling back to the tier-2 default
        if let Some(model) = self.model.as_ref() {
            match model.classify(park_name, ride_name).await {
                Ok(result) => {
                    let assignment = TierAssignment::new(
                        result.tier,
                        ClassificationMethod::Ai,
                        result.confidence,
                        result.reasoning.clone(),
                    )
                    .with_sources(result.research_sources.clone());

                    // Cache on success so a ride is researched once
                    let cached = CachedEntry {
                        tier: result.tier,
                        confidence: result.confidence,
                        category: Some(result.category),
                        reasoning: Some(result.reasoning),
                    };
                    if let Err(e) = self.cache.lock().await.insert(park_id, ride_id, cached) {
                        warn!(ride_id, error = %e, "Failed to persist classification cache");
                    }

                    return assignment;
                }
                Err(e) if e.should_fallback() => {
                    warn!(ride = %ride_name, error = %e, "AI classification failed, using default tier");
                }
                Err(e) => {
                    warn!(ride = %ride_name, error = %e, "AI classification failed");
                }
            }
        } else {
            debug!(ride = %ride_name, "No AI model configured, using default tier");
        }

        TierAssignment::new(
            2,
            ClassificationMethod::Ai,
            FALLBACK_CONFIDENCE,
            "default tier after unmatched patterns",
        )
    }

    /// Classify a ride and persist the result.
    ///
    /// Writes the canonical classification row and the denormalized tier
    /// column on the ride in one transaction; the two can never diverge.
    pub async fn classify_and_store(
        &self,
        pool: &PgPool,
        park_id: i32,
        ride_id: i32,
        park_name: &str,
        ride_name: &str,
    ) -> Result<TierAssignment, ClassifierError> {
        let assignment = self.classify(park_id, ride_id, park_name, ride_name).await;
        store_assignment(pool, ride_id, &assignment).await?;

        info!(
            ride_id,
            tier = assignment.tier,
            method = assignment.method.as_str(),
            confidence = assignment.confidence,
            "Classified ride"
        );
        Ok(assignment)
    }
}

/// Persist an assignment: classification row + ride tier, one transaction.
pub async fn store_assignment(
    pool: &PgPool,
    ride_id: i32,
    assignment: &TierAssignment,
) -> Result<(), ClassifierError> {
    let sources_json = if assignment.sources.is_empty() {
        None
    } else {
        serde_json::to_string(&assignment.sources).ok()
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        r"
        INSERT INTO ride_classifications
            (ride_id, tier, tier_weight, method, confidence, reasoning, sources, classified_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        ON CONFLICT (ride_id)
        DO UPDATE SET
            tier = EXCLUDED.tier,
            tier_weight = EXCLUDED.tier_weight,
            method = EXCLUDED.method,
            confidence = EXCLUDED.confidence,
            reasoning = EXCLUDED.reasoning,
            sources = EXCLUDED.sources,
            classified_at = NOW()
        ",
    )
    .bind(ride_id)
    .bind(assignment.tier)
    .bind(assignment.tier_weight)
    .bind(assignment.method.as_str())
    .bind(assignment.confidence)
    .bind(&assignment.reasoning)
    .bind(sources_json)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE rides SET tier = $2 WHERE ride_id = $1")
        .bind(ride_id)
        .bind(assignment.tier)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::types::AiClassification;

    struct StubModel {
        calls: AtomicU32,
        result: Result<AiClassification, ()>,
    }

    #[async_trait]
    impl TierModel for StubModel {
        async fn classify(
            &self,
            _park_name: &str,
            _ride_name: &str,
        ) -> Result<AiClassification, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .map_err(|()| ClassifierError::InvalidResponse("stubbed failure".into()))
        }
    }

    fn service_with_model(model: Option<Arc<dyn TierModel>>) -> ClassificationService {
        ClassificationService::new(ManualOverrides::empty(), MatchCache::in_memory(), model)
    }

    #[tokio::test]
    async fn test_pattern_step_wins_without_ai_call() {
        let model = Arc::new(StubModel {
            calls: AtomicU32::new(0),
            result: Err(()),
        });
        let service = service_with_model(Some(model.clone()));

        let result = service.classify(1, 10, "Park", "Space Mountain").await;
        assert_eq!(result.tier, 1);
        assert_eq!(result.method, ClassificationMethod::Pattern);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ai_success_is_cached() {
        let model = Arc::new(StubModel {
            calls: AtomicU32::new(0),
            result: Ok(AiClassification {
                tier: 1,
                category: "ATTRACTION".into(),
                confidence: 0.9,
                reasoning: "famous dark ride".into(),
                research_sources: vec!["https://example.com".into()],
            }),
        });
        let service = service_with_model(Some(model.clone()));

        // "Haunted Mansion" matches no pattern, so the AI runs once...
        let first = service.classify(1, 20, "Park", "Haunted Mansion").await;
        assert_eq!(first.method, ClassificationMethod::Ai);
        assert_eq!(first.tier, 1);

        // ...and the second classification hits the cache
        let second = service.classify(1, 20, "Park", "Haunted Mansion").await;
        assert_eq!(second.method, ClassificationMethod::CachedMatch);
        assert_eq!(second.tier, 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ai_failure_falls_back_to_default_tier() {
        let model = Arc::new(StubModel {
            calls: AtomicU32::new(0),
            result: Err(()),
        });
        let service = service_with_model(Some(model));

        let result = service.classify(1, 30, "Park", "Haunted Mansion").await;
        assert_eq!(result.tier, 2);
        assert_eq!(result.tier_weight, 2);
        assert_eq!(result.confidence, FALLBACK_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_no_model_uses_default_tier() {
        let service = service_with_model(None);
        let result = service.classify(1, 40, "Park", "Haunted Mansion").await;
        assert_eq!(result.tier, 2);
    }

    #[tokio::test]
    async fn test_weight_follows_tier_table() {
        let service = service_with_model(None);
        let coaster = service.classify(1, 50, "Park", "Big Coaster").await;
        assert_eq!(coaster.tier, 1);
        assert_eq!(coaster.tier_weight, 3);

        let carousel = service.classify(1, 51, "Park", "Grand Carousel").await;
        assert_eq!(carousel.tier, 3);
        assert_eq!(carousel.tier_weight, 1);
    }
}
