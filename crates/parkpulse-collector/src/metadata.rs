//! Wiki metadata sync.
//!
//! The wiki source is the only one that knows entity categories (SHOW,
//! MEET_AND_GREET, ...) and reliable coordinates. For every park with a
//! reconciled wiki id, walk its child entities, resolve them against our
//! rides, and fill in category and the wiki id itself for future exact
//! matches.

use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use parkpulse_core::types::{Park, RideCategory};
use parkpulse_upstream::WikiParksClient;

use crate::resolver::EntityResolver;

/// Counters from one metadata sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataOutcome {
    pub parks_processed: u32,
    pub rides_updated: u32,
    pub unmatched: u32,
}

/// Sync wiki metadata for every park that has a wiki entity id.
pub async fn sync_metadata(
    pool: &PgPool,
    client: &WikiParksClient,
) -> anyhow::Result<MetadataOutcome> {
    let parks: Vec<Park> = sqlx::query_as(
        "SELECT * FROM parks WHERE is_active = TRUE AND wiki_entity_id IS NOT NULL",
    )
    .fetch_all(pool)
    .await?;

    let resolver = Mutex::new(EntityResolver::new(false));
    let mut outcome = MetadataOutcome::default();

    for park in parks {
        let Some(wiki_id) = park.wiki_entity_id.as_deref() else {
            continue;
        };
        outcome.parks_processed += 1;

        // Backfill coordinates from the park's own entity document
        if park.latitude.is_none() || park.longitude.is_none() {
            match client.get_entity(wiki_id).await {
                Ok(doc) => {
                    if let Some(location) = doc.location {
                        sqlx::query(
                            r"
                            UPDATE parks
                            SET latitude = COALESCE(latitude, $2),
                                longitude = COALESCE(longitude, $3)
                            WHERE park_id = $1
                            ",
                        )
                        .bind(park.park_id)
                        .bind(location.latitude)
                        .bind(location.longitude)
                        .execute(pool)
                        .await?;
                    }
                }
                Err(e) => warn!(park = %park.name, error = %e, "Could not fetch park entity"),
            }
        }

        let children = match client.list_children(wiki_id).await {
            Ok(children) => children,
            Err(e) => {
                warn!(park = %park.name, error = %e, "Could not list wiki children");
                continue;
            }
        };

        for child in children {
            let Some(category) = map_entity_type(&child.entity_type) else {
                // Restaurants, hotels, and the like are not tracked
                continue;
            };

            let mapping = {
                let mut resolver = resolver.lock().await;
                resolver
                    .resolve_ride(pool, park.park_id, Some(&child.id), &child.name)
                    .await?
            };

            match mapping.ride_id {
                Some(ride_id) => {
                    sqlx::query(
                        r"
                        UPDATE rides
                        SET category = $2,
                            wiki_entity_id = COALESCE(wiki_entity_id, $3)
                        WHERE ride_id = $1
                        ",
                    )
                    .bind(ride_id)
                    .bind(category.as_str())
                    .bind(&child.id)
                    .execute(pool)
                    .await?;
                    outcome.rides_updated += 1;
                }
                None => {
                    debug!(entity = %child.name, park = %park.name, "No ride match for wiki entity");
                    outcome.unmatched += 1;
                }
            }
        }
    }

    info!(
        parks = outcome.parks_processed,
        rides = outcome.rides_updated,
        unmatched = outcome.unmatched,
        "Wiki metadata sync complete"
    );
    Ok(outcome)
}

/// Map a wiki entityType to our category enum.
fn map_entity_type(entity_type: &str) -> Option<RideCategory> {
    match entity_type {
        "ATTRACTION" => Some(RideCategory::Attraction),
        "SHOW" => Some(RideCategory::Show),
        "MEET_AND_GREET" => Some(RideCategory::MeetAndGreet),
        "EXPERIENCE" => Some(RideCategory::Experience),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_mapping() {
        assert_eq!(map_entity_type("ATTRACTION"), Some(RideCategory::Attraction));
        assert_eq!(map_entity_type("SHOW"), Some(RideCategory::Show));
        assert_eq!(
            map_entity_type("MEET_AND_GREET"),
            Some(RideCategory::MeetAndGreet)
        );
        // Untracked entity types are dropped
        assert_eq!(map_entity_type("RESTAURANT"), None);
        assert_eq!(map_entity_type("HOTEL"), None);
    }
}
