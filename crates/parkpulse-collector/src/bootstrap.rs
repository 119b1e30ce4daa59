//! Park and ride bootstrap.
//!
//! Populates the parks and rides tables from the Queue-Times park list.
//! Run once at setup and again whenever new parks or rides appear; every
//! write is an upsert keyed on the upstream id, so reruns are safe. The
//! company name from the group level drives the Disney/Universal flags:
//! "Walt Disney Attractions" covers EPCOT and Animal Kingdom, "Universal
//! Parks & Resorts" covers Epic Universe.

use sqlx::PgPool;
use tracing::{debug, info, warn};

use parkpulse_upstream::{QueueTimesClient, UpstreamPark};

/// Counters from one bootstrap run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapOutcome {
    pub parks_processed: u32,
    pub parks_written: u32,
    pub rides_written: u32,
    pub errors: u32,
}

/// Sync parks and rides from the upstream park list.
pub async fn sync_parks(
    pool: &PgPool,
    client: &QueueTimesClient,
    filter_country: Option<&str>,
) -> anyhow::Result<BootstrapOutcome> {
    let mut outcome = BootstrapOutcome::default();

    let parks = client.list_parks().await?;
    info!(parks = parks.len(), "Fetched upstream park list");

    for park in parks {
        let country_code = country_to_iso(&park.country);
        if let Some(filter) = filter_country {
            if !country_matches(filter, &park.country) {
                continue;
            }
        }

        outcome.parks_processed += 1;
        match upsert_park(pool, &park, &country_code).await {
            Ok(park_id) => {
                outcome.parks_written += 1;
                match sync_park_rides(pool, client, park_id, park.external_id).await {
                    Ok(rides) => outcome.rides_written += rides,
                    Err(e) => {
                        warn!(park = %park.name, error = %e, "Failed to sync rides");
                        outcome.errors += 1;
                    }
                }
            }
            Err(e) => {
                warn!(park = %park.name, error = %e, "Failed to upsert park");
                outcome.errors += 1;
            }
        }
    }

    info!(
        parks = outcome.parks_written,
        rides = outcome.rides_written,
        errors = outcome.errors,
        "Park bootstrap complete"
    );
    Ok(outcome)
}

async fn upsert_park(
    pool: &PgPool,
    park: &UpstreamPark,
    country_code: &str,
) -> Result<i32, sqlx::Error> {
    let company = park.company.to_lowercase();
    let is_disney = company.contains("disney");
    let is_universal = company.contains("universal");
    let operator = detect_operator(&park.name);

    let mut longitude = park.longitude;
    // The upstream feed occasionally drops the sign on US longitudes;
    // US parks are always west of the prime meridian
    if country_code == "US" {
        if let Some(lon) = longitude {
            if lon > 0.0 {
                warn!(park = %park.name, lon, "Fixing longitude sign for US park");
                longitude = Some(-lon);
            }
        }
    }

    let row: (i32,) = sqlx::query_as(
        r"
        INSERT INTO parks
            (queue_times_id, name, country, latitude, longitude, timezone,
             operator, is_disney, is_universal, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE)
        ON CONFLICT (queue_times_id)
        DO UPDATE SET
            name = EXCLUDED.name,
            country = EXCLUDED.country,
            latitude = EXCLUDED.latitude,
            longitude = EXCLUDED.longitude,
            timezone = EXCLUDED.timezone,
            operator = EXCLUDED.operator,
            is_disney = EXCLUDED.is_disney,
            is_universal = EXCLUDED.is_universal,
            is_active = TRUE
        RETURNING park_id
        ",
    )
    .bind(park.external_id)
    .bind(&park.name)
    .bind(country_code)
    .bind(park.latitude)
    .bind(longitude)
    .bind(&park.timezone)
    .bind(operator)
    .bind(is_disney)
    .bind(is_universal)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Upsert the rides of one park from its current wait-time listing.
async fn sync_park_rides(
    pool: &PgPool,
    client: &QueueTimesClient,
    park_id: i32,
    park_external_id: i64,
) -> Result<u32, sqlx::Error> {
    let snapshots = match client.fetch_current(park_external_id).await {
        Ok(snapshots) => snapshots,
        Err(e) => {
            warn!(park_external_id, error = %e, "Could not list rides");
            return Ok(0);
        }
    };

    let mut written = 0u32;
    for snapshot in snapshots {
        // Single Rider queues open and close independently of the ride
        if snapshot.ride_name.to_lowercase().contains("single rider") {
            debug!(ride = %snapshot.ride_name, "Skipping Single Rider line");
            continue;
        }
        let Some(external_id) = snapshot
            .external_ride_id
            .as_deref()
            .and_then(|id| id.parse::<i64>().ok())
        else {
            continue;
        };

        sqlx::query(
            r"
            INSERT INTO rides (park_id, queue_times_id, name, category, is_active)
            VALUES ($1, $2, $3, 'ATTRACTION', TRUE)
            ON CONFLICT (park_id, queue_times_id)
            DO UPDATE SET name = EXCLUDED.name, is_active = TRUE
            ",
        )
        .bind(park_id)
        .bind(external_id)
        .bind(&snapshot.ride_name)
        .execute(pool)
        .await?;
        written += 1;
    }

    Ok(written)
}

/// Convert an upstream country name to an ISO 3166-1 alpha-2 code.
#[must_use]
pub fn country_to_iso(country_name: &str) -> String {
    match country_name {
        "United States" | "US" => "US",
        "United Kingdom" => "GB",
        "Canada" => "CA",
        "France" => "FR",
        "Germany" => "DE",
        "Spain" => "ES",
        "Italy" => "IT",
        "Netherlands" => "NL",
        "Belgium" => "BE",
        "Japan" => "JP",
        "China" => "CN",
        "South Korea" => "KR",
        "Australia" => "AU",
        "Mexico" => "MX",
        "Brazil" => "BR",
        _ => "US",
    }
    .to_string()
}

fn country_matches(filter: &str, country: &str) -> bool {
    let filter = filter.to_uppercase();
    let country = country.to_uppercase();
    country == filter
        || (filter == "US" && country == "UNITED STATES")
        || (filter == "UNITED STATES" && country == "US")
}

/// Detect the park operator from its name.
fn detect_operator(park_name: &str) -> &'static str {
    let name = park_name.to_lowercase();
    if name.contains("disney") {
        "Disney"
    } else if name.contains("universal") {
        "Universal"
    } else if name.contains("cedar point") || name.contains("king's island") || name.contains("carowinds") {
        "Cedar Fair"
    } else if name.contains("six flags") {
        "Six Flags"
    } else if name.contains("seaworld") || name.contains("busch gardens") {
        "SeaWorld"
    } else {
        "Independent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_to_iso() {
        assert_eq!(country_to_iso("United States"), "US");
        assert_eq!(country_to_iso("United Kingdom"), "GB");
        assert_eq!(country_to_iso("Japan"), "JP");
        // Unknown names default to US
        assert_eq!(country_to_iso("Atlantis"), "US");
    }

    #[test]
    fn test_country_filter_accepts_both_spellings() {
        assert!(country_matches("US", "United States"));
        assert!(country_matches("US", "US"));
        assert!(country_matches("United States", "US"));
        assert!(!country_matches("US", "Canada"));
    }

    #[test]
    fn test_detect_operator() {
        assert_eq!(detect_operator("Disney's Hollywood Studios"), "Disney");
        assert_eq!(detect_operator("Universal Islands of Adventure"), "Universal");
        assert_eq!(detect_operator("Six Flags Over Texas"), "Six Flags");
        assert_eq!(detect_operator("Cedar Point"), "Cedar Fair");
        assert_eq!(detect_operator("Kennywood"), "Independent");
    }
}
