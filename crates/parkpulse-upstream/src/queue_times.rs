//! Queue-Times API client (source A).
//!
//! Returns park-grouped JSON: top level is a list of operating companies
//! with nested parks. Wait times come back grouped by themed land, with
//! some parks also using a flat rides array; both framings are merged.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use parkpulse_core::UpstreamSnapshot;

use crate::error::UpstreamError;
use crate::retry::with_retry;

/// Queue-Times API base URL.
const BASE_URL: &str = "https://queue-times.com";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Normalized park record from `list_parks`.
///
/// The company name drives the Disney/Universal classification downstream;
/// "Walt Disney Attractions" covers EPCOT and Animal Kingdom, "Universal
/// Parks & Resorts" covers Epic Universe.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamPark {
    /// Queue-Times numeric park id
    pub external_id: i64,
    pub name: String,
    /// Owning company name from the group level
    pub company: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// IANA timezone name
    pub timezone: String,
}

// ==================== Vendor wire types ====================

#[derive(Debug, Deserialize)]
struct CompanyGroup {
    #[serde(default)]
    name: String,
    #[serde(default)]
    parks: Vec<VendorPark>,
}

#[derive(Debug, Deserialize)]
struct VendorPark {
    id: i64,
    name: String,
    #[serde(default)]
    country: String,
    latitude: Option<serde_json::Value>,
    longitude: Option<serde_json::Value>,
    #[serde(default)]
    timezone: String,
}

#[derive(Debug, Deserialize)]
struct WaitTimesResponse {
    #[serde(default)]
    lands: Vec<VendorLand>,
    #[serde(default)]
    rides: Vec<VendorRide>,
}

#[derive(Debug, Deserialize)]
struct VendorLand {
    #[serde(default)]
    rides: Vec<VendorRide>,
}

#[derive(Debug, Deserialize)]
struct VendorRide {
    id: i64,
    name: String,
    #[serde(default)]
    is_open: bool,
    wait_time: Option<i32>,
    last_updated: Option<String>,
}

// ==================== Client ====================

/// Queue-Times API client.
#[derive(Clone)]
pub struct QueueTimesClient {
    http_client: Client,
    base_url: String,
}

impl QueueTimesClient {
    /// Create a new Queue-Times client.
    ///
    /// # Panics
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn new(timeout_secs: Option<u64>) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(
                timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Create a client with a custom base URL (for tests against a mock server).
    #[must_use]
    pub fn with_base_url(base_url: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url,
        }
    }

    /// Make a GET request with retry logic.
    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<T, UpstreamError> {
        let url = format!("{}{}", self.base_url, endpoint);

        with_retry("queue-times", || async {
            debug!(endpoint = %endpoint, "Making Queue-Times API request");

            let response = self.http_client.get(&url).send().await?;
            let status = response.status();

            if status.is_success() {
                let body = response.text().await?;
                serde_json::from_str(&body).map_err(|e| {
                    UpstreamError::Parse(format!("{}: {}", e, &body[..200.min(body.len())]))
                })
            } else if status == reqwest::StatusCode::NOT_FOUND {
                Err(UpstreamError::NotFound(endpoint.to_string()))
            } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                Err(UpstreamError::RateLimited)
            } else {
                let body = response.text().await.unwrap_or_default();
                Err(UpstreamError::ApiError { status, body })
            }
        })
        .await
    }

    /// List all parks, flattened from company groups.
    ///
    /// # Errors
    /// Returns error if the API call fails or the response cannot be parsed.
    pub async fn list_parks(&self) -> Result<Vec<UpstreamPark>, UpstreamError> {
        debug!("Listing Queue-Times parks");
        let groups: Vec<CompanyGroup> = self.request("/parks.json").await?;

        let mut parks = Vec::new();
        for group in groups {
            for park in group.parks {
                parks.push(UpstreamPark {
                    external_id: park.id,
                    name: park.name,
                    company: group.name.clone(),
                    country: park.country,
                    latitude: coerce_coord(park.latitude.as_ref()),
                    longitude: coerce_coord(park.longitude.as_ref()),
                    timezone: if park.timezone.is_empty() {
                        "UTC".to_string()
                    } else {
                        park.timezone
                    },
                });
            }
        }

        debug!(count = parks.len(), "Retrieved parks");
        Ok(parks)
    }

    /// Fetch the current wait-time state for one park.
    ///
    /// Merges lands-nested and flat ride arrays into one normalized list.
    ///
    /// # Errors
    /// Returns error if the API call fails or the response cannot be parsed.
    pub async fn fetch_current(
        &self,
        park_external_id: i64,
    ) -> Result<Vec<UpstreamSnapshot>, UpstreamError> {
        let endpoint = format!("/parks/{park_external_id}/queue_times.json");
        let response: WaitTimesResponse = self.request(&endpoint).await?;

        let mut rides: Vec<VendorRide> = Vec::new();
        for land in response.lands {
            rides.extend(land.rides);
        }
        rides.extend(response.rides);

        let now = Utc::now();
        let snapshots = rides
            .into_iter()
            .map(|ride| UpstreamSnapshot {
                external_park_id: park_external_id.to_string(),
                external_ride_id: Some(ride.id.to_string()),
                ride_name: ride.name,
                timestamp: ride
                    .last_updated
                    .as_deref()
                    .and_then(parse_timestamp)
                    .unwrap_or(now),
                // Queue-Times has no explicit status enum
                status: None,
                wait_time_minutes: ride.wait_time,
                park_open_hint: Some(ride.is_open),
            })
            .collect();

        Ok(snapshots)
    }
}

/// Coordinates arrive as either numbers or strings; coerce both.
fn coerce_coord(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_coord_number() {
        let v = serde_json::json!(28.417);
        assert_eq!(coerce_coord(Some(&v)), Some(28.417));
    }

    #[test]
    fn test_coerce_coord_string() {
        let v = serde_json::json!("-81.581");
        assert_eq!(coerce_coord(Some(&v)), Some(-81.581));
    }

    #[test]
    fn test_coerce_coord_garbage() {
        let v = serde_json::json!("not-a-number");
        assert_eq!(coerce_coord(Some(&v)), None);
        assert_eq!(coerce_coord(None), None);
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("2025-06-01T14:05:00Z");
        assert!(ts.is_some());
        assert!(parse_timestamp("yesterday-ish").is_none());
    }

    #[test]
    fn test_company_groups_flatten() {
        let json = r#"[
            {"name": "Walt Disney Attractions", "parks": [
                {"id": 6, "name": "Magic Kingdom", "country": "United States",
                 "latitude": "28.417", "longitude": "-81.581",
                 "timezone": "America/New_York"}
            ]},
            {"name": "Six Flags", "parks": [
                {"id": 32, "name": "Six Flags Magic Mountain", "country": "United States",
                 "latitude": 34.425, "longitude": -118.597,
                 "timezone": "America/Los_Angeles"}
            ]}
        ]"#;
        let groups: Vec<CompanyGroup> = serde_json::from_str(json).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "Walt Disney Attractions");
        assert_eq!(groups[0].parks[0].id, 6);
    }

    #[test]
    fn test_wait_times_both_framings() {
        let json = r#"{
            "lands": [{"id": 1, "name": "Fantasyland", "rides": [
                {"id": 101, "name": "Space Mountain", "is_open": true,
                 "wait_time": 45, "last_updated": "2025-06-01T14:05:00Z"}
            ]}],
            "rides": [
                {"id": 102, "name": "Main Street Vehicles", "is_open": false,
                 "wait_time": null, "last_updated": null}
            ]
        }"#;
        let response: WaitTimesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.lands[0].rides.len(), 1);
        assert_eq!(response.rides.len(), 1);
    }
}
