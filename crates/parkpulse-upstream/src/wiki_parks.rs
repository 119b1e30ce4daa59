//! ThemeParks.wiki API client (source B).
//!
//! Entity-level documents with explicit statuses, plus the public archive
//! of per-day gzip-compressed event streams used for backfill. Archive
//! objects live at `<destination_uuid>/YYYY/MM/DD.json.gz` and are fetched
//! anonymously.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use parkpulse_core::UpstreamSnapshot;

use crate::error::UpstreamError;
use crate::retry::with_retry;

/// ThemeParks.wiki API base URL.
const API_BASE_URL: &str = "https://api.themeparks.wiki/v1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One archive object reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveObject {
    /// Object key of the form `<dest>/YYYY/MM/DD.json.gz`
    pub key: String,
    /// The day this object covers
    pub date: NaiveDate,
}

impl ArchiveObject {
    /// Parse the date back out of an object key.
    #[must_use]
    pub fn parse_key(key: &str) -> Option<NaiveDate> {
        let parts: Vec<&str> = key.split('/').collect();
        if parts.len() < 4 {
            return None;
        }
        let year: i32 = parts[1].parse().ok()?;
        let month: u32 = parts[2].parse().ok()?;
        let day: u32 = parts[3].split('.').next()?.parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

// ==================== Vendor wire types ====================

/// Entity document from `GET /entity/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityDocument {
    pub id: String,
    pub name: String,
    #[serde(rename = "entityType", default)]
    pub entity_type: String,
    #[serde(default)]
    pub location: Option<EntityLocation>,
    #[serde(default)]
    pub tags: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChildrenResponse {
    #[serde(default)]
    children: Vec<EntityDocument>,
}

#[derive(Debug, Deserialize)]
struct LiveResponse {
    #[serde(rename = "liveData", default)]
    live_data: Vec<LiveEntity>,
}

#[derive(Debug, Deserialize)]
struct LiveEntity {
    id: String,
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    queue: Option<LiveQueue>,
    #[serde(rename = "lastUpdated", default)]
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LiveQueue {
    #[serde(rename = "STANDBY", default)]
    standby: Option<StandbyQueue>,
}

#[derive(Debug, Deserialize)]
struct StandbyQueue {
    #[serde(rename = "waitTime", default)]
    wait_time: Option<i32>,
}

// ==================== Client ====================

/// ThemeParks.wiki API + archive client.
#[derive(Clone)]
pub struct WikiParksClient {
    http_client: Client,
    api_base_url: String,
    archive_base_url: String,
}

impl WikiParksClient {
    /// Create a new client.
    ///
    /// # Panics
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn new(archive_base_url: String, timeout_secs: Option<u64>) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(
                timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            api_base_url: API_BASE_URL.to_string(),
            archive_base_url,
        }
    }

    /// Create a client with custom base URLs (for tests against a mock server).
    #[must_use]
    pub fn with_base_urls(api_base_url: String, archive_base_url: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            api_base_url,
            archive_base_url,
        }
    }

    /// Make a GET request against the API with retry logic.
    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<T, UpstreamError> {
        let url = format!("{}{}", self.api_base_url, endpoint);

        with_retry("wiki-parks", || async {
            debug!(endpoint = %endpoint, "Making ThemeParks.wiki API request");

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

    /// Fetch one entity document.
    pub async fn get_entity(&self, entity_id: &str) -> Result<EntityDocument, UpstreamError> {
        self.request(&format!("/entity/{entity_id}")).await
    }

    /// List child entities (rides, shows) of a park or destination.
    pub async fn list_children(
        &self,
        entity_id: &str,
    ) -> Result<Vec<EntityDocument>, UpstreamError> {
        let response: ChildrenResponse =
            self.request(&format!("/entity/{entity_id}/children")).await?;
        Ok(response.children)
    }

    /// Fetch the current live state for one park.
    pub async fn fetch_current(
        &self,
        park_external_id: &str,
    ) -> Result<Vec<UpstreamSnapshot>, UpstreamError> {
        let response: LiveResponse = self
            .request(&format!("/entity/{park_external_id}/live"))
            .await?;

        let now = Utc::now();
        let snapshots = response
            .live_data
            .into_iter()
            .map(|entity| {
                let wait_time = entity
                    .queue
                    .as_ref()
                    .and_then(|q| q.standby.as_ref())
                    .and_then(|s| s.wait_time);
                let is_open = entity.status.as_deref() == Some("OPERATING");
                UpstreamSnapshot {
                    external_park_id: park_external_id.to_string(),
                    external_ride_id: Some(entity.id),
                    ride_name: entity.name,
                    timestamp: entity
                        .last_updated
                        .as_deref()
                        .and_then(|raw| {
                            DateTime::parse_from_rfc3339(raw)
                                .ok()
                                .map(|dt| dt.with_timezone(&Utc))
                        })
                        .unwrap_or(now),
                    status: entity.status,
                    wait_time_minutes: wait_time,
                    park_open_hint: Some(is_open),
                }
            })
            .collect();

        Ok(snapshots)
    }

    /// Enumerate archive objects for a destination across a date range.
    ///
    /// Keys are generated in date order; a day with no stored object will
    /// 404 at fetch time and is skipped by the importer.
    #[must_use]
    pub fn list_archive_objects(
        destination_uuid: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Vec<ArchiveObject> {
        let mut objects = Vec::new();
        let mut current = start_date;
        while current <= end_date {
            objects.push(ArchiveObject {
                key: format!(
                    "{destination_uuid}/{:04}/{:02}/{:02}.json.gz",
                    current.year(),
                    current.month(),
                    current.day()
                ),
                date: current,
            });
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }
        objects
    }

    /// Fetch the raw bytes of one archive object.
    pub async fn fetch_archive_object(&self, key: &str) -> Result<Vec<u8>, UpstreamError> {
        let url = format!("{}/{}", self.archive_base_url, key);

        with_retry("wiki-archive", || async {
            debug!(key = %key, "Fetching archive object");

            let response = self.http_client.get(&url).send().await?;
            let status = response.status();

            if status.is_success() {
                Ok(response.bytes().await?.to_vec())
            } else if status == reqwest::StatusCode::NOT_FOUND {
                Err(UpstreamError::NotFound(key.to_string()))
            } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                Err(UpstreamError::RateLimited)
            } else {
                let body = response.text().await.unwrap_or_default();
                Err(UpstreamError::ApiError { status, body })
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_key_layout() {
        let objects = WikiParksClient::list_archive_objects(
            "abc-123",
            NaiveDate::from_ymd_opt(2024, 12, 30).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
        );
        let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "abc-123/2024/12/30.json.gz",
                "abc-123/2024/12/31.json.gz",
                "abc-123/2025/01/01.json.gz",
                "abc-123/2025/01/02.json.gz",
            ]
        );
    }

    #[test]
    fn test_archive_objects_are_date_ordered() {
        let objects = WikiParksClient::list_archive_objects(
            "dest",
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        );
        assert_eq!(objects.len(), 10);
        assert!(objects.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_empty_range_when_start_after_end() {
        let objects = WikiParksClient::list_archive_objects(
            "dest",
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        );
        assert!(objects.is_empty());
    }

    #[test]
    fn test_parse_key_round_trip() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 4).unwrap();
        let objects = WikiParksClient::list_archive_objects("dest-uuid", date, date);
        assert_eq!(ArchiveObject::parse_key(&objects[0].key), Some(date));
        assert_eq!(ArchiveObject::parse_key("garbage"), None);
    }

    #[test]
    fn test_live_response_parsing() {
        let json = r#"{
            "liveData": [
                {"id": "ride-1", "name": "Hagrid's", "status": "DOWN",
                 "queue": {"STANDBY": {"waitTime": null}},
                 "lastUpdated": "2025-06-01T14:05:00Z"},
                {"id": "ride-2", "name": "VelociCoaster", "status": "OPERATING",
                 "queue": {"STANDBY": {"waitTime": 75}}}
            ]
        }"#;
        let response: LiveResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.live_data.len(), 2);
        assert_eq!(response.live_data[0].status.as_deref(), Some("DOWN"));
        assert_eq!(
            response.live_data[1]
                .queue
                .as_ref()
                .unwrap()
                .standby
                .as_ref()
                .unwrap()
                .wait_time,
            Some(75)
        );
    }
}
