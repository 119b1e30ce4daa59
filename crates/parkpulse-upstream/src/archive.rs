//! Archive payload parsing.
//!
//! Archive objects are gzip-compressed JSON event arrays. Two framings
//! exist in the wild: `{"events": [...]}` and a bare array. Individual
//! malformed events are skipped and reported; a decompression failure
//! fails the whole file.

use std::io::Read;

use chrono::{DateTime, NaiveDateTime, Utc};
use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::debug;

use parkpulse_core::UpstreamSnapshot;

use crate::error::UpstreamError;

/// One parsed archive event.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEvent {
    /// ThemeParks.wiki entity UUID
    pub entity_id: String,
    pub name: String,
    pub status: Option<String>,
    pub wait_time: Option<i32>,
    pub event_time: DateTime<Utc>,
    /// Owning park UUID, when present
    pub park_id: Option<String>,
    /// Park slug, when present
    pub park_slug: Option<String>,
}

impl ArchiveEvent {
    /// Whether the recorded status implies the ride was operating.
    #[must_use]
    pub fn is_operating(&self) -> bool {
        self.status.as_deref() == Some("OPERATING")
    }

    /// Normalize into the cross-source snapshot shape.
    #[must_use]
    pub fn to_upstream_snapshot(&self) -> UpstreamSnapshot {
        UpstreamSnapshot {
            external_park_id: self
                .park_id
                .clone()
                .or_else(|| self.park_slug.clone())
                .unwrap_or_default(),
            external_ride_id: Some(self.entity_id.clone()),
            ride_name: self.name.clone(),
            timestamp: self.event_time,
            status: self.status.clone(),
            wait_time_minutes: self.wait_time,
            park_open_hint: Some(self.is_operating()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(alias = "entityId", alias = "id")]
    entity_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(alias = "waitTime", default)]
    wait_time: Option<i32>,
    #[serde(alias = "timestamp", alias = "lastUpdated", default)]
    event_time: Option<String>,
    #[serde(alias = "parkId", default)]
    park_id: Option<String>,
    #[serde(alias = "parkSlug", default)]
    park_slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WrappedEvents {
    events: Vec<serde_json::Value>,
}

/// Summary of one parsed file.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub events: Vec<ArchiveEvent>,
    /// Count of records dropped for per-record parse failures
    pub records_skipped: usize,
}

/// Decompress and parse one archive object's content.
///
/// # Errors
/// Returns [`UpstreamError::Decompression`] when the gzip stream is corrupt
/// and [`UpstreamError::Parse`] when the outer JSON framing is unreadable.
/// Per-record failures are counted, not fatal.
pub fn parse_archive_content(content: &[u8]) -> Result<ParseOutcome, UpstreamError> {
    let mut decoder = GzDecoder::new(content);
    let mut decompressed = String::new();
    decoder
        .read_to_string(&mut decompressed)
        .map_err(|e| UpstreamError::Decompression(e.to_string()))?;

    parse_event_json(&decompressed)
}

/// Parse the decompressed JSON, tolerating both framings.
pub fn parse_event_json(raw: &str) -> Result<ParseOutcome, UpstreamError> {
    let values: Vec<serde_json::Value> =
        if let Ok(wrapped) = serde_json::from_str::<WrappedEvents>(raw) {
            wrapped.events
        } else {
            serde_json::from_str::<Vec<serde_json::Value>>(raw)
                .map_err(|e| UpstreamError::Parse(format!("unrecognized event framing: {e}")))?
        };

    let mut outcome = ParseOutcome::default();
    for value in values {
        match parse_one_event(value) {
            Some(event) => outcome.events.push(event),
            None => outcome.records_skipped += 1,
        }
    }

    if outcome.records_skipped > 0 {
        debug!(
            skipped = outcome.records_skipped,
            parsed = outcome.events.len(),
            "Skipped malformed archive records"
        );
    }

    Ok(outcome)
}

fn parse_one_event(value: serde_json::Value) -> Option<ArchiveEvent> {
    let wire: WireEvent = serde_json::from_value(value).ok()?;
    let entity_id = wire.entity_id?;
    let event_time = parse_event_time(wire.event_time.as_deref()?)?;

    Some(ArchiveEvent {
        entity_id,
        name: wire.name.unwrap_or_default(),
        status: wire.status,
        wait_time: wire.wait_time,
        event_time,
        park_id: wire.park_id,
        park_slug: wire.park_slug,
    })
}

/// Parse an event timestamp, with or without fractional seconds or offset.
fn parse_event_time(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive fallback: "2024-12-25T00:05:10" is treated as UTC
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(raw: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    const WRAPPED: &str = r#"{"events": [
        {"entityId": "abc-123", "name": "Test Ride", "status": "OPERATING",
         "waitTime": 45, "timestamp": "2024-12-25T00:05:10.123Z",
         "parkId": "park-789", "parkSlug": "test-park"}
    ]}"#;

    const BARE: &str = r#"[
        {"entityId": "abc-123", "name": "Test Ride", "status": "DOWN",
         "timestamp": "2024-12-25T00:05:10Z"}
    ]"#;

    #[test]
    fn test_parse_wrapped_framing() {
        let outcome = parse_archive_content(&gzip(WRAPPED)).unwrap();
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.records_skipped, 0);

        let event = &outcome.events[0];
        assert_eq!(event.entity_id, "abc-123");
        assert_eq!(event.status.as_deref(), Some("OPERATING"));
        assert_eq!(event.wait_time, Some(45));
        assert_eq!(event.park_id.as_deref(), Some("park-789"));
        assert_eq!(event.event_time.to_rfc3339(), "2024-12-25T00:05:10.123+00:00");
    }

    #[test]
    fn test_parse_bare_array_framing() {
        let outcome = parse_archive_content(&gzip(BARE)).unwrap();
        assert_eq!(outcome.events.len(), 1);
        assert!(!outcome.events[0].is_operating());
    }

    #[test]
    fn test_malformed_record_is_skipped_not_fatal() {
        let json = r#"[
            {"entityId": "good", "status": "OPERATING", "timestamp": "2024-12-25T01:00:00Z"},
            {"name": "no entity id", "timestamp": "2024-12-25T01:00:00Z"},
            {"entityId": "no timestamp"}
        ]"#;
        let outcome = parse_archive_content(&gzip(json)).unwrap();
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.records_skipped, 2);
    }

    #[test]
    fn test_corrupt_gzip_fails_the_file() {
        let result = parse_archive_content(b"definitely not gzip");
        assert!(matches!(result, Err(UpstreamError::Decompression(_))));
    }

    #[test]
    fn test_unreadable_framing_is_parse_error() {
        let result = parse_archive_content(&gzip(r#"{"not_events": 1}"#));
        assert!(matches!(result, Err(UpstreamError::Parse(_))));
    }

    #[test]
    fn test_naive_timestamp_treated_as_utc() {
        let parsed = parse_event_time("2024-12-25T00:05:10").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-12-25T00:05:10+00:00");
    }

    #[test]
    fn test_snapshot_conversion_tags_park() {
        let outcome = parse_archive_content(&gzip(WRAPPED)).unwrap();
        let snapshot = outcome.events[0].to_upstream_snapshot();
        assert_eq!(snapshot.external_park_id, "park-789");
        assert_eq!(snapshot.external_ride_id.as_deref(), Some("abc-123"));
        assert_eq!(snapshot.park_open_hint, Some(true));
    }
}
