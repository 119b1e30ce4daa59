//! Manual tier overrides.
//!
//! Operators can pin a ride's tier in a CSV keyed by (park_id, ride_id).
//! Overrides are the first step of the hierarchy and always win with
//! confidence 1.00.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ClassifierError;

#[derive(Debug, Deserialize)]
struct OverrideRow {
    park_id: i32,
    ride_id: i32,
    override_tier: i32,
    #[serde(default)]
    reason: String,
}

/// Loaded manual overrides, keyed by (park_id, ride_id).
#[derive(Debug, Clone, Default)]
pub struct ManualOverrides {
    entries: HashMap<(i32, i32), (i32, String)>,
}

impl ManualOverrides {
    /// Create an empty override set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load overrides from a CSV file.
    ///
    /// Rows with tiers outside 1-3 are skipped with a warning rather than
    /// failing the load; one bad row should not disable every override.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| ClassifierError::SourceFile(format!("{}: {e}", path.display())))?;

        let mut entries = HashMap::new();
        for row in reader.deserialize::<OverrideRow>() {
            match row {
                Ok(row) if (1..=3).contains(&row.override_tier) => {
                    entries.insert((row.park_id, row.ride_id), (row.override_tier, row.reason));
                }
                Ok(row) => {
                    warn!(
                        park_id = row.park_id,
                        ride_id = row.ride_id,
                        tier = row.override_tier,
                        "Skipping override with out-of-range tier"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Skipping malformed override row");
                }
            }
        }

        debug!(count = entries.len(), "Loaded manual tier overrides");
        Ok(Self { entries })
    }

    /// Look up an override for a ride.
    #[must_use]
    pub fn get(&self, park_id: i32, ride_id: i32) -> Option<(i32, &str)> {
        self.entries
            .get(&(park_id, ride_id))
            .map(|(tier, reason)| (*tier, reason.as_str()))
    }

    /// Number of loaded overrides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the override set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct TempCsv {
        path: PathBuf,
    }

    impl TempCsv {
        fn new(contents: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "overrides-test-{}-{:?}.csv",
                std::process::id(),
                std::thread::current().id()
            ));
            std::fs::write(&path, contents).unwrap();
            Self { path }
        }
    }

    impl Drop for TempCsv {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn write_csv(contents: &str) -> TempCsv {
        TempCsv::new(contents)
    }

    #[test]
    fn test_load_and_lookup() {
        let csv = write_csv(
            "park_id,ride_id,override_tier,reason\n\
             1,42,1,Signature attraction\n\
             1,43,3,Seasonal walkthrough\n",
        );
        let overrides = ManualOverrides::load(&csv.path).unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides.get(1, 42), Some((1, "Signature attraction")));
        assert_eq!(overrides.get(1, 99), None);
        assert_eq!(overrides.get(2, 42), None);
    }

    #[test]
    fn test_out_of_range_tier_skipped() {
        let csv = write_csv(
            "park_id,ride_id,override_tier,reason\n\
             1,42,5,Bad tier\n\
             1,43,2,Fine\n",
        );
        let overrides = ManualOverrides::load(&csv.path).unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides.get(1, 42), None);
        assert!(overrides.get(1, 43).is_some());
    }

    #[test]
    fn test_missing_file_is_error() {
        let missing = std::path::Path::new("/nonexistent/overrides.csv");
        assert!(ManualOverrides::load(missing).is_err());
    }

    #[test]
    fn test_malformed_row_skipped() {
        let csv = write_csv(
            "park_id,ride_id,override_tier,reason\n\
             not,a,number,row\n\
             2,7,2,Valid\n",
        );
        let overrides = ManualOverrides::load(&csv.path).unwrap();
        assert_eq!(overrides.len(), 1);
        assert!(overrides.get(2, 7).is_some());
    }
}
