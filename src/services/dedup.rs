//! Existing-data checker.
//!
//! Decides whether a location already has a record for a date window. The
//! containment query is tried first; if it errors, all stored ranges for the
//! location are scanned client-side. Any failure counts as "not existing".

use serde::Deserialize;
use std::sync::Arc;

use crate::db::models::DateRange;
use crate::db::store::WeatherStore;

#[derive(Clone)]
pub struct ExistingDataChecker {
    store: Arc<dyn WeatherStore>,
}

impl ExistingDataChecker {
    pub fn new(store: Arc<dyn WeatherStore>) -> Self {
        Self { store }
    }

    /// Whether a record for `location_name` covering exactly `range` exists.
    /// Never fails.
    pub async fn exists(&self, location_name: &str, range: &DateRange) -> bool {
        match self.store.contains_range(location_name, range).await {
            Ok(found) => return found,
            Err(e) => {
                tracing::warn!(
                    "Containment query failed for {}, trying fallback scan: {}",
                    location_name,
                    e
                );
            }
        }

        match self.store.date_ranges(location_name).await {
            Ok(ranges) => ranges.iter().any(|raw| range_matches(raw, range)),
            Err(e) => {
                tracing::error!(
                    "Error checking existing weather data for {}: {}",
                    location_name,
                    e
                );
                false
            }
        }
    }
}

/// Whether a stored `date_range` value has the same start and end.
/// Values that don't parse as a range never match.
fn range_matches(raw: &serde_json::Value, range: &DateRange) -> bool {
    DateRange::deserialize(raw)
        .map(|stored| stored == *range)
        .unwrap_or(false)
}
