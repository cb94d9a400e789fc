//! In-memory fakes of the upstream API and the record store for pipeline tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

use crate::db::models::{DateRange, Location, WeatherRecord};
use crate::db::store::WeatherStore;
use crate::errors::AppError;
use crate::services::cdo::{ClimateApi, Station};

/// Scripted station lookup result for one attempt.
pub enum StationStep {
    Found,
    Missing,
    Fail(fn() -> AppError),
}

/// Fake climate API.
///
/// Per location, station lookups follow a script (one step per attempt); once
/// the script is exhausted the station is found. Measurement fetches succeed
/// unless the location is listed in `failing_data`.
#[derive(Default)]
pub struct FakeApi {
    pub token_valid: bool,
    pub scripts: Mutex<HashMap<String, VecDeque<StationStep>>>,
    pub failing_data: Mutex<HashMap<String, fn() -> AppError>>,
    pub station_calls: Mutex<HashMap<String, usize>>,
    /// When each station lookup happened, in call order.
    pub station_call_times: Mutex<Vec<Instant>>,
    pub data_calls: AtomicUsize,
    pub probe_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            token_valid: true,
            ..Default::default()
        }
    }

    pub fn script(&self, name: &str, steps: Vec<StationStep>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), steps.into());
    }

    pub fn fail_data(&self, name: &str, err: fn() -> AppError) {
        self.failing_data
            .lock()
            .unwrap()
            .insert(name.to_string(), err);
    }

    pub fn station_calls_for(&self, name: &str) -> usize {
        self.station_calls
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_station_calls(&self) -> usize {
        self.station_calls.lock().unwrap().values().sum()
    }
}

/// Station ids encode the location name so `daily_summaries` can tell which
/// location a call belongs to.
fn station_for(name: &str) -> Station {
    Station {
        id: format!("GHCND:{}", name),
        name: format!("{} STATION", name.to_uppercase()),
    }
}

#[async_trait]
impl ClimateApi for FakeApi {
    async fn probe_token(&self) -> Result<(), AppError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.token_valid {
            Ok(())
        } else {
            Err(AppError::InvalidCredentials("HTTP 400: bad token".into()))
        }
    }

    async fn nearest_station(
        &self,
        latitude: &str,
        _longitude: &str,
    ) -> Result<Option<Station>, AppError> {
        // Latitude carries the location name in these tests.
        let name = latitude.to_string();
        *self
            .station_calls
            .lock()
            .unwrap()
            .entry(name.clone())
            .or_insert(0) += 1;
        self.station_call_times.lock().unwrap().push(Instant::now());

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&name)
            .and_then(|steps| steps.pop_front());

        tokio::task::yield_now().await;

        match step {
            None | Some(StationStep::Found) => Ok(Some(station_for(&name))),
            Some(StationStep::Missing) => Ok(None),
            Some(StationStep::Fail(err)) => Err(err()),
        }
    }

    async fn daily_summaries(
        &self,
        station_id: &str,
        range: &DateRange,
    ) -> Result<serde_json::Value, AppError> {
        self.data_calls.fetch_add(1, Ordering::SeqCst);
        let name = station_id.trim_start_matches("GHCND:");
        let failure = self.failing_data.lock().unwrap().get(name).copied();
        if let Some(err) = failure {
            return Err(err());
        }
        tokio::task::yield_now().await;
        Ok(serde_json::json!({
            "results": [
                { "date": format!("{}T00:00:00", range.start), "datatype": "TMAX", "station": station_id, "value": 41 }
            ]
        }))
    }
}

/// A location whose latitude is its own name, for routing fake API calls.
pub fn routed_location(name: &str) -> Location {
    Location {
        name: name.to_string(),
        latitude: name.to_string(),
        longitude: "0".to_string(),
    }
}

/// In-memory record store.
#[derive(Default)]
pub struct FakeStore {
    pub locations: Vec<Location>,
    pub records: Mutex<Vec<WeatherRecord>>,
    /// Raw `date_range` values returned by the fallback query, per location.
    pub raw_ranges: Mutex<HashMap<String, Vec<serde_json::Value>>>,
    pub fail_contains: bool,
    pub fail_date_ranges: bool,
    pub fail_insert: bool,
    pub fail_locations: bool,
    pub contains_calls: AtomicUsize,
    pub date_range_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub replace_calls: AtomicUsize,
}

impl FakeStore {
    pub fn with_locations(locations: Vec<Location>) -> Self {
        Self {
            locations,
            ..Default::default()
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl WeatherStore for FakeStore {
    async fn active_locations(&self) -> Result<Vec<Location>, sqlx::Error> {
        if self.fail_locations {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(self.locations.clone())
    }

    async fn contains_range(
        &self,
        location_name: &str,
        range: &DateRange,
    ) -> Result<bool, sqlx::Error> {
        self.contains_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_contains {
            return Err(sqlx::Error::Protocol("operator does not exist: jsonb @> text".into()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.location_name == location_name && r.date_range == *range))
    }

    async fn date_ranges(&self, location_name: &str) -> Result<Vec<serde_json::Value>, sqlx::Error> {
        self.date_range_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_date_ranges {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut ranges: Vec<serde_json::Value> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.location_name == location_name)
            .filter_map(|r| serde_json::to_value(r.date_range).ok())
            .collect();
        if let Some(raw) = self.raw_ranges.lock().unwrap().get(location_name) {
            ranges.extend(raw.iter().cloned());
        }
        Ok(ranges)
    }

    async fn insert(&self, record: &WeatherRecord) -> Result<(), sqlx::Error> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut records = self.records.lock().unwrap();
        if records
            .iter()
            .any(|r| r.location_name == record.location_name && r.date_range == record.date_range)
        {
            return Err(sqlx::Error::Protocol(
                "duplicate key value violates unique constraint \"uq_weather_data_location_window\"".into(),
            ));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn replace(&self, record: &WeatherRecord) -> Result<(), sqlx::Error> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut records = self.records.lock().unwrap();
        records.retain(|r| {
            !(r.location_name == record.location_name && r.date_range == record.date_range)
        });
        records.push(record.clone());
        Ok(())
    }
}
