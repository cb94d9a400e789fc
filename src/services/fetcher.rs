//! Retry-fetch unit: one location's historical weather with bounded retries.
//!
//! Each attempt runs the full two-step protocol (find the nearest station,
//! then fetch its daily summaries). A missing station is terminal; any other
//! error is retried after a delay, with a longer cooldown when the upstream
//! signalled rate limiting.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::db::models::{DateRange, Location, WeatherRecord};
use crate::errors::AppError;
use crate::services::cdo::ClimateApi;

/// Delay before retrying after an ordinary failure (seconds).
const RETRY_DELAY_SECS: u64 = 2;

/// Delay before retrying after HTTP 429 (seconds).
const RATE_LIMIT_COOLDOWN_SECS: u64 = 10;

/// Delays applied between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub retry_delay: Duration,
    pub rate_limit_cooldown: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(RETRY_DELAY_SECS),
            rate_limit_cooldown: Duration::from_secs(RATE_LIMIT_COOLDOWN_SECS),
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait after `err` before the next attempt.
    pub fn delay_after(&self, err: &AppError) -> Duration {
        if err.is_rate_limited() {
            self.rate_limit_cooldown
        } else {
            self.retry_delay
        }
    }
}

/// Why a location produced no record.
#[derive(Debug, thiserror::Error)]
pub enum FetchFailure {
    #[error("no weather station found nearby")]
    NoStation,

    #[error("failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: AppError },
}

/// Fetches one location's weather record through a `ClimateApi`.
#[derive(Clone)]
pub struct WeatherFetcher {
    api: Arc<dyn ClimateApi>,
    backoff: BackoffPolicy,
}

impl WeatherFetcher {
    pub fn new(api: Arc<dyn ClimateApi>, backoff: BackoffPolicy) -> Self {
        Self { api, backoff }
    }

    /// Fetch `location` for `range`, making at most `max_retries + 1`
    /// attempts.
    pub async fn fetch(
        &self,
        location: &Location,
        range: &DateRange,
        max_retries: u32,
    ) -> Result<WeatherRecord, FetchFailure> {
        let mut attempts: u32 = 0;

        loop {
            if attempts > 0 {
                tracing::info!("Retry attempt {} for {}", attempts, location.name);
            }
            tracing::debug!("Fetching historical weather data for {}", location.name);

            let err = match self.attempt(location, range).await {
                Ok(Some(record)) => return Ok(record),
                Ok(None) => {
                    tracing::error!("No weather stations found near {}", location.name);
                    return Err(FetchFailure::NoStation);
                }
                Err(e) => e,
            };

            attempts += 1;
            tracing::warn!(
                "Error fetching historical weather for {}: {}",
                location.name,
                err
            );

            if attempts > max_retries {
                tracing::error!(
                    "Failed to fetch data for {} after {} attempts",
                    location.name,
                    attempts
                );
                return Err(FetchFailure::RetriesExhausted {
                    attempts,
                    last_error: err,
                });
            }

            let delay = self.backoff.delay_after(&err);
            if err.is_rate_limited() {
                tracing::info!(
                    "Rate limit hit, waiting {}s before retrying {}",
                    delay.as_secs(),
                    location.name
                );
            } else {
                tracing::info!(
                    "Will retry {} in {}s (attempt {} of {})",
                    location.name,
                    delay.as_secs(),
                    attempts,
                    max_retries
                );
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// One pass of the station-then-data protocol. `Ok(None)` means no
    /// station was found.
    async fn attempt(
        &self,
        location: &Location,
        range: &DateRange,
    ) -> Result<Option<WeatherRecord>, AppError> {
        let station = match self
            .api
            .nearest_station(&location.latitude, &location.longitude)
            .await?
        {
            Some(station) => station,
            None => return Ok(None),
        };

        tracing::info!(
            "Found station near {}: {} ({})",
            location.name,
            station.name,
            station.id
        );

        let historical_data = self.api.daily_summaries(&station.id, range).await?;

        Ok(Some(WeatherRecord {
            location_name: location.name.clone(),
            latitude: location.latitude.clone(),
            longitude: location.longitude.clone(),
            historical_data,
            collected_at: Utc::now(),
            date_range: *range,
            station_id: station.id,
            station_name: station.name,
        }))
    }
}
