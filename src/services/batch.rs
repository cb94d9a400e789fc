//! Batch collection pipeline.
//!
//! `BatchRunner::run_batch` validates the NOAA token, loads the active
//! locations, computes one shared date window and runs the per-item processor
//! over every location through the bounded scheduler. The processor never
//! fails: every problem is folded into its `ProcessOutcome`, so one bad
//! location cannot abort the batch.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{DateRange, Location, WeatherRecord};
use crate::db::store::WeatherStore;
use crate::errors::AppError;
use crate::helpers::{local_today, trailing_window};
use crate::services::cdo::ClimateApi;
use crate::services::dedup::ExistingDataChecker;
use crate::services::fetcher::{BackoffPolicy, WeatherFetcher};
use crate::services::scheduler::run_bounded;

/// Options for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Process only the first `limit` locations; 0 means all.
    pub limit: usize,
    /// Skip locations that already have a record for the window.
    pub skip_existing: bool,
    pub max_retries: u32,
    pub concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            limit: 0,
            skip_existing: true,
            max_retries: 1,
            concurrency: 3,
        }
    }
}

impl BatchOptions {
    /// Settings for the unattended daily run.
    pub fn daily() -> Self {
        Self {
            max_retries: 2,
            ..Self::default()
        }
    }
}

/// What happened to one location.
#[derive(Debug, Clone)]
pub enum OutcomeStatus {
    /// Fetched (and handed to the store).
    Stored(Box<WeatherRecord>),
    /// A record for the window already existed.
    Skipped,
    Failed(String),
}

/// Result of processing one location.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub location: Location,
    pub status: OutcomeStatus,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, OutcomeStatus::Failed(_))
    }
}

/// Aggregate statistics of a batch run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub window: DateRange,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Locations fetched in this run.
    pub succeeded: usize,
    /// Locations that already had data.
    pub skipped: usize,
    pub failed: usize,
    /// Names of failed locations, in input order.
    pub failed_locations: Vec<String>,
}

impl BatchSummary {
    fn from_outcomes(
        run_id: Uuid,
        window: DateRange,
        started_at: DateTime<Utc>,
        outcomes: &[ProcessOutcome],
    ) -> Self {
        let mut summary = Self {
            run_id,
            window,
            started_at,
            duration_ms: (Utc::now() - started_at).num_milliseconds().max(0) as u64,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            failed_locations: Vec::new(),
        };

        for outcome in outcomes {
            match &outcome.status {
                OutcomeStatus::Stored(record) => {
                    tracing::debug!(
                        "{} collected from station {}",
                        outcome.location.name,
                        record.station_id
                    );
                    summary.succeeded += 1;
                }
                OutcomeStatus::Skipped => summary.skipped += 1,
                OutcomeStatus::Failed(reason) => {
                    tracing::debug!("{} failed: {}", outcome.location.name, reason);
                    summary.failed += 1;
                    summary.failed_locations.push(outcome.location.name.clone());
                }
            }
        }

        summary
    }

    fn log(&self) {
        tracing::info!(
            "Weather data fetching completed for {} to {}: {} succeeded, {} skipped, {} failed ({}ms)",
            self.window.start,
            self.window.end,
            self.succeeded,
            self.skipped,
            self.failed,
            self.duration_ms,
        );
        if !self.failed_locations.is_empty() {
            tracing::warn!("Failed locations: {}", self.failed_locations.join("; "));
        }
    }
}

/// Runs batch collections against a climate API and a record store.
#[derive(Clone)]
pub struct BatchRunner {
    api: Arc<dyn ClimateApi>,
    store: Arc<dyn WeatherStore>,
    fetcher: WeatherFetcher,
    checker: ExistingDataChecker,
}

impl BatchRunner {
    pub fn new(
        api: Arc<dyn ClimateApi>,
        store: Arc<dyn WeatherStore>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            fetcher: WeatherFetcher::new(api.clone(), backoff),
            checker: ExistingDataChecker::new(store.clone()),
            api,
            store,
        }
    }

    /// Run one batch over the trailing window ending yesterday.
    pub async fn run_batch(&self, options: BatchOptions) -> Result<BatchSummary, AppError> {
        self.run_batch_for_window(options, trailing_window(local_today()))
            .await
    }

    /// Run one batch with every location sharing `window`.
    ///
    /// Fails only on preconditions (token probe, loading locations); item
    /// failures are reported in the summary.
    pub async fn run_batch_for_window(
        &self,
        options: BatchOptions,
        window: DateRange,
    ) -> Result<BatchSummary, AppError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("batch_run", %run_id);
        self.run_inner(run_id, options, window).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        options: BatchOptions,
        window: DateRange,
    ) -> Result<BatchSummary, AppError> {
        let started_at = Utc::now();
        tracing::info!(
            "Starting batch weather data fetching (concurrency {}, retries {}, skip existing {})",
            options.concurrency,
            options.max_retries,
            options.skip_existing,
        );

        if let Err(e) = self.api.probe_token().await {
            tracing::error!("Aborting fetching, NOAA CDO token check failed: {}", e);
            return Err(e);
        }
        tracing::info!("NOAA CDO token is valid");

        let mut locations = self.store.active_locations().await.map_err(|e| {
            tracing::error!("Error fetching active cities: {}", e);
            AppError::from(e)
        })?;

        if locations.is_empty() {
            tracing::error!("No active cities found in the database, aborting");
            return Err(AppError::NoLocations);
        }
        tracing::info!("Found {} active cities", locations.len());

        if options.limit > 0 {
            locations.truncate(options.limit);
        }
        tracing::info!(
            "Will process {} cities for {} to {}",
            locations.len(),
            window.start,
            window.end
        );

        let outcomes = run_bounded(locations, options.concurrency, |location| {
            self.process_location(location, &options, &window)
                .map(Ok::<_, Infallible>)
        })
        .await
        .unwrap_or_else(|never| match never {});

        tracing::debug!(
            "{} of {} cities processed without error",
            outcomes.iter().filter(|o| o.is_success()).count(),
            outcomes.len()
        );

        let summary = BatchSummary::from_outcomes(run_id, window, started_at, &outcomes);
        summary.log();
        Ok(summary)
    }

    /// Process one location: dedup check, fetch with retries, store.
    pub async fn process_location(
        &self,
        location: Location,
        options: &BatchOptions,
        window: &DateRange,
    ) -> ProcessOutcome {
        tracing::debug!("Processing {}", location.name);

        if options.skip_existing && self.checker.exists(&location.name, window).await {
            tracing::info!(
                "Weather data already exists for {} from {} to {}, skipping",
                location.name,
                window.start,
                window.end
            );
            return ProcessOutcome {
                location,
                status: OutcomeStatus::Skipped,
            };
        }

        let record = match self
            .fetcher
            .fetch(&location, window, options.max_retries)
            .await
        {
            Ok(record) => record,
            Err(failure) => {
                return ProcessOutcome {
                    location,
                    status: OutcomeStatus::Failed(failure.to_string()),
                }
            }
        };

        // Forced runs overwrite the window's record instead of colliding with it.
        // A failed write is logged but the fetch still counts as a success.
        let written = if options.skip_existing {
            self.store.insert(&record).await
        } else {
            self.store.replace(&record).await
        };
        match written {
            Ok(()) => tracing::info!(
                "Stored historical weather data for {}",
                record.location_name
            ),
            Err(e) => tracing::error!(
                "Error storing historical weather data for {}: {}",
                record.location_name,
                e
            ),
        }

        ProcessOutcome {
            location,
            status: OutcomeStatus::Stored(Box::new(record)),
        }
    }
}
