//! Daily scheduled collection.
//!
//! Sleeps until the configured local hour, runs one batch with the daily
//! settings and records the outcome in shared in-memory state that the
//! status endpoint serves. State is lost on restart; the next run is
//! recomputed from the clock.

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::services::batch::{BatchOptions, BatchRunner, BatchSummary};

/// Days to look ahead for a valid run time (DST gaps can skip an hour).
const MAX_LOOKAHEAD_DAYS: usize = 3;

/// Daily runner state, exposed via the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunnerState {
    /// Whether a batch is in progress right now.
    pub running: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_started_at: Option<DateTime<Utc>>,
    /// Summary of the last batch that got past its preconditions.
    pub last_summary: Option<BatchSummary>,
    /// Precondition error of the last run, cleared on success.
    pub last_error: Option<String>,
    pub total_runs: u64,
}

impl RunnerState {
    pub fn new() -> Self {
        Self {
            running: false,
            next_run_at: None,
            last_run_started_at: None,
            last_summary: None,
            last_error: None,
            total_runs: 0,
        }
    }
}

/// Shared runner state handle.
pub type SharedRunnerState = Arc<RwLock<RunnerState>>;

/// Next occurrence of `hour:00` strictly after `now`, in `now`'s timezone.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();

    for _ in 0..MAX_LOOKAHEAD_DAYS {
        let candidate = day
            .and_hms_opt(hour, 0, 0)
            .and_then(|naive| tz.from_local_datetime(&naive).earliest());
        if let Some(candidate) = candidate {
            if candidate > *now {
                return candidate;
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    now.clone() + Duration::hours(24)
}

/// Run the daily collector. Never returns.
///
/// Should be spawned via `tokio::spawn(run_daily(...))`.
pub async fn run_daily(runner: BatchRunner, run_hour: u32, state: SharedRunnerState) {
    tracing::info!("Daily runner started, batches run at {:02}:00 local time", run_hour);

    loop {
        let now = Local::now();
        let next = next_run_after(&now, run_hour);
        {
            let mut s = state.write().await;
            s.next_run_at = Some(next.with_timezone(&Utc));
        }

        let wait = (next.clone() - now).to_std().unwrap_or_default();
        tracing::info!(
            "Daily runner: next batch at {} (in {}s)",
            next,
            wait.as_secs()
        );
        tokio::time::sleep(wait).await;

        run_once(&runner, &state).await;
    }
}

/// Run one daily batch and record its outcome.
async fn run_once(runner: &BatchRunner, state: &SharedRunnerState) {
    let started_at = Utc::now();
    {
        let mut s = state.write().await;
        s.running = true;
        s.last_run_started_at = Some(started_at);
    }

    let result = runner.run_batch(BatchOptions::daily()).await;

    let mut s = state.write().await;
    s.running = false;
    s.total_runs += 1;
    match result {
        Ok(summary) => {
            s.last_summary = Some(summary);
            s.last_error = None;
        }
        Err(e) => {
            tracing::error!("Daily weather update failed: {}", e);
            s.last_error = Some(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fetcher::BackoffPolicy;
    use crate::errors::AppError;
    use crate::test_support::{routed_location, FakeApi, FakeStore, StationStep};
    use chrono::FixedOffset;

    #[test]
    fn test_next_run_later_today() {
        let now = "2026-03-01T04:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let next = next_run_after(&now, 6);
        assert_eq!(next, "2026-03-01T06:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_next_run_tomorrow_when_hour_passed() {
        let now = "2026-03-01T06:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let next = next_run_after(&now, 6);
        assert_eq!(next, "2026-03-02T06:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_next_run_crosses_year() {
        let now = "2026-12-31T23:59:00Z".parse::<DateTime<Utc>>().unwrap();
        let next = next_run_after(&now, 0);
        assert_eq!(next, "2027-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_next_run_respects_offset() {
        let tz = FixedOffset::west_opt(6 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 3, 1, 5, 0, 0).unwrap();
        let next = next_run_after(&now, 6);
        assert_eq!(next, tz.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap());
        assert_eq!(
            next.with_timezone(&Utc),
            "2026-03-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_records_summary() {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(FakeStore::with_locations(vec![
            routed_location("Chicago, IL"),
            routed_location("Austin, TX"),
        ]));
        let runner = BatchRunner::new(api, store, BackoffPolicy::default());
        let state: SharedRunnerState = Arc::new(RwLock::new(RunnerState::new()));

        run_once(&runner, &state).await;

        let s = state.read().await;
        assert_eq!(s.total_runs, 1);
        assert!(!s.running);
        assert!(s.last_run_started_at.is_some());
        assert!(s.last_error.is_none());
        let summary = s.last_summary.as_ref().unwrap();
        assert_eq!(summary.succeeded, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_flag_set_during_batch() {
        // A retry delay keeps the batch in flight long enough to observe it.
        let api = Arc::new(FakeApi::new());
        api.script(
            "Chicago, IL",
            vec![StationStep::Fail(|| AppError::Transport("reset".into()))],
        );
        let store = Arc::new(FakeStore::with_locations(vec![routed_location("Chicago, IL")]));
        let runner = BatchRunner::new(api, store, BackoffPolicy::default());
        let state: SharedRunnerState = Arc::new(RwLock::new(RunnerState::new()));
        assert!(!state.read().await.running);

        let task = {
            let state = state.clone();
            tokio::spawn(async move { run_once(&runner, &state).await })
        };
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert!(state.read().await.running);

        task.await.unwrap();
        let s = state.read().await;
        assert!(!s.running);
        assert_eq!(s.last_summary.as_ref().unwrap().succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_records_precondition_error() {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(FakeStore::default());
        let runner = BatchRunner::new(api, store, BackoffPolicy::default());
        let state: SharedRunnerState = Arc::new(RwLock::new(RunnerState::new()));

        run_once(&runner, &state).await;

        let s = state.read().await;
        assert_eq!(s.total_runs, 1);
        assert!(s.last_summary.is_none());
        assert!(s.last_error.as_deref().unwrap().contains("No active locations"));
    }
}
