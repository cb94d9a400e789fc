//! Daily runner status HTTP endpoint.
//!
//! GET /api/v1/runner/status: returns the current state of the daily
//! collector as JSON.

use axum::extract::State;
use axum::Json;

use crate::services::daily::{RunnerState, SharedRunnerState};

/// Get the current daily runner status.
///
/// Returns the next scheduled run, the summary of the last batch (counts and
/// failed locations) and the last precondition error, if any.
#[utoipa::path(
    get,
    path = "/api/v1/runner/status",
    tag = "Runner",
    responses(
        (status = 200, description = "Current runner status", body = RunnerState),
    )
)]
pub async fn get_runner_status(State(state): State<SharedRunnerState>) -> Json<RunnerState> {
    let s = state.read().await;
    Json(s.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[tokio::test]
    async fn test_status_serializes_state() {
        let state: SharedRunnerState = Arc::new(RwLock::new(RunnerState::new()));
        state.write().await.total_runs = 3;

        let Json(body) = get_runner_status(State(state)).await;
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["total_runs"], 3);
        assert_eq!(json["running"], false);
        assert!(json["last_summary"].is_null());
    }
}
