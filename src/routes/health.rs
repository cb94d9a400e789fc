use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::db::queries;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok" when healthy, "degraded" when DB is unreachable)
    pub status: String,
    /// Collector version
    pub version: String,
    /// Whether the database is reachable
    pub database: bool,
}

impl HealthResponse {
    fn from_db_status(db_ok: bool) -> Self {
        Self {
            status: if db_ok { "ok" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: db_ok,
        }
    }
}

/// Health check endpoint.
///
/// Returns status "degraded" (still 200) if the DB is unreachable, so load
/// balancers can distinguish partial failures.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(pool): State<PgPool>) -> Json<HealthResponse> {
    let db_ok = queries::ping(&pool).await.is_ok();
    Json(HealthResponse::from_db_status(db_ok))
}
