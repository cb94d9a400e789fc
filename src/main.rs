// Climate Collector v0.1
use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod cli;
mod config;
mod db;
mod errors;
mod helpers;
mod logging;
mod routes;
mod services;
#[cfg(test)]
mod test_support;

use cli::{Cli, Command};
use config::AppConfig;
use db::store::PgWeatherStore;
use services::batch::BatchRunner;
use services::cdo::CdoClient;
use services::daily::{RunnerState, SharedRunnerState};
use services::fetcher::BackoffPolicy;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 1;

/// OpenAPI document of the status API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Climate Collector API",
        version = "0.1.0",
        description = "Status API of the daily weather collector. Reports database \
            health and the outcome of the last scheduled NOAA CDO batch.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Runner", description = "Daily batch runner status"),
    ),
    paths(
        routes::health::health_check,
        routes::runner::get_runner_status,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            services::daily::RunnerState,
            services::batch::BatchSummary,
            db::models::DateRange,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::try_parse_checked(std::env::args_os()).unwrap_or_else(|e| e.exit());

    // Config is read before tracing so LOG_DIR can route the file layer.
    let config = AppConfig::from_env();
    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| config.as_ref().ok().and_then(|c| c.log_dir.clone()));
    logging::init_tracing(log_dir.as_deref());

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = sqlx::migrate!().run(&pool).await {
        tracing::error!("Failed to run database migrations: {}", e);
        return ExitCode::FAILURE;
    }
    tracing::info!("Database migrations completed");

    let client = match CdoClient::new(&config.cdo_base_url, &config.cdo_token) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to build NOAA CDO client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runner = BatchRunner::new(
        Arc::new(client),
        Arc::new(PgWeatherStore::new(pool.clone())),
        BackoffPolicy::default(),
    );

    match cli.command {
        None => match runner.run_batch(cli.batch_options()).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("Batch aborted: {}", e);
                ExitCode::FAILURE
            }
        },
        Some(Command::Daily) => serve_daily(runner, pool, &config).await,
    }
}

/// Spawn the daily runner and serve the status API until the server stops.
async fn serve_daily(runner: BatchRunner, pool: sqlx::PgPool, config: &AppConfig) -> ExitCode {
    let runner_state: SharedRunnerState = Arc::new(RwLock::new(RunnerState::new()));
    tokio::spawn(services::daily::run_daily(
        runner,
        config.daily_run_hour,
        runner_state.clone(),
    ));

    // Read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    let health_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(pool);

    let runner_routes = Router::new()
        .route(
            "/api/v1/runner/status",
            get(routes::runner::get_runner_status),
        )
        .with_state(runner_state);

    let app = Router::new()
        .merge(health_routes)
        .merge(runner_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Status API listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind TCP listener on {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server terminated unexpectedly: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
