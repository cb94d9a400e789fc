//! NOAA Climate Data Online (CDO) v2 client.
//!
//! Three endpoints are used: `/datasets` as a token probe, `/stations` to
//! find a GHCND station near a location and `/data` for the daily summaries.
//! See: https://www.ncdc.noaa.gov/cdo-web/webservices/v2

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::db::models::DateRange;
use crate::errors::AppError;

/// Daily Summaries dataset.
const DATASET_ID: &str = "GHCND";

/// Station search radius around a location (miles).
const STATION_SEARCH_RADIUS: u32 = 25;

/// Stations requested per search; only the first is used.
const STATION_SEARCH_LIMIT: u32 = 5;

/// Maximum measurements returned by one `/data` call.
const DATA_LIMIT: u32 = 1000;

/// Maximum number of body characters kept in an upstream error message.
const ERROR_BODY_MAX_CHARS: usize = 200;

/// A weather station as returned by `/stations`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
}

/// Statuses CDO answers with when the token is missing, malformed or revoked.
const CREDENTIAL_REJECTION_STATUSES: [u16; 3] = [400, 401, 403];

/// `/stations` response. CDO omits `results` (or sends `null`) when nothing
/// matched.
#[derive(Debug, Deserialize)]
struct StationsResponse {
    #[serde(default)]
    results: Option<Vec<Station>>,
}

/// Upstream climate API as seen by the batch pipeline.
#[async_trait]
pub trait ClimateApi: Send + Sync {
    /// Lightweight call that succeeds only with a valid token.
    async fn probe_token(&self) -> Result<(), AppError>;

    /// First GHCND station within the search radius, ordered by name.
    /// `Ok(None)` when no station is nearby.
    async fn nearest_station(
        &self,
        latitude: &str,
        longitude: &str,
    ) -> Result<Option<Station>, AppError>;

    /// Daily summaries for a station over an inclusive date window, as the raw
    /// response body.
    async fn daily_summaries(
        &self,
        station_id: &str,
        range: &DateRange,
    ) -> Result<serde_json::Value, AppError>;
}

/// Client for the NOAA CDO v2 API.
#[derive(Debug, Clone)]
pub struct CdoClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl CdoClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Issue an authenticated GET and decode the JSON body.
    ///
    /// HTTP 429 maps to `RateLimited`, any other non-2xx status to `Upstream`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .header("token", &self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("{} request failed: {}", endpoint, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Decode(format!("{} response: {}", endpoint, e)))
    }
}

#[async_trait]
impl ClimateApi for CdoClient {
    async fn probe_token(&self) -> Result<(), AppError> {
        match self
            .get_json::<serde_json::Value>("datasets", &[("limit", "1".to_string())])
            .await
        {
            Ok(_) => Ok(()),
            Err(AppError::Upstream { status, message })
                if CREDENTIAL_REJECTION_STATUSES.contains(&status) =>
            {
                Err(AppError::InvalidCredentials(format!(
                    "HTTP {}: {}",
                    status, message
                )))
            }
            Err(e) => Err(e),
        }
    }

    async fn nearest_station(
        &self,
        latitude: &str,
        longitude: &str,
    ) -> Result<Option<Station>, AppError> {
        let query = [
            ("datasetid", DATASET_ID.to_string()),
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("radius", STATION_SEARCH_RADIUS.to_string()),
            ("limit", STATION_SEARCH_LIMIT.to_string()),
            ("sortfield", "name".to_string()),
            ("sortorder", "asc".to_string()),
        ];
        let response: StationsResponse = self.get_json("stations", &query).await?;
        Ok(response.results.unwrap_or_default().into_iter().next())
    }

    async fn daily_summaries(
        &self,
        station_id: &str,
        range: &DateRange,
    ) -> Result<serde_json::Value, AppError> {
        let query = [
            ("datasetid", DATASET_ID.to_string()),
            ("stationid", station_id.to_string()),
            ("startdate", range.start.format("%Y-%m-%d").to_string()),
            ("enddate", range.end.format("%Y-%m-%d").to_string()),
            ("limit", DATA_LIMIT.to_string()),
            ("units", "standard".to_string()),
        ];
        self.get_json("data", &query).await
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_MAX_CHARS {
        trimmed.to_string()
    } else {
        let mut cut: String = trimmed.chars().take(ERROR_BODY_MAX_CHARS).collect();
        cut.push('…');
        cut
    }
}
