use crate::errors::AppError;

/// Default NOAA Climate Data Online v2 endpoint.
const DEFAULT_CDO_BASE_URL: &str = "https://www.ncdc.noaa.gov/cdo-web/api/v2";

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// NOAA CDO API token, sent in the `token` header.
    pub cdo_token: String,
    pub cdo_base_url: String,
    /// Port of the status API in daily mode.
    pub port: u16,
    /// Directory for the dated log file; console only when unset.
    pub log_dir: Option<String>,
    /// Local hour (0-23) at which the daily runner starts a batch.
    pub daily_run_hour: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source. Empty values count
    /// as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| AppError::Config(format!("{} must be set", key)))
        };

        let database_url = required("DATABASE_URL")?;
        let cdo_token = required("NOAA_CDO_TOKEN")?;

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("PORT must be a valid u16, got '{}'", raw)))?,
            None => 8080,
        };

        let daily_run_hour = match get("DAILY_RUN_HOUR") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|h| *h < 24)
                .ok_or_else(|| {
                    AppError::Config(format!("DAILY_RUN_HOUR must be 0-23, got '{}'", raw))
                })?,
            None => 6,
        };

        Ok(Self {
            database_url,
            cdo_token,
            cdo_base_url: get("NOAA_CDO_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_CDO_BASE_URL.to_string()),
            port,
            log_dir: get("LOG_DIR"),
            daily_run_hour,
        })
    }
}
