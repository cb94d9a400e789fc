/// Errors raised by the collector.
///
/// Upstream failures are split into rate limiting, other HTTP statuses and
/// transport problems so the retry loop can pick the right delay.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("NOAA CDO token rejected: {0}")]
    InvalidCredentials(String),

    #[error("No active locations found in the database")]
    NoLocations,

    #[error("NOAA CDO rate limit hit (HTTP 429)")]
    RateLimited,

    #[error("NOAA CDO returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("NOAA CDO request failed: {0}")]
    Transport(String),

    #[error("NOAA CDO response could not be decoded: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the upstream signalled rate limiting; such errors earn the
    /// longer cooldown before the next attempt.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited)
    }
}
