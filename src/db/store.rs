//! Record repository consumed by the batch pipeline.
//!
//! The pipeline only talks to `WeatherStore`; `PgWeatherStore` backs it with
//! the queries in `db::queries`.

use async_trait::async_trait;
use sqlx::PgPool;

use super::models::{DateRange, Location, WeatherRecord};
use super::queries;

#[async_trait]
pub trait WeatherStore: Send + Sync {
    /// Locations of all active cities.
    async fn active_locations(&self) -> Result<Vec<Location>, sqlx::Error>;

    /// Whether a record for `location_name` has a `date_range` containing
    /// `range` (containment predicate).
    async fn contains_range(&self, location_name: &str, range: &DateRange)
        -> Result<bool, sqlx::Error>;

    /// Raw `date_range` values of every record for `location_name`.
    async fn date_ranges(&self, location_name: &str) -> Result<Vec<serde_json::Value>, sqlx::Error>;

    /// Store a new record. Fails if the location already has one for the
    /// same window.
    async fn insert(&self, record: &WeatherRecord) -> Result<(), sqlx::Error>;

    /// Store `record`, replacing any existing record for its location and
    /// window.
    async fn replace(&self, record: &WeatherRecord) -> Result<(), sqlx::Error>;
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgWeatherStore {
    pool: PgPool,
}

impl PgWeatherStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WeatherStore for PgWeatherStore {
    async fn active_locations(&self) -> Result<Vec<Location>, sqlx::Error> {
        let cities = queries::get_active_cities(&self.pool).await?;
        Ok(cities.into_iter().map(Location::from).collect())
    }

    async fn contains_range(
        &self,
        location_name: &str,
        range: &DateRange,
    ) -> Result<bool, sqlx::Error> {
        let count = queries::count_weather_data_in_range(&self.pool, location_name, range).await?;
        Ok(count > 0)
    }

    async fn date_ranges(&self, location_name: &str) -> Result<Vec<serde_json::Value>, sqlx::Error> {
        queries::get_date_ranges(&self.pool, location_name).await
    }

    async fn insert(&self, record: &WeatherRecord) -> Result<(), sqlx::Error> {
        let id = queries::insert_weather_data(&self.pool, record).await?;
        tracing::debug!("Inserted weather_data row {} for {}", id, record.location_name);
        Ok(())
    }

    async fn replace(&self, record: &WeatherRecord) -> Result<(), sqlx::Error> {
        let id = queries::replace_weather_data(&self.pool, record).await?;
        tracing::debug!("Wrote weather_data row {} for {}", id, record.location_name);
        Ok(())
    }
}
