use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};

use super::models::{City, DateRange, WeatherRecord};

/// List active cities in insertion order.
pub async fn get_active_cities(pool: &PgPool) -> Result<Vec<City>, sqlx::Error> {
    sqlx::query_as::<_, City>(
        "SELECT id, name, state, state_code, display_name, slug, latitude, longitude,
                timezone, population, active
         FROM cities
         WHERE active
         ORDER BY id",
    )
    .fetch_all(pool)
    .await
}

/// Count `weather_data` rows for a location whose `date_range` contains the
/// given window (JSONB containment).
pub async fn count_weather_data_in_range(
    pool: &PgPool,
    location_name: &str,
    range: &DateRange,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM weather_data
         WHERE location_name = $1 AND date_range @> $2",
    )
    .bind(location_name)
    .bind(Json(range))
    .fetch_one(pool)
    .await
}

/// All raw `date_range` values stored for a location.
pub async fn get_date_ranges(
    pool: &PgPool,
    location_name: &str,
) -> Result<Vec<serde_json::Value>, sqlx::Error> {
    sqlx::query_scalar::<_, serde_json::Value>(
        "SELECT date_range FROM weather_data WHERE location_name = $1",
    )
    .bind(location_name)
    .fetch_all(pool)
    .await
}

/// Insert a collected record, returning its generated id.
///
/// Fails with a unique violation when a row for the same location and window
/// already exists.
pub async fn insert_weather_data<'e, E>(executor: E, record: &WeatherRecord) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO weather_data (
            location_name, latitude, longitude, historical_data,
            collected_at, date_range, station_id, station_name
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id",
    )
    .bind(&record.location_name)
    .bind(&record.latitude)
    .bind(&record.longitude)
    .bind(&record.historical_data)
    .bind(record.collected_at)
    .bind(Json(&record.date_range))
    .bind(&record.station_id)
    .bind(&record.station_name)
    .fetch_one(executor)
    .await
}

/// Replace any row for the record's location and window with `record`, in one
/// transaction. Returns the new id.
pub async fn replace_weather_data(pool: &PgPool, record: &WeatherRecord) -> Result<i64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query(
        "DELETE FROM weather_data
         WHERE location_name = $1
           AND date_range->>'start' = $2
           AND date_range->>'end' = $3",
    )
    .bind(&record.location_name)
    .bind(record.date_range.start.format("%Y-%m-%d").to_string())
    .bind(record.date_range.end.format("%Y-%m-%d").to_string())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let id = insert_weather_data(&mut *tx, record).await?;
    tx.commit().await?;

    if removed > 0 {
        tracing::debug!(
            "Replaced {} weather_data row(s) for {}",
            removed,
            record.location_name
        );
    }
    Ok(id)
}

/// Cheap connectivity probe.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
}
