use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::helpers::coordinate_to_string;

/// A city row from the `cities` table.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // All fields populated by FromRow; only a subset feeds `Location`
pub struct City {
    pub id: i32,
    pub name: String,
    pub state: String,
    pub state_code: String,
    pub display_name: String,
    pub slug: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub timezone: String,
    pub population: i32,
    pub active: bool,
}

/// A place to collect weather for. Identity is `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub name: String,
    pub latitude: String,
    pub longitude: String,
}

impl From<City> for Location {
    fn from(city: City) -> Self {
        Self {
            name: city.display_name,
            latitude: coordinate_to_string(city.latitude),
            longitude: coordinate_to_string(city.longitude),
        }
    }
}

/// Inclusive calendar-date window. Serialized as
/// `{"start": "YYYY-MM-DD", "end": "YYYY-MM-DD"}` in the `date_range` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// One collected payload, written once per location and window.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherRecord {
    pub location_name: String,
    pub latitude: String,
    pub longitude: String,
    /// NOAA `/data` response body, stored verbatim.
    pub historical_data: serde_json::Value,
    /// When the fetch happened, not when the measurements were taken.
    pub collected_at: DateTime<Utc>,
    pub date_range: DateRange,
    pub station_id: String,
    pub station_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_location_from_city() {
        let city = City {
            id: 1,
            name: "Chicago".into(),
            state: "Illinois".into(),
            state_code: "IL".into(),
            display_name: "Chicago, IL".into(),
            slug: "chicago-il".into(),
            latitude: Decimal::from_str("41.8781").unwrap(),
            longitude: Decimal::from_str("-87.6298").unwrap(),
            timezone: "America/Chicago".into(),
            population: 2_746_388,
            active: true,
        };

        let location = Location::from(city);
        assert_eq!(location.name, "Chicago, IL");
        assert_eq!(location.latitude, "41.8781");
        assert_eq!(location.longitude, "-87.6298");
    }

    #[test]
    fn test_date_range_json_shape() {
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
        };
        let json = serde_json::to_value(range).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "start": "2026-03-03", "end": "2026-03-09" })
        );
    }
}
