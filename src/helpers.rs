//! Shared helpers for coordinate formatting and the collection window.
//!
//! City coordinates are stored as NUMERIC and handed to the NOAA API (and the
//! `weather_data` table) as plain decimal strings, so the string form must be
//! stable: trailing zeros are trimmed (`41.8800` → `41.88`).

use chrono::{Duration, Local, NaiveDate};
use rust_decimal::Decimal;

use crate::db::models::DateRange;

/// Days before "today" at which the trailing window starts.
const WINDOW_START_DAYS_BACK: i64 = 7;

/// Days before "today" at which the trailing window ends.
const WINDOW_END_DAYS_BACK: i64 = 1;

/// Render a coordinate as a plain decimal string without trailing zeros.
pub(crate) fn coordinate_to_string(d: Decimal) -> String {
    d.normalize().to_string()
}

/// The trailing collection window relative to `today`: from 7 days back to
/// yesterday, both inclusive.
pub(crate) fn trailing_window(today: NaiveDate) -> DateRange {
    DateRange {
        start: today - Duration::days(WINDOW_START_DAYS_BACK),
        end: today - Duration::days(WINDOW_END_DAYS_BACK),
    }
}

/// Today's calendar date in the local timezone (the API's date convention).
pub(crate) fn local_today() -> NaiveDate {
    Local::now().date_naive()
}
