//! Geometry Primitives
//!
//! Stateless angle and calendar helpers shared by the solar math engine.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, TimeZone};
use std::f64::consts::PI;

pub fn to_radians(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

pub fn to_degrees(radians: f64) -> f64 {
    radians * 180.0 / PI
}

/// Map a negative angle into [0, 360) by adding a single turn.
///
/// Inputs are expected within (-360, 360).
pub fn normalize_angle(degrees: f64) -> f64 {
    if degrees < 0.0 {
        degrees + 360.0
    } else {
        degrees
    }
}

/// Strip the time of day, keeping the calendar date and UTC offset.
pub fn truncate_to_local_midnight(date: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let midnight = date.date_naive().and_time(NaiveTime::MIN);
    // A fixed offset maps every local time to exactly one instant
    date.offset()
        .from_local_datetime(&midnight)
        .single()
        .unwrap_or(*date)
}

/// Day of the year in 1..=366, counted from day 0 (December 31 of the previous year).
pub fn day_of_year(date: &DateTime<FixedOffset>) -> u32 {
    truncate_to_local_midnight(date).ordinal()
}

/// Minutes west of UTC for the date's offset (UTC minus local time).
pub fn timezone_offset_minutes(date: &DateTime<FixedOffset>) -> i32 {
    -date.offset().local_minus_utc() / 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(offset_hours: i32, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(offset_hours * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_degree_radian_conversion() {
        assert!((to_radians(180.0) - PI).abs() < 1e-12);
        assert!((to_degrees(PI / 2.0) - 90.0).abs() < 1e-12);
        assert!((to_degrees(to_radians(-37.25)) + 37.25).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(-90.0), 270.0);
        assert_eq!(normalize_angle(45.0), 45.0);
        assert_eq!(normalize_angle(0.0), 0.0);
        assert!((normalize_angle(-104.5554) - 255.4446).abs() < 1e-9);
    }

    #[test]
    fn test_truncate_keeps_local_date() {
        // 23:30 at UTC-6 is already the next day in UTC
        let date = at(-6, 2024, 3, 20, 23, 30);
        let midnight = truncate_to_local_midnight(&date);
        assert_eq!(midnight.day(), 20);
        assert_eq!(midnight.hour(), 0);
        assert_eq!(midnight.minute(), 0);
        assert_eq!(midnight.offset(), date.offset());
    }

    #[test]
    fn test_day_of_year() {
        assert_eq!(day_of_year(&at(0, 2023, 1, 1, 12, 0)), 1);
        assert_eq!(day_of_year(&at(0, 2023, 12, 31, 0, 0)), 365);
        assert_eq!(day_of_year(&at(0, 2024, 12, 31, 23, 59)), 366);
        assert_eq!(day_of_year(&at(-6, 2024, 3, 1, 23, 0)), 61);
    }

    #[test]
    fn test_timezone_offset_is_minutes_west() {
        assert_eq!(timezone_offset_minutes(&at(-6, 2024, 1, 1, 0, 0)), 360);
        assert_eq!(timezone_offset_minutes(&at(2, 2024, 1, 1, 0, 0)), -120);
        assert_eq!(timezone_offset_minutes(&at(0, 2024, 1, 1, 0, 0)), 0);
    }
}
