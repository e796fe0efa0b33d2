//! Solar Math Engine
//!
//! Pure functions turning an observer position, a sun azimuth/altitude pair and
//! a wall-clock date into solar time quantities. Angles are degrees and times
//! are minutes unless stated otherwise; trigonometry runs in radians inside
//! each function.

use crate::domain::geomagnetic;
use crate::domain::geometry::{
    day_of_year, timezone_offset_minutes, to_degrees, to_radians, truncate_to_local_midnight,
};
use crate::domain::models::Coordinates;
use crate::error::GeometryError;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use std::f64::consts::PI;

/// Peak solar declination used by the cosine approximation.
pub const AXIAL_TILT_DEG: f64 = 23.45;

const DAYS_PER_YEAR: f64 = 365.0;
const MINUTES_PER_DEGREE: f64 = 4.0;
const DEGREES_PER_HOUR: f64 = 15.0;

/// Unix timestamp of J2000.0 (2000-01-01T12:00:00Z), in milliseconds.
const J2000_UNIX_MS: i64 = 946_728_000_000;
const DAYS_PER_JULIAN_CENTURY: f64 = 36525.0;
const GMST_BASE_DEG: f64 = 280.46061837;
const GMST_ROTATION_PER_DAY: f64 = 360.98564736629;
const GMST_CORRECTION: f64 = 0.000387933;

/// Solar declination for the date, in degrees within [-23.45, 23.45].
///
/// Longitude is not used by this approximation.
pub fn declination(_coordinates: &Coordinates, date: &DateTime<FixedOffset>) -> f64 {
    let day = day_of_year(date) as f64;
    -AXIAL_TILT_DEG * ((2.0 * PI / DAYS_PER_YEAR) * (day + 10.0)).cos()
}

/// Hour angle in hours, solved from the altitude identity
/// `sin(alt) = sin(lat)sin(dec) + cos(lat)cos(dec)cos(HA)`.
///
/// The cosine is clamped to [-1, 1] before `acos`, and the result takes the
/// opposite sign of the azimuth (an azimuth of zero counts as positive).
pub fn hour_angle(
    coordinates: &Coordinates,
    azimuth: f64,
    altitude: f64,
    declination: f64,
) -> Result<f64, GeometryError> {
    if !(azimuth.is_finite() && altitude.is_finite() && declination.is_finite()) {
        return Err(GeometryError::NonFinite("hour_angle"));
    }

    let latitude = to_radians(coordinates.latitude);
    let altitude = to_radians(altitude);
    let declination = to_radians(declination);

    let denominator = latitude.cos() * declination.cos();
    if denominator.abs() < 1e-12 {
        return Err(GeometryError::DegenerateHourAngle);
    }

    let cos_ha = ((altitude.sin() - latitude.sin() * declination.sin()) / denominator)
        .clamp(-1.0, 1.0);
    let ha = -azimuth.signum() * to_degrees(cos_ha.acos());

    Ok(ha / DEGREES_PER_HOUR)
}

/// Equation of time in minutes.
pub fn equation_of_time(_coordinates: &Coordinates, date: &DateTime<FixedOffset>) -> f64 {
    let g = (day_of_year(date) as f64 - 81.0) * (2.0 * PI / DAYS_PER_YEAR);
    9.87 * (2.0 * g).sin() - 7.53 * g.cos() - 1.5 * g.sin()
}

/// Apparent solar time: `(HA° + 180) * 4` minutes after the date's local midnight.
pub fn apparent_solar_time(date: &DateTime<FixedOffset>, hour_angle: f64) -> DateTime<FixedOffset> {
    let minutes = (hour_angle * DEGREES_PER_HOUR + 180.0) * MINUTES_PER_DEGREE;
    truncate_to_local_midnight(date) + minutes_to_duration(minutes)
}

/// Minutes to add to apparent solar time: `4·|longitude| − timezone offset − EoT`.
pub fn time_correction_minutes(coordinates: &Coordinates, date: &DateTime<FixedOffset>) -> f64 {
    MINUTES_PER_DEGREE * coordinates.longitude.abs()
        - timezone_offset_minutes(date) as f64
        - equation_of_time(coordinates, date)
}

/// Floor an apparent time to the whole minute and shift it by `correction` minutes.
pub fn apply_time_correction(
    apparent: DateTime<FixedOffset>,
    correction: f64,
) -> DateTime<FixedOffset> {
    let midnight = truncate_to_local_midnight(&apparent);
    let whole_minutes = (apparent - midnight).num_minutes();
    midnight + Duration::minutes(whole_minutes) + minutes_to_duration(correction)
}

/// Apparent solar time corrected for longitude, timezone and the equation of time.
///
/// The result may fall on the previous or next calendar day.
pub fn corrected_local_solar_time(
    coordinates: &Coordinates,
    date: &DateTime<FixedOffset>,
    hour_angle: f64,
) -> DateTime<FixedOffset> {
    apply_time_correction(
        apparent_solar_time(date, hour_angle),
        time_correction_minutes(coordinates, date),
    )
}

/// Sidereal time as currently published to consumers.
///
/// This passes the corrected solar time through unchanged. A real conversion is
/// available as [`local_mean_sidereal_hours`].
pub fn local_sidereal_time(corrected_local_solar_time: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    corrected_local_solar_time
}

/// Greenwich mean sidereal time in degrees, [0, 360).
pub fn greenwich_mean_sidereal_degrees(instant: DateTime<Utc>) -> f64 {
    let days = (instant.timestamp_millis() - J2000_UNIX_MS) as f64 / 86_400_000.0;
    let centuries = days / DAYS_PER_JULIAN_CENTURY;
    let gmst = GMST_BASE_DEG + GMST_ROTATION_PER_DAY * days + GMST_CORRECTION * centuries * centuries
        - centuries * centuries * centuries / 38_710_000.0;
    gmst.rem_euclid(360.0)
}

/// Local mean sidereal time in hours, [0, 24).
pub fn local_mean_sidereal_hours(instant: DateTime<Utc>, longitude: f64) -> f64 {
    (greenwich_mean_sidereal_degrees(instant) + longitude).rem_euclid(360.0) / DEGREES_PER_HOUR
}

/// Magnetic declination in degrees (east positive) at the given decimal-year epoch.
pub fn magnetic_declination(coordinates: &Coordinates, epoch: f64) -> f64 {
    geomagnetic::declination(coordinates, epoch)
}

fn minutes_to_duration(minutes: f64) -> Duration {
    Duration::milliseconds((minutes * 60_000.0).round() as i64)
}
