//! Telemetry Snapshot Model
//!
//! The immutable result record published after each successful read cycle.

use crate::domain::geomagnetic::decimal_year;
use crate::domain::models::{Coordinates, SensorReading};
use crate::domain::solar;
use crate::error::GeometryError;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub apparent_solar_time: DateTime<FixedOffset>,
    pub corrected_solar_time: DateTime<FixedOffset>,
    pub sidereal_time: DateTime<FixedOffset>,
    pub declination: f64,
    pub azimuth: f64,
    pub altitude: f64,
    pub longitude: f64,
    pub latitude: f64,
    /// Hours; negative before solar noon for positive azimuths.
    pub hour_angle: f64,
    pub equation_of_time_minutes: f64,
    pub magnetic_declination: f64,
    pub local_mean_sidereal_hours: f64,
    /// Wall-clock instant every field was derived from.
    pub computed_at: DateTime<FixedOffset>,
}

impl TelemetrySnapshot {
    /// Derive every field from one reading, one position and one instant.
    ///
    /// Either the whole snapshot is produced or nothing is.
    pub fn compute(
        reading: SensorReading,
        coordinates: Coordinates,
        now: DateTime<FixedOffset>,
    ) -> Result<Self, GeometryError> {
        let declination = solar::declination(&coordinates, &now);
        let hour_angle =
            solar::hour_angle(&coordinates, reading.azimuth, reading.altitude, declination)?;
        let equation_of_time_minutes = solar::equation_of_time(&coordinates, &now);
        let apparent_solar_time = solar::apparent_solar_time(&now, hour_angle);
        let corrected_solar_time =
            solar::corrected_local_solar_time(&coordinates, &now, hour_angle);
        let sidereal_time = solar::local_sidereal_time(corrected_solar_time);
        let magnetic_declination = solar::magnetic_declination(&coordinates, decimal_year(&now));
        let local_mean_sidereal_hours =
            solar::local_mean_sidereal_hours(now.with_timezone(&Utc), coordinates.longitude);

        Ok(Self {
            apparent_solar_time,
            corrected_solar_time,
            sidereal_time,
            declination,
            azimuth: reading.azimuth,
            altitude: reading.altitude,
            longitude: coordinates.longitude,
            latitude: coordinates.latitude,
            hour_angle,
            equation_of_time_minutes,
            magnetic_declination,
            local_mean_sidereal_hours,
            computed_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spring_morning() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(6 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 4, 15, 10, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_snapshot_fields_share_inputs() {
        let coords = Coordinates::new(50.4356, -104.5554).unwrap();
        let reading = SensorReading {
            azimuth: 171.62,
            altitude: 31.76,
        };
        let now = spring_morning();
        let snapshot = TelemetrySnapshot::compute(reading, coords, now).unwrap();

        assert_eq!(snapshot.azimuth, 171.62);
        assert_eq!(snapshot.altitude, 31.76);
        assert_eq!(snapshot.latitude, 50.4356);
        assert_eq!(snapshot.longitude, -104.5554);
        assert_eq!(snapshot.computed_at, now);
        assert!(snapshot.declination > 0.0);
        assert!(snapshot.hour_angle < 0.0);
        assert_eq!(snapshot.sidereal_time, snapshot.corrected_solar_time);
        assert!(snapshot.magnetic_declination.is_finite());
        assert!((0.0..24.0).contains(&snapshot.local_mean_sidereal_hours));
    }

    #[test]
    fn test_degenerate_geometry_produces_no_snapshot() {
        let pole = Coordinates::new(-90.0, 0.0).unwrap();
        let reading = SensorReading {
            azimuth: 10.0,
            altitude: 5.0,
        };
        let result = TelemetrySnapshot::compute(reading, pole, spring_morning());
        assert_eq!(result, Err(GeometryError::DegenerateHourAngle));
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let coords = Coordinates::new(10.0, 20.0).unwrap();
        let reading = SensorReading {
            azimuth: -45.0,
            altitude: 30.0,
        };
        let snapshot = TelemetrySnapshot::compute(reading, coords, spring_morning()).unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("equationOfTimeMinutes").is_some());
        assert!(json.get("correctedSolarTime").is_some());
        assert_eq!(json["azimuth"], -45.0);
    }
}
