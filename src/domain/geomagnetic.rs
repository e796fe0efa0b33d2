//! Geomagnetic main-field model
//!
//! Spherical-harmonic expansion of the IGRF-13 main field, truncated to
//! degree 3. Evaluated on the reference sphere (r = a) with geodetic latitude
//! taken as geocentric, which keeps declination within a few degrees of the
//! full model across populated latitudes.

use crate::domain::geometry::{to_degrees, to_radians};
use crate::domain::models::Coordinates;
use chrono::{DateTime, Datelike, FixedOffset, Timelike};

/// Reference epoch of the coefficient table.
pub const MODEL_EPOCH: f64 = 2020.0;

/// Schmidt semi-normalized Gauss coefficient with its secular variation (nT, nT/yr).
#[derive(Debug, Clone, Copy)]
struct GaussCoefficient {
    n: usize,
    m: usize,
    g: f64,
    h: f64,
    g_dot: f64,
    h_dot: f64,
}

const fn coef(n: usize, m: usize, g: f64, h: f64, g_dot: f64, h_dot: f64) -> GaussCoefficient {
    GaussCoefficient {
        n,
        m,
        g,
        h,
        g_dot,
        h_dot,
    }
}

const IGRF13: [GaussCoefficient; 9] = [
    coef(1, 0, -29404.8, 0.0, 5.7, 0.0),
    coef(1, 1, -1450.9, 4652.5, 7.4, -25.9),
    coef(2, 0, -2499.6, 0.0, -11.0, 0.0),
    coef(2, 1, 2982.0, -2991.6, -7.0, -30.2),
    coef(2, 2, 1677.0, -734.6, -2.1, -22.4),
    coef(3, 0, 1363.2, 0.0, 2.2, 0.0),
    coef(3, 1, -2381.2, -82.1, -5.9, 6.0),
    coef(3, 2, 1236.2, 241.9, 3.1, -1.1),
    coef(3, 3, 525.7, -543.4, -12.0, 0.5),
];

/// Associated Legendre terms for one (n, m): P, dP/dθ, and P/sin θ.
#[derive(Debug, Clone, Copy, Default)]
struct Legendre {
    p: f64,
    dp: f64,
    p_over_sin: f64,
}

/// Closed forms up to degree 3, written so that P/sin θ never divides by zero.
fn legendre(n: usize, m: usize, x: f64, s: f64) -> Legendre {
    let sqrt3 = 3f64.sqrt();
    match (n, m) {
        (1, 0) => Legendre {
            p: x,
            dp: -s,
            p_over_sin: 0.0,
        },
        (1, 1) => Legendre {
            p: s,
            dp: x,
            p_over_sin: 1.0,
        },
        (2, 0) => Legendre {
            p: (3.0 * x * x - 1.0) / 2.0,
            dp: -3.0 * x * s,
            p_over_sin: 0.0,
        },
        (2, 1) => Legendre {
            p: sqrt3 * x * s,
            dp: sqrt3 * (x * x - s * s),
            p_over_sin: sqrt3 * x,
        },
        (2, 2) => Legendre {
            p: sqrt3 / 2.0 * s * s,
            dp: sqrt3 * s * x,
            p_over_sin: sqrt3 / 2.0 * s,
        },
        (3, 0) => Legendre {
            p: (5.0 * x * x * x - 3.0 * x) / 2.0,
            dp: -1.5 * s * (5.0 * x * x - 1.0),
            p_over_sin: 0.0,
        },
        (3, 1) => {
            let k = (3.0f64 / 8.0).sqrt();
            Legendre {
                p: k * s * (5.0 * x * x - 1.0),
                dp: k * (x * (5.0 * x * x - 1.0) - 10.0 * x * s * s),
                p_over_sin: k * (5.0 * x * x - 1.0),
            }
        }
        (3, 2) => {
            let k = 15f64.sqrt() / 2.0;
            Legendre {
                p: k * x * s * s,
                dp: k * (2.0 * x * x * s - s * s * s),
                p_over_sin: k * x * s,
            }
        }
        (3, 3) => {
            let k = (5.0f64 / 8.0).sqrt();
            Legendre {
                p: k * s * s * s,
                dp: 3.0 * k * s * s * x,
                p_over_sin: k * s * s,
            }
        }
        _ => Legendre::default(),
    }
}

/// Horizontal field components (north X, east Y) in nT at the given epoch.
pub fn horizontal_field(coordinates: &Coordinates, epoch: f64) -> (f64, f64) {
    let theta = to_radians(90.0 - coordinates.latitude);
    let phi = to_radians(coordinates.longitude);
    let (s, x) = theta.sin_cos();
    let dt = epoch - MODEL_EPOCH;

    let mut north = 0.0;
    let mut east = 0.0;
    for c in IGRF13.iter() {
        let g = c.g + c.g_dot * dt;
        let h = c.h + c.h_dot * dt;
        let (sin_mphi, cos_mphi) = (c.m as f64 * phi).sin_cos();
        let terms = legendre(c.n, c.m, x, s);

        north += (g * cos_mphi + h * sin_mphi) * terms.dp;
        east += c.m as f64 * (g * sin_mphi - h * cos_mphi) * terms.p_over_sin;
    }
    (north, east)
}

/// Magnetic declination in degrees, east positive.
pub fn declination(coordinates: &Coordinates, epoch: f64) -> f64 {
    let (north, east) = horizontal_field(coordinates, epoch);
    to_degrees(east.atan2(north))
}

/// Fractional year of the instant, e.g. 2024.5 for early July 2024.
pub fn decimal_year(date: &DateTime<FixedOffset>) -> f64 {
    let utc = date.naive_utc();
    let days_in_year = if utc.date().leap_year() { 366.0 } else { 365.0 };
    let day_fraction = utc.num_seconds_from_midnight() as f64 / 86_400.0;
    utc.year() as f64 + (utc.ordinal0() as f64 + day_fraction) / days_in_year
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn coords(lat: f64, lon: f64) -> Coordinates {
        Coordinates::new(lat, lon).unwrap()
    }

    #[test]
    fn test_dipole_field_points_north() {
        let (north, _) = horizontal_field(&coords(0.0, 0.0), MODEL_EPOCH);
        assert!(north > 20_000.0);
    }

    #[test]
    fn test_declination_sign_across_north_america() {
        // Pacific northwest points east of true north, Quebec points west
        let seattle = declination(&coords(47.6, -122.3), 2025.0);
        let montreal = declination(&coords(45.5, -73.6), 2025.0);
        assert!(seattle > 5.0 && seattle < 25.0, "seattle: {}", seattle);
        assert!(montreal < -3.0 && montreal > -25.0, "montreal: {}", montreal);
    }

    #[test]
    fn test_declination_is_finite_everywhere() {
        for lat in [-90.0, -60.0, -10.0, 0.0, 33.3, 89.9, 90.0] {
            for lon in [-180.0, -104.5554, 0.0, 45.0, 180.0] {
                let d = declination(&coords(lat, lon), 2026.0);
                assert!(d.is_finite());
                assert!((-180.0..=180.0).contains(&d));
            }
        }
    }

    #[test]
    fn test_decimal_year() {
        let start = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap();
        assert_eq!(decimal_year(&start), 2024.0);

        let mid = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2023, 7, 2, 12, 0, 0)
            .unwrap();
        assert!((decimal_year(&mid) - 2023.5).abs() < 0.01);
    }
}
