//! A position+velocity report destined for the fusion task. Both aircraft
//! and satellites arrive in the same SBS-1 wire shape (the ephemeris server
//! synthesizes the aircraft schema for its sub-satellite points); the two
//! variants exist so the ingest task can tag provenance (`is_space`) and a
//! satellite's catalog name without overloading the aircraft callsign field.

use chrono::{DateTime, Utc};

use crate::astro_math::{ecef_to_enu, geodetic_to_ecef, Vec3};
use crate::config::LocationConfig;

#[derive(Debug, Clone)]
pub enum Report {
    Aircraft {
        hex_ident: String,
        callsign: Option<String>,
        timestamp: DateTime<Utc>,
        lat: f64,
        lon: f64,
        altitude_ft: Option<f64>,
        ground_speed_kt: Option<f64>,
        track_deg: Option<f64>,
        vertical_rate_fpm: Option<f64>,
    },
    Satellite {
        hex_ident: String,
        name: Option<String>,
        timestamp: DateTime<Utc>,
        lat: f64,
        lon: f64,
        altitude_m: f64,
        ground_speed_kt: f64,
        track_deg: f64,
        vertical_rate_fpm: f64,
    },
}

const KNOTS_TO_MPS: f64 = 0.514444;
const FPM_TO_MPS: f64 = 0.00508;
const FEET_TO_METERS: f64 = 0.3048;

impl Report {
    pub(super) fn into_enu(
        self,
        observer: &LocationConfig,
    ) -> (String, Option<String>, bool, Vec3, Vec3, DateTime<Utc>) {
        let observer_ecef = geodetic_to_ecef(
            observer.lat_degrees,
            observer.lon_degrees,
            observer.alt_meters,
        );

        match self {
            Report::Aircraft {
                hex_ident,
                callsign,
                timestamp,
                lat,
                lon,
                altitude_ft,
                ground_speed_kt,
                track_deg,
                vertical_rate_fpm,
            } => {
                let alt_m = altitude_ft.unwrap_or(0.0) * FEET_TO_METERS;
                let ecef = geodetic_to_ecef(lat, lon, alt_m);
                let p0 = ecef_to_enu(
                    observer.lat_degrees,
                    observer.lon_degrees,
                    &ecef.sub(&observer_ecef),
                );

                let gs_mps = ground_speed_kt.unwrap_or(0.0) * KNOTS_TO_MPS;
                let track_rad = track_deg.unwrap_or(0.0).to_radians();
                let v0 = Vec3::new(
                    gs_mps * track_rad.sin(),
                    gs_mps * track_rad.cos(),
                    vertical_rate_fpm.unwrap_or(0.0) * FPM_TO_MPS,
                );

                (hex_ident, callsign, false, p0, v0, timestamp)
            }
            Report::Satellite {
                hex_ident,
                name,
                timestamp,
                lat,
                lon,
                altitude_m,
                ground_speed_kt,
                track_deg,
                vertical_rate_fpm,
            } => {
                let ecef = geodetic_to_ecef(lat, lon, altitude_m);
                let p0 = ecef_to_enu(
                    observer.lat_degrees,
                    observer.lon_degrees,
                    &ecef.sub(&observer_ecef),
                );

                let gs_mps = ground_speed_kt * KNOTS_TO_MPS;
                let track_rad = track_deg.to_radians();
                let v0 = Vec3::new(
                    gs_mps * track_rad.sin(),
                    gs_mps * track_rad.cos(),
                    vertical_rate_fpm * FPM_TO_MPS,
                );

                (hex_ident, name, true, p0, v0, timestamp)
            }
        }
    }
}
