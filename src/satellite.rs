//! Thin wrapper around the `sgp4` crate: loads TLE files and propagates each
//! satellite forward to a state vector the rest of the system can consume
//! as either a geodetic sub-point (ephemeris server, SBS-1 emission) or a
//! topocentric direction (tracker, via `astro_math::satellite_topocentric`).

use std::path::Path;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

use crate::astro_math::{ecef_to_geodetic, teme_to_ecef_km, Vec3};

/// The TLE epoch reference date (1949-12-31T00:00:00Z); `Elements::epoch` is
/// days since this instant.
fn tle_epoch_base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1949, 12, 31, 0, 0, 0).unwrap()
}

pub struct SatelliteTrack {
    pub hex_ident: String,
    pub name: String,
    epoch: DateTime<Utc>,
    constants: sgp4::Constants,
}

#[derive(Debug, Clone, Copy)]
pub struct SatelliteState {
    /// TEME position, km.
    pub position_km: Vec3,
    /// TEME velocity, km/s.
    pub velocity_km_s: Vec3,
}

impl SatelliteTrack {
    pub fn from_elements(elements: sgp4::Elements) -> Result<Self, sgp4::Error> {
        let epoch = tle_epoch_base() + ChronoDuration::milliseconds((elements.epoch * 86_400_000.0) as i64);
        let hex_ident = format!("{:06X}", elements.norad_id & 0xFF_FFFF);
        let name = elements
            .object_name
            .clone()
            .unwrap_or_else(|| format!("NORAD {}", elements.norad_id));
        let constants = sgp4::Constants::from_elements(&elements)?;
        Ok(SatelliteTrack {
            hex_ident,
            name,
            epoch,
            constants,
        })
    }

    /// Propagates to `time`, returning the TEME state vector.
    pub fn propagate(&self, time: DateTime<Utc>) -> Result<SatelliteState, sgp4::Error> {
        let minutes_since_epoch = (time - self.epoch).num_milliseconds() as f64 / 60_000.0;
        let prediction = self.constants.propagate(minutes_since_epoch)?;
        Ok(SatelliteState {
            position_km: Vec3::new(
                prediction.position[0],
                prediction.position[1],
                prediction.position[2],
            ),
            velocity_km_s: Vec3::new(
                prediction.velocity[0],
                prediction.velocity[1],
                prediction.velocity[2],
            ),
        })
    }

    /// Sub-satellite geodetic point and altitude (meters), plus ground-track
    /// speed and bearing — the fields an SBS-1 airborne position/velocity
    /// pair needs.
    pub fn geodetic_sub_point(
        &self,
        time: DateTime<Utc>,
    ) -> Result<(f64, f64, f64, f64, f64, f64), sgp4::Error> {
        let state = self.propagate(time)?;
        let ecef_km = teme_to_ecef_km(time, &state.position_km);
        let ecef_m = ecef_km.scale(1000.0);
        let (lat, lon, alt_m) = ecef_to_geodetic(&ecef_m);

        let speed_km_s = state.velocity_km_s.norm();
        let ground_speed_kt = speed_km_s * 1943.844; // km/s -> knots
        let track_deg = state.velocity_km_s.y.atan2(state.velocity_km_s.x).to_degrees();
        let vertical_rate_fpm = state.velocity_km_s.z * 196_850.4; // km/s -> ft/min

        Ok((lat, lon, alt_m, ground_speed_kt, track_deg, vertical_rate_fpm))
    }
}

/// Parses a multi-satellite 3LE/2LE text file into tracks. Malformed entries
/// are skipped (a Configuration error would be too strong for one bad entry
/// in an otherwise-good file; the caller logs how many were loaded).
pub fn load_tle_file(path: &Path) -> std::io::Result<Vec<SatelliteTrack>> {
    let text = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = text.lines().collect();

    let mut tracks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let (name, line1_idx) = if lines[i].starts_with('1') {
            (None, i)
        } else if i + 1 < lines.len() {
            (Some(lines[i].trim().to_string()), i + 1)
        } else {
            break;
        };

        if line1_idx + 1 >= lines.len() {
            break;
        }
        let line1 = lines[line1_idx];
        let line2 = lines[line1_idx + 1];

        if let Ok(elements) = sgp4::Elements::from_tle(name, line1.as_bytes(), line2.as_bytes()) {
            if let Ok(track) = SatelliteTrack::from_elements(elements) {
                tracks.push(track);
            }
        }

        i = line1_idx + 2;
    }

    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISS_L1: &str =
        "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992";
    const ISS_L2: &str =
        "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008";

    fn iss_track() -> SatelliteTrack {
        let elements = sgp4::Elements::from_tle(
            Some("ISS (ZARYA)".to_owned()),
            ISS_L1.as_bytes(),
            ISS_L2.as_bytes(),
        )
        .unwrap();
        SatelliteTrack::from_elements(elements).unwrap()
    }

    #[test]
    fn propagates_at_epoch_without_error() {
        let track = iss_track();
        let state = track.propagate(track.epoch).unwrap();
        // ISS orbits at roughly 6700-6900 km from Earth's center.
        assert!(state.position_km.norm() > 6000.0 && state.position_km.norm() < 7500.0);
    }

    #[test]
    fn sub_point_altitude_is_plausible_for_leo() {
        let track = iss_track();
        let (_, _, alt_m, _, _, _) = track.geodetic_sub_point(track.epoch).unwrap();
        assert!(alt_m > 300_000.0 && alt_m < 500_000.0, "alt_m={alt_m}");
    }

    #[test]
    fn hex_ident_is_derived_from_norad_id() {
        let track = iss_track();
        assert_eq!(track.hex_ident, "006399");
    }

    #[test]
    fn load_tle_file_parses_a_three_line_entry() {
        let dir = std::env::temp_dir();
        let path = dir.join("nexplane_test_iss.tle");
        std::fs::write(&path, format!("ISS (ZARYA)\n{}\n{}\n", ISS_L1, ISS_L2)).unwrap();

        let tracks = load_tle_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "ISS (ZARYA)");
    }
}
