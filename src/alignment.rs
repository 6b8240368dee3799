//! Single-point landmark alignment: resolves a named landmark to a world
//! (az, el), takes one mount attitude reading, and derives the constant
//! offset used to map every subsequent mount reading into world frame (and,
//! inverted, every absolute slew target into mount frame).

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::astro_math::{sun_topocentric, wrap_pm180, Degrees};
use crate::config::{Landmark, LocationConfig, RunConfig};
use crate::error::ConfigError;

/// The angles added to a mount reading to recover the world direction; the
/// inverse is subtracted from a world direction to get a mount-frame slew
/// target. Because this is a single-point alignment, accuracy degrades with
/// angular distance from the landmark used to derive it — an accepted
/// limitation, not a bug, for non-alt-az-aligned mounts.
#[derive(Debug, Clone, Copy)]
pub struct AlignmentOffset {
    pub d_axis1: Degrees,
    pub d_axis2: Degrees,
}

impl AlignmentOffset {
    pub fn identity() -> Self {
        AlignmentOffset {
            d_axis1: 0.0,
            d_axis2: 0.0,
        }
    }

    pub fn from_reading(world: (Degrees, Degrees), mount: (Degrees, Degrees)) -> Self {
        AlignmentOffset {
            d_axis1: wrap_pm180(world.0 - mount.0),
            d_axis2: world.1 - mount.1,
        }
    }

    pub fn mount_to_world(&self, mount: (Degrees, Degrees)) -> (Degrees, Degrees) {
        (
            crate::astro_math::modulo(mount.0 + self.d_axis1, 360.0),
            mount.1 + self.d_axis2,
        )
    }

    pub fn world_to_mount(&self, world: (Degrees, Degrees)) -> (Degrees, Degrees) {
        (
            crate::astro_math::modulo(world.0 - self.d_axis1, 360.0),
            world.1 - self.d_axis2,
        )
    }
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    az_degrees: Degrees,
    el_degrees: Degrees,
}

/// Resolves a landmark to a world (az, el) at `time`, as seen from the
/// observer named in `config`. Named landmarks are terrestrial points looked
/// up in `config.locations`; solar-system bodies use a local low-precision
/// ephemeris; stars go through the configured HTTP catalog. The star branch
/// blocks on network I/O, so callers run the whole function inside
/// `tokio::task::spawn_blocking` rather than special-casing just that arm.
pub fn resolve_landmark(
    landmark: &Landmark,
    config: &RunConfig,
    time: DateTime<Utc>,
) -> Result<(Degrees, Degrees), ConfigError> {
    match landmark {
        Landmark::Named(name) => resolve_terrestrial_landmark(name, &config.observer, config),
        Landmark::SolarSystemBody(name) => resolve_solar_system_body(name, &config.observer, time),
        Landmark::Star(name) => resolve_star_landmark(name, &config.star_catalog_url),
    }
}

fn resolve_solar_system_body(
    name: &str,
    observer: &LocationConfig,
    time: DateTime<Utc>,
) -> Result<(Degrees, Degrees), ConfigError> {
    match name {
        "sun" => Ok(sun_topocentric(
            time,
            observer.lat_degrees,
            observer.lon_degrees,
        )),
        other => {
            // Only the Sun has a low-precision ephemeris implemented locally;
            // anything else is a configuration error at alignment time.
            Err(ConfigError::UnknownLandmark(other.to_string()))
        }
    }
}

fn resolve_terrestrial_landmark(
    name: &str,
    observer: &LocationConfig,
    config: &RunConfig,
) -> Result<(Degrees, Degrees), ConfigError> {
    let landmark_loc = config
        .locations
        .get(name)
        .ok_or_else(|| ConfigError::UnknownLandmark(name.to_string()))?;

    let observer_ecef = crate::astro_math::geodetic_to_ecef(
        observer.lat_degrees,
        observer.lon_degrees,
        observer.alt_meters,
    );
    let landmark_ecef = crate::astro_math::geodetic_to_ecef(
        landmark_loc.lat_degrees,
        landmark_loc.lon_degrees,
        landmark_loc.alt_meters,
    );
    let delta = landmark_ecef.sub(&observer_ecef);
    let enu = crate::astro_math::ecef_to_enu(observer.lat_degrees, observer.lon_degrees, &delta);
    let (az, el) = crate::astro_math::enu_to_az_el(&enu);
    Ok((az.unwrap_or(0.0), el))
}

/// Looks up a named star in the configured HTTP catalog. Blocking, so
/// callers must run this inside `tokio::task::spawn_blocking` — the one
/// documented external-HTTP suspension point in the whole system.
pub fn resolve_star_landmark(name: &str, catalog_url: &str) -> Result<(Degrees, Degrees), ConfigError> {
    let url = format!("{catalog_url}/stars/{name}");
    let entry: CatalogEntry = ureq::get(&url)
        .call()
        .map_err(|_| ConfigError::UnknownLandmark(name.to_string()))?
        .into_json()
        .map_err(|_| ConfigError::UnknownLandmark(name.to_string()))?;
    Ok((entry.az_degrees, entry.el_degrees))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_offset_is_a_no_op() {
        let offset = AlignmentOffset::identity();
        let world = offset.mount_to_world((123.4, 45.6));
        assert!((world.0 - 123.4).abs() < 1e-9);
        assert!((world.1 - 45.6).abs() < 1e-9);
    }

    #[test]
    fn from_reading_then_mount_to_world_recovers_landmark() {
        let world = (200.0, 30.0);
        let mount = (190.0, 25.0);
        let offset = AlignmentOffset::from_reading(world, mount);
        let recovered = offset.mount_to_world(mount);
        assert!((recovered.0 - world.0).abs() < 1e-9);
        assert!((recovered.1 - world.1).abs() < 1e-9);
    }

    #[test]
    fn world_to_mount_is_the_inverse() {
        let offset = AlignmentOffset::from_reading((200.0, 30.0), (190.0, 25.0));
        let mount = offset.world_to_mount((200.0, 30.0));
        assert!((mount.0 - 190.0).abs() < 1e-9);
        assert!((mount.1 - 25.0).abs() < 1e-9);
    }

    #[test]
    fn offset_wraps_azimuth_difference_the_short_way() {
        let offset = AlignmentOffset::from_reading((5.0, 0.0), (355.0, 0.0));
        assert!((offset.d_axis1 - 10.0).abs() < 1e-9, "{}", offset.d_axis1);
    }
}
