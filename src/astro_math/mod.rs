#![allow(dead_code)]

use chrono::{Datelike, Timelike};
use polynomials::poly;
use std::f64::consts::{PI, TAU};

pub type Hours = f64;
pub type Degrees = f64;
pub type Radians = f64;

pub fn deg_to_rad(degrees: Degrees) -> Radians {
    PI * degrees / 180.
}

pub fn rad_to_deg(rad: Radians) -> Degrees {
    180. * rad / PI
}

pub fn hours_to_rad(hours: Hours) -> Radians {
    PI * hours / 12.
}

pub fn rad_to_hours(rad: Radians) -> Hours {
    12. * rad / PI
}

pub fn deg_to_hours(deg: Degrees) -> Hours {
    deg / 15.
}

pub fn hours_to_deg(hours: Hours) -> Degrees {
    hours * 15.
}

// Convert hms to hours or dms to degrees
pub fn ms_to_dec(d: u32, minutes: u32, seconds: f64) -> f64 {
    (d as f64) + (minutes as f64) / 60. + seconds / 3600.
}

pub fn dec_to_ms(dec: f64) -> (u32, u32, f64) {
    if dec < 0. {
        panic!("dec must not be negative");
    }

    let h = dec as u32;
    let m_raw = (dec - h as f64) * 60.;
    let m = m_raw as u32;
    let s = (m_raw - m as f64) * 60.;

    (h, m, s)
}

/// Calculates the Julian Date of a time
/// see https://scienceworld.wolfram.com/astronomy/JulianDate.html
fn calc_jd(time: chrono::DateTime<chrono::Utc>) -> Hours {
    let y = time.year() as f64;
    let m = time.month() as f64;
    let d = time.day() as f64;

    let mut jd = 367. * y;
    jd -= f64::floor(7. * (y + f64::floor((m + 9.) / 12.)) / 4.);
    jd -= f64::floor(3. * (f64::floor((y + (m - 9.) / 7.) / 100.) + 1.) / 4.);
    jd += f64::floor(275. * m / 9.);
    jd += d;
    jd += 1721028.5;
    jd + ms_to_dec(time.hour(), time.minute(), time.second() as f64) / 24.
}

// see https://thecynster.home.blog/2019/11/04/calculating-sidereal-time/
pub fn calculate_greenwich_sidereal_time(time: chrono::DateTime<chrono::Utc>) -> Hours {
    // The result will be off by the number of leap seconds different from this on the date given
    // TODO use the total number of leap seconds at the time given
    const LEAP_SECOND_TOTAL: u32 = 27;

    let jd_utc = calc_jd(time);

    let du = jd_utc - 2451545.0;
    let theta = rad_to_hours(modulo(
        TAU * (0.779_057_273_264f64 + 1.002_737_811_911_354_5f64 * du),
        TAU,
    ));

    let poly = poly![
        0.014506,
        4612.156534,
        1.3915817,
        -0.00000044,
        -0.000029956,
        -0.0000000368,
    ];
    let jd_tt = jd_utc + ((LEAP_SECOND_TOTAL as f64 + 32.184) / 3600.) / 24.; // Hours
    let t = (jd_tt - 2451545.0) / 36525.; // years

    let gmstp = deg_to_hours(modulo(poly.eval(t).unwrap() / 3600., 360.));

    modulo(theta + gmstp, 24.)
}

/// longitude in degrees
/// returns hours
pub fn calculate_local_sidereal_time(
    time: chrono::DateTime<chrono::Utc>,
    longitude: Degrees,
) -> Hours {
    let greenwich_sidereal_time = calculate_greenwich_sidereal_time(time);
    modulo(greenwich_sidereal_time + deg_to_hours(longitude), 24.)
}

/// longitude in degrees, ra in hours
/// returns hours
pub fn calculate_hour_angle(
    time: chrono::DateTime<chrono::Utc>,
    longitude: Degrees,
    ra: Hours,
) -> Hours {
    modulo(calculate_local_sidereal_time(time, longitude) - ra, 24.)
}

pub fn calculate_alt_from_ha_dec(ha: Hours, dec: Degrees, lat: Degrees) -> Degrees {
    let ha = hours_to_rad(ha);
    let dec = deg_to_rad(dec);
    let lat = deg_to_rad(lat);
    rad_to_deg((dec.sin() * lat.sin() + dec.cos() * lat.cos() * ha.cos()).asin())
}

pub fn calculate_az_from_ha_dec(ha: Hours, dec: Degrees, lat: Degrees) -> Degrees {
    let alt = deg_to_rad(calculate_alt_from_ha_dec(ha, dec, lat));
    let ha = hours_to_rad(ha);
    let dec = deg_to_rad(dec);
    let lat = deg_to_rad(lat);

    let a = rad_to_deg(((dec.sin() - alt.sin() * lat.sin()) / (alt.cos() * lat.cos())).acos())
        as Degrees;

    if 0. < ha.sin() {
        360. - a
    } else {
        a
    }
}

pub fn calculate_ha_dec_from_alt_az(alt: Degrees, az: Degrees, lat: Degrees) -> (Hours, Degrees) {
    if !(-90. ..=90.).contains(&alt) {
        panic!("Alt must be in the range -90 to 90")
    }

    let alt_rad = deg_to_rad(alt);
    let az_rad = deg_to_rad(modulo(az, 360.));
    let lat_rad = deg_to_rad(lat);

    let dec_rad = (lat_rad.sin() * alt_rad.sin() + lat_rad.cos() * alt_rad.cos() * az_rad.cos())
        .asin() as Radians;

    let ha_rad = (-az_rad.sin() * alt_rad.cos() / dec_rad.cos()).asin() as Radians;

    let ha_hours = rad_to_hours(ha_rad);
    let polar_axis_alt = az.cos() * lat;
    let ha_hours = if alt < polar_axis_alt {
        12. - ha_hours
    } else {
        ha_hours
    };

    (modulo(ha_hours, 24.), rad_to_deg(dec_rad))
}

pub fn modulo(val: f64, base: f64) -> f64 {
    ((val % base) + base) % base
}

/// A point in 3-space, used for ECEF and local ENU vectors (meters).
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scale(&self, k: f64) -> Vec3 {
        Vec3::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

// WGS-84 ellipsoid constants
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;

fn wgs84_e2() -> f64 {
    WGS84_F * (2.0 - WGS84_F)
}

/// Converts geodetic (lat/lon in degrees, altitude in meters) to Earth-Centered
/// Earth-Fixed Cartesian coordinates (meters).
pub fn geodetic_to_ecef(lat: Degrees, lon: Degrees, alt_m: f64) -> Vec3 {
    let lat = deg_to_rad(lat);
    let lon = deg_to_rad(lon);
    let sin_lat = lat.sin();
    let n = WGS84_A / (1.0 - wgs84_e2() * sin_lat * sin_lat).sqrt();

    Vec3::new(
        (n + alt_m) * lat.cos() * lon.cos(),
        (n + alt_m) * lat.cos() * lon.sin(),
        (n * (1.0 - wgs84_e2()) + alt_m) * sin_lat,
    )
}

/// Converts Earth-Centered Earth-Fixed Cartesian coordinates (meters) back to
/// geodetic lat/lon (degrees) and altitude (meters), by Bowring's method.
pub fn ecef_to_geodetic(ecef: &Vec3) -> (Degrees, Degrees, f64) {
    let lon = rad_to_deg(ecef.y.atan2(ecef.x));

    let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();
    let e2 = wgs84_e2();
    let mut lat = (ecef.z / (p * (1.0 - e2))).atan();

    for _ in 0..5 {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        lat = ((ecef.z + e2 * n * sin_lat) / p).atan();
    }

    let sin_lat = lat.sin();
    let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let alt = p / lat.cos() - n;

    (rad_to_deg(lat), lon, alt)
}

/// Converts an ECEF vector relative to an observer into the observer's local
/// East-North-Up tangent frame (meters).
pub fn ecef_to_enu(observer_lat: Degrees, observer_lon: Degrees, delta: &Vec3) -> Vec3 {
    let lat = deg_to_rad(observer_lat);
    let lon = deg_to_rad(observer_lon);

    let e = -lon.sin() * delta.x + lon.cos() * delta.y;
    let n = -lat.sin() * lon.cos() * delta.x - lat.sin() * lon.sin() * delta.y + lat.cos() * delta.z;
    let u = lat.cos() * lon.cos() * delta.x + lat.cos() * lon.sin() * delta.y + lat.sin() * delta.z;

    Vec3::new(e, n, u)
}

/// Converts an East-North-Up vector (meters) to azimuth/elevation (degrees).
/// Azimuth is undefined when the horizontal component is (numerically) zero;
/// callers own the "freeze last good azimuth" policy for that case.
pub fn enu_to_az_el(enu: &Vec3) -> (Option<Degrees>, Degrees) {
    let horiz = (enu.x * enu.x + enu.y * enu.y).sqrt();
    let range = enu.norm();

    let az = if horiz < 1e-6 {
        None
    } else {
        Some(modulo(rad_to_deg(enu.x.atan2(enu.y)), 360.))
    };

    let el = if range < 1e-9 {
        0.
    } else {
        rad_to_deg((enu.u_over_range(range)).asin())
    };

    (az, el.clamp(-90., 90.))
}

impl Vec3 {
    fn u_over_range(&self, range: f64) -> f64 {
        (self.z / range).clamp(-1.0, 1.0)
    }
}

/// Wraps an angle to (-180, +180], the convention used for azimuth (and
/// generic axis) pointing errors so the controller always takes the short
/// way around.
pub fn wrap_pm180(deg: Degrees) -> Degrees {
    let d = modulo(deg + 180., 360.) - 180.;
    if d <= -180. {
        d + 360.
    } else {
        d
    }
}

/// Shortest signed angular difference `a - b`, wrapped to (-180, +180].
pub fn angle_diff_deg(a: Degrees, b: Degrees) -> Degrees {
    wrap_pm180(a - b)
}

/// Great-circle angular separation between two az/el directions (degrees).
pub fn angular_separation(az1: Degrees, el1: Degrees, az2: Degrees, el2: Degrees) -> Degrees {
    let el1 = deg_to_rad(el1);
    let el2 = deg_to_rad(el2);
    let daz = deg_to_rad(az1 - az2);

    let cos_d = el1.sin() * el2.sin() + el1.cos() * el2.cos() * daz.cos();
    rad_to_deg(cos_d.clamp(-1.0, 1.0).acos())
}

/// Parallactic angle of a target at hour angle `ha` (hours) and declination
/// `dec` (degrees), as seen from latitude `lat` (degrees). Used to rotate an
/// operator's az/el bias into RA/Dec for equatorial mounts.
pub fn parallactic_angle(ha: Hours, dec: Degrees, lat: Degrees) -> Degrees {
    let ha_rad = hours_to_rad(ha);
    let dec_rad = deg_to_rad(dec);
    let lat_rad = deg_to_rad(lat);

    rad_to_deg(
        ha_rad
            .sin()
            .atan2(lat_rad.tan() * dec_rad.cos() - dec_rad.sin() * ha_rad.cos()),
    )
}

/// Low-precision (Meeus, ch. 25, ~0.01 deg) geocentric apparent RA/Dec of the
/// Sun. Sufficient for the Sun-exclusion safety interlock, per spec.
pub fn sun_ra_dec(time: chrono::DateTime<chrono::Utc>) -> (Hours, Degrees) {
    let jd = calc_jd(time);
    let n = jd - 2451545.0;

    let mean_lon = modulo(280.460 + 0.9856474 * n, 360.);
    let mean_anomaly = deg_to_rad(modulo(357.528 + 0.9856003 * n, 360.));
    let ecliptic_lon = deg_to_rad(
        mean_lon + 1.915 * mean_anomaly.sin() + 0.020 * (2. * mean_anomaly).sin(),
    );
    let obliquity = deg_to_rad(23.439 - 0.0000004 * n);

    let ra = rad_to_deg(f64::atan2(
        obliquity.cos() * ecliptic_lon.sin(),
        ecliptic_lon.cos(),
    ));
    let dec = rad_to_deg((obliquity.sin() * ecliptic_lon.sin()).clamp(-1.0, 1.0).asin());

    (deg_to_hours(modulo(ra, 360.)), dec)
}

/// Topocentric az/el of the Sun's center as seen from `lat`/`lon` at `time`.
pub fn sun_topocentric(
    time: chrono::DateTime<chrono::Utc>,
    lat: Degrees,
    lon: Degrees,
) -> (Degrees, Degrees) {
    let (ra, dec) = sun_ra_dec(time);
    let ha = calculate_hour_angle(time, lon, ra);
    let alt = calculate_alt_from_ha_dec(ha, dec, lat);
    let az = calculate_az_from_ha_dec(ha, dec, lat);
    (az, alt)
}

/// Rotates a TEME (effectively ECI, ignoring precession/nutation/polar motion
/// — consistent with the "low-precision ephemeris suffices" guidance) position
/// vector (km) to pseudo-ECEF (km) using Greenwich apparent sidereal time.
pub fn teme_to_ecef_km(time: chrono::DateTime<chrono::Utc>, teme_km: &Vec3) -> Vec3 {
    let theta = hours_to_rad(calculate_greenwich_sidereal_time(time));
    Vec3::new(
        teme_km.x * theta.cos() + teme_km.y * theta.sin(),
        -teme_km.x * theta.sin() + teme_km.y * theta.cos(),
        teme_km.z,
    )
}

/// Converts a satellite TEME position (km) at `time` into topocentric az/el
/// from an observer at `lat`/`lon`/`alt_m`.
pub fn satellite_topocentric(
    time: chrono::DateTime<chrono::Utc>,
    lat: Degrees,
    lon: Degrees,
    alt_m: f64,
    teme_km: &Vec3,
) -> (Option<Degrees>, Degrees) {
    let ecef_m = teme_to_ecef_km(time, teme_km).scale(1000.0);
    let observer_ecef = geodetic_to_ecef(lat, lon, alt_m);
    let enu = ecef_to_enu(lat, lon, &ecef_m.sub(&observer_ecef));
    enu_to_az_el(&enu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    struct TestPos {
        ha: Hours,
        dec: Degrees,
        alt: Degrees,
        az: Degrees,
        lat: Degrees,
    }

    #[test]
    fn test_deg_to_rad() {
        assert_eq!(deg_to_rad(0.), 0.);
        assert_float_relative_eq!(deg_to_rad(55.), 0.9599311);
        assert_float_relative_eq!(deg_to_rad(-10.), -0.1745329);
    }

    #[test]
    fn test_rad_to_deg() {
        assert_eq!(rad_to_deg(0.), 0.);
        assert_float_relative_eq!(rad_to_deg(1.), 57.29578);
        assert_float_relative_eq!(rad_to_deg(-8.), -458.3662);
    }

    #[test]
    fn test_hours_to_rad() {
        assert_eq!(hours_to_rad(0.), 0.);
        assert_float_relative_eq!(hours_to_rad(1.), 0.261799, 1E-4);
        assert_float_relative_eq!(hours_to_rad(-8.), -2.0944, 1E-4);
    }

    #[test]
    fn test_rad_to_hours() {
        assert_eq!(rad_to_hours(0.), 0.);
        assert_float_relative_eq!(rad_to_hours(1.), 3.8197, 1E-4);
        assert_float_relative_eq!(rad_to_hours(-8.), -30.5577, 1E-4);
    }

    #[test]
    fn test_deg_to_hours() {
        assert_eq!(deg_to_hours(0.), 0.);
        assert_float_relative_eq!(deg_to_hours(1.), 0.0666666666666667);
        assert_float_relative_eq!(deg_to_hours(-8.), -0.53333333333333333);
    }

    #[test]
    fn test_hours_to_deg() {
        assert_eq!(hours_to_deg(0.), 0.);
        assert_float_relative_eq!(hours_to_deg(1.), 15.);
        assert_float_relative_eq!(hours_to_deg(-8.), -120.);
    }

    #[test]
    fn test_ms_to_dec() {
        assert_eq!(ms_to_dec(0, 0, 0.), 0.);
        assert_float_relative_eq!(ms_to_dec(1, 1, 1.), 1.0169444);
        assert_float_relative_eq!(-ms_to_dec(8, 8, 8.8), -8.1357778);
    }

    #[test]
    fn test_dec_to_ms() {
        assert_eq!(dec_to_ms(0.), (0, 0, 0.));
        let mut res;

        res = dec_to_ms(1.111);
        assert_eq!((res.0, res.1), (1, 6));
        assert_float_relative_eq!(res.2, 39.6);

        res = dec_to_ms(368.888);
        assert_eq!((res.0, res.1), (368, 53));
        assert_float_relative_eq!(res.2, 16.8)
    }

    #[test]
    fn test_calculate_greenwich_sidereal_time() {
        assert_float_relative_eq!(
            calculate_greenwich_sidereal_time(Utc.ymd(1969, 1, 6).and_hms(1, 5, 0)),
            8.1127421203,
            1E-4
        );
        assert_float_relative_eq!(
            calculate_greenwich_sidereal_time(Utc.ymd(2021, 1, 30).and_hms(21, 20, 0)),
            6.0219108930,
            1E-4
        );
    }

    #[test]
    fn test_calculate_local_sidereal_time() {
        assert_float_relative_eq!(
            calculate_local_sidereal_time(Utc.ymd(1969, 1, 6).and_hms(1, 5, 0), -55.5),
            4.4127385800,
            1E-4
        );
        assert_float_relative_eq!(
            calculate_local_sidereal_time(Utc.ymd(2021, 1, 30).and_hms(21, 20, 0), 90.),
            12.0219108930,
            1E-4
        );
    }

    #[test]
    fn test_calculate_hour_angle() {
        assert_float_relative_eq!(
            calculate_hour_angle(Utc.ymd(1969, 1, 6).and_hms(1, 5, 0), -55.5, -4.4),
            8.8127385800,
            1E-4
        );
        assert_float_relative_eq!(
            calculate_hour_angle(Utc.ymd(2021, 1, 30).and_hms(21, 20, 0), 90., 12.),
            0.0219108930,
            1E-4
        );
    }

    #[test]
    fn test_ha_dec_alt_az() {
        let tests = [
            TestPos {
                ha: deg_to_hours(336.683),
                dec: 19.1824,
                lat: 43.07833,
                alt: ms_to_dec(59, 05, 10.),
                az: ms_to_dec(133, 18, 29.),
            },
            TestPos {
                ha: deg_to_hours(54.382617),
                dec: 36.466667,
                lat: 52.5,
                alt: 49.169122,
                az: 269.14634,
            },
            TestPos {
                ha: ms_to_dec(22, 03, 55.79),
                dec: -ms_to_dec(26, 23, 11.1),
                lat: ms_to_dec(37, 45, 3.),
                alt: ms_to_dec(20, 19, 20.5),
                az: ms_to_dec(152, 23, 39.3),
            },
            TestPos {
                ha: 0.,
                dec: 51.47,
                lat: 51.47,
                alt: 90.,
                az: 90., // az is undefined and implementation dependent
            },
            TestPos {
                ha: 12.00,
                dec: -51.47,
                lat: 51.47,
                alt: -90.,
                az: 270., // az is undefined and implementation dependent
            },
            TestPos {
                ha: ms_to_dec(13, 35, 44.69),
                dec: -ms_to_dec(21, 27, 41.3),
                lat: ms_to_dec(51, 28, 40.12),
                alt: -ms_to_dec(54, 41, 22.7),
                az: ms_to_dec(40, 47, 16.3),
            },
        ];

        test_calculate_alt_from_ha_dec(&tests);
        test_calculate_az_from_ha_dec(&tests);
        test_calculate_ha_dec_from_alt_az(&tests);
    }

    fn test_calculate_alt_from_ha_dec(tests: &[TestPos]) {
        for test in tests {
            assert_float_absolute_eq!(
                calculate_alt_from_ha_dec(test.ha, test.dec, test.lat),
                test.alt,
                1E-3
            );
        }
    }

    fn test_calculate_az_from_ha_dec(tests: &[TestPos]) {
        for test in tests {
            assert_float_absolute_eq!(
                calculate_az_from_ha_dec(test.ha, test.dec, test.lat),
                test.az,
                1E-3
            );
        }
    }

    fn test_calculate_ha_dec_from_alt_az(tests: &[TestPos]) {
        for test in tests {
            let (ha, dec) = calculate_ha_dec_from_alt_az(test.alt, test.az, test.lat);
            assert_float_relative_eq!(ha, test.ha, 1E-3);
            assert_float_absolute_eq!(dec, test.dec, 1E-3);
        }
    }

    #[test]
    fn test_modulo() {
        assert_eq!(modulo(std::f64::consts::TAU, std::f64::consts::PI), 0.);
        assert_eq!(modulo(-365., 360.), 355.);
    }

    #[test]
    fn test_wrap_pm180() {
        assert_float_absolute_eq!(wrap_pm180(0.), 0.);
        assert_float_absolute_eq!(wrap_pm180(180.), 180.);
        assert_float_absolute_eq!(wrap_pm180(-180.), 180.);
        assert_float_absolute_eq!(wrap_pm180(270.), -90.);
        assert_float_absolute_eq!(wrap_pm180(-270.), 90.);
        assert_float_absolute_eq!(wrap_pm180(720. + 10.), 10.);
    }

    #[test]
    fn test_angle_diff_deg_takes_short_way() {
        assert_float_absolute_eq!(angle_diff_deg(350., 10.), -20.);
        assert_float_absolute_eq!(angle_diff_deg(10., 350.), 20.);
        assert_float_absolute_eq!(angle_diff_deg(5., 5.), 0.);
        let d = angle_diff_deg(179., -179.);
        assert!(d > -180. && d <= 180.);
    }

    #[test]
    fn test_angular_separation_zero_for_same_point() {
        assert_float_absolute_eq!(angular_separation(123.4, 45.6, 123.4, 45.6), 0., 1E-9);
    }

    #[test]
    fn test_angular_separation_poles() {
        // straight up vs straight down is 180 degrees apart regardless of azimuth
        assert_float_absolute_eq!(angular_separation(0., 90., 180., -90.), 180., 1E-6);
    }

    #[test]
    fn test_geodetic_to_ecef_equator_prime_meridian() {
        // on the equator at the prime meridian, x should equal roughly the
        // WGS-84 equatorial radius and y/z should vanish.
        let p = geodetic_to_ecef(0., 0., 0.);
        assert_float_relative_eq!(p.x, WGS84_A, 1E-6);
        assert_float_absolute_eq!(p.y, 0., 1E-6);
        assert_float_absolute_eq!(p.z, 0., 1E-6);
    }

    #[test]
    fn test_geodetic_ecef_round_trip() {
        let cases = [(38.879084, -77.036531, 18.0), (0.0, 0.0, 0.0), (-33.87, 151.21, 50.0)];
        for (lat, lon, alt) in cases {
            let ecef = geodetic_to_ecef(lat, lon, alt);
            let (lat2, lon2, alt2) = ecef_to_geodetic(&ecef);
            assert_float_absolute_eq!(lat2, lat, 1E-6);
            assert_float_absolute_eq!(lon2, lon, 1E-6);
            assert_float_absolute_eq!(alt2, alt, 1E-3);
        }
    }

    #[test]
    fn test_ecef_enu_round_trip_overhead_point() {
        // a point directly above the observer should resolve to up-only ENU
        // and elevation 90.
        let lat = 37.5;
        let lon = -122.3;
        let observer = geodetic_to_ecef(lat, lon, 0.);
        let above = geodetic_to_ecef(lat, lon, 1000.);
        let enu = ecef_to_enu(lat, lon, &above.sub(&observer));

        assert_float_absolute_eq!(enu.x, 0., 1E-3);
        assert_float_absolute_eq!(enu.y, 0., 1E-3);
        assert_float_relative_eq!(enu.z, 1000., 1E-3);

        let (_az, el) = enu_to_az_el(&enu);
        assert_float_absolute_eq!(el, 90., 1E-3);
    }

    #[test]
    fn test_enu_to_az_el_cardinal_directions() {
        let (az, el) = enu_to_az_el(&Vec3::new(0., 1., 0.));
        assert_float_absolute_eq!(az.unwrap(), 0., 1E-9);
        assert_float_absolute_eq!(el, 0., 1E-9);

        let (az, _) = enu_to_az_el(&Vec3::new(1., 0., 0.));
        assert_float_absolute_eq!(az.unwrap(), 90., 1E-9);

        let (az, _) = enu_to_az_el(&Vec3::new(0., -1., 0.));
        assert_float_absolute_eq!(az.unwrap(), 180., 1E-9);
    }

    #[test]
    fn test_enu_to_az_el_azimuth_undefined_when_directly_overhead() {
        let (az, el) = enu_to_az_el(&Vec3::new(0., 0., 1.));
        assert!(az.is_none());
        assert_float_absolute_eq!(el, 90., 1E-9);
    }

    #[test]
    fn test_parallactic_angle_at_transit_on_meridian_for_northern_observer() {
        // at hour angle zero, sin(HA) = 0, so the parallactic angle is 0 or
        // 180 (the latter below the pole).
        let q = parallactic_angle(0., 20., 45.);
        assert_float_absolute_eq!(q, 0., 1E-9);
    }

    #[test]
    fn test_sun_ra_dec_within_ecliptic_bounds() {
        let (ra, dec) = sun_ra_dec(Utc.ymd(2024, 6, 20).and_hms(12, 0, 0));
        assert!((0. ..24.).contains(&ra));
        // obliquity of the ecliptic bounds the Sun's declination excursion
        assert!(dec.abs() <= 23.45);
    }

    #[test]
    fn test_sun_ra_dec_near_december_solstice_is_near_max_southern_declination() {
        let (_, dec) = sun_ra_dec(Utc.ymd(2024, 12, 21).and_hms(12, 0, 0));
        assert!(dec < -23.0);
    }

    #[test]
    fn test_teme_to_ecef_preserves_z_and_magnitude() {
        let r = Vec3::new(7000., 0., 500.);
        let t = Utc.ymd(2024, 3, 15).and_hms(6, 0, 0);
        let ecef = teme_to_ecef_km(t, &r);
        assert_float_relative_eq!(ecef.z, r.z, 1E-9);
        assert_float_relative_eq!(ecef.norm(), r.norm(), 1E-6);
    }

    #[test]
    fn test_satellite_topocentric_overhead_pass() {
        // A satellite sitting (pseudo-ECEF) directly above the observer
        // should report a near-90-degree elevation.
        let lat = 10.;
        let lon = 20.;
        let alt_m = 0.;
        let observer = geodetic_to_ecef(lat, lon, alt_m);
        let overhead_km = observer.add(&Vec3::new(0., 0., 400_000.)).scale(1.0 / 1000.0);

        // Build a TEME vector that rotates, under teme_to_ecef_km at `t`,
        // back to `overhead_km` by inverting the Earth-rotation angle.
        let t = Utc.ymd(2024, 1, 1).and_hms(0, 0, 0);
        let theta = hours_to_rad(calculate_greenwich_sidereal_time(t));
        let teme = Vec3::new(
            overhead_km.x * theta.cos() - overhead_km.y * theta.sin(),
            overhead_km.x * theta.sin() + overhead_km.y * theta.cos(),
            overhead_km.z,
        );

        let (_az, el) = satellite_topocentric(t, lat, lon, alt_m, &teme);
        assert_float_absolute_eq!(el, 90., 1E-2);
    }
}
