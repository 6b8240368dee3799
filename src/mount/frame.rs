//! Alt-az <-> equatorial frame conversion, used when the mount's native
//! frame differs from the world frame the display and target estimator work
//! in. Conversion uses the observer's latitude and the current local
//! sidereal time, per the mount abstraction's frame conversion rule.

use chrono::{DateTime, Utc};

use crate::astro_math::{
    calculate_alt_from_ha_dec, calculate_az_from_ha_dec, calculate_ha_dec_from_alt_az,
    calculate_local_sidereal_time, hours_to_deg, modulo, Degrees,
};

pub fn altaz_to_radec(
    az: Degrees,
    el: Degrees,
    lat: Degrees,
    lon: Degrees,
    time: DateTime<Utc>,
) -> (Degrees, Degrees) {
    let (ha, dec) = calculate_ha_dec_from_alt_az(el, az, lat);
    let lst = calculate_local_sidereal_time(time, lon);
    let ra = modulo(hours_to_deg(lst - ha), 360.0);
    (ra, dec)
}

pub fn radec_to_altaz(
    ra: Degrees,
    dec: Degrees,
    lat: Degrees,
    lon: Degrees,
    time: DateTime<Utc>,
) -> (Degrees, Degrees) {
    let lst = calculate_local_sidereal_time(time, lon);
    let ha = lst - crate::astro_math::deg_to_hours(ra);
    let el = calculate_alt_from_ha_dec(ha, dec, lat);
    let az = calculate_az_from_ha_dec(ha, dec, lat);
    (az, el)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn altaz_radec_round_trip_within_an_arcsecond() {
        let lat = 51.47;
        let lon = -0.0;
        let time = Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap();

        let cases = [(90.0, 45.0), (270.0, 10.0), (0.0, 80.0), (180.0, 5.0)];
        for (az, el) in cases {
            let (ra, dec) = altaz_to_radec(az, el, lat, lon, time);
            let (az2, el2) = radec_to_altaz(ra, dec, lat, lon, time);

            let daz = crate::astro_math::angle_diff_deg(az2, az);
            assert!(daz.abs() < 1.0 / 3600.0, "az diff {daz} for az={az} el={el}");
            assert!((el2 - el).abs() < 1.0 / 3600.0, "el diff for az={az} el={el}");
        }
    }
}
