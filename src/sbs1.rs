//! SBS-1 / BaseStation ASCII CSV parsing and emission.
//!
//! Reference: http://woodair.net/SBS/Article/Barebones42_Socket_Data.htm
//!
//! ```text
//! MSG,3,111,11111,A04424,111111,2016/03/11,13:07:05.343,2016/03/11,13:07:05.288,,11025,,,37.17274,-122.03935,,,,,,0
//! MSG,4,111,11111,AC1FCC,111111,2016/03/11,13:07:07.777,2016/03/11,13:07:07.713,,,316,106,,,1536,,,,,0
//! ```
//!
//! Only MSG types 3 (airborne position) and 4 (airborne velocity) carry the
//! fields this system needs; everything else is ignored, not an error.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct AirbornePosition {
    pub hex_ident: String,
    pub callsign: Option<String>,
    pub altitude_ft: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AirborneVelocity {
    pub hex_ident: String,
    pub ground_speed_kt: Option<f64>,
    pub track_deg: Option<f64>,
    pub vertical_rate_fpm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SbsMessage {
    AirbornePosition(AirbornePosition),
    AirborneVelocity(AirborneVelocity),
    /// A syntactically valid line whose message type this system doesn't
    /// act on (identification, surveillance, etc).
    Ignored,
}

fn field(parts: &[&str], idx: usize) -> Option<&str> {
    parts.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn field_f64(parts: &[&str], idx: usize) -> Option<f64> {
    field(parts, idx).and_then(|s| s.parse().ok())
}

/// Parses one SBS-1 CSV line (without the trailing CRLF). Returns `None` for
/// lines that don't carry position data this system acts on — per the
/// error taxonomy, a malformed or short line is a *data* error: the caller
/// drops it and increments a counter rather than treating it as fatal.
pub fn parse_line(line: &str) -> Option<SbsMessage> {
    let parts: Vec<&str> = line.trim_end().split(',').collect();
    if parts.len() < 5 || parts[0] != "MSG" {
        return None;
    }

    let msg_type: u8 = parts[1].trim().parse().ok()?;
    let hex_ident = field(&parts, 4)?.to_string();

    match msg_type {
        3 => {
            let latitude = field_f64(&parts, 14)?;
            let longitude = field_f64(&parts, 15)?;
            if !latitude.is_finite() || !longitude.is_finite() {
                return None;
            }
            Some(SbsMessage::AirbornePosition(AirbornePosition {
                hex_ident,
                callsign: field(&parts, 10).map(str::to_string),
                altitude_ft: field_f64(&parts, 11),
                latitude,
                longitude,
            }))
        }
        4 => {
            let ground_speed_kt = field_f64(&parts, 12);
            let track_deg = field_f64(&parts, 13);
            let vertical_rate_fpm = field_f64(&parts, 16);
            if ground_speed_kt.is_none() && track_deg.is_none() && vertical_rate_fpm.is_none() {
                return None;
            }
            Some(SbsMessage::AirborneVelocity(AirborneVelocity {
                hex_ident,
                ground_speed_kt,
                track_deg,
                vertical_rate_fpm,
            }))
        }
        _ => Some(SbsMessage::Ignored),
    }
}

fn format_date(t: DateTime<Utc>) -> String {
    t.format("%Y/%m/%d").to_string()
}

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%H:%M:%S%.3f").to_string()
}

/// Renders a synthetic airborne-position record in the same schema,
/// matching a satellite's propagated sub-point as if it were an aircraft.
pub fn format_airborne_position(
    hex_ident: &str,
    timestamp: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    altitude_ft: f64,
) -> String {
    format!(
        "MSG,3,1,1,{hex_ident},1,{date},{time},{date},{time},,{alt},,,{lat:.5},{lon:.5},,,,,,0",
        hex_ident = hex_ident,
        date = format_date(timestamp),
        time = format_time(timestamp),
        alt = altitude_ft.round() as i64,
        lat = latitude,
        lon = longitude,
    )
}

pub fn format_airborne_velocity(
    hex_ident: &str,
    timestamp: DateTime<Utc>,
    ground_speed_kt: f64,
    track_deg: f64,
    vertical_rate_fpm: f64,
) -> String {
    format!(
        "MSG,4,1,1,{hex_ident},1,{date},{time},{date},{time},,,{gs:.1},{trk:.1},,,{vr},,,,,0",
        hex_ident = hex_ident,
        date = format_date(timestamp),
        time = format_time(timestamp),
        gs = ground_speed_kt,
        trk = track_deg,
        vr = vertical_rate_fpm.round() as i64,
    )
}

#[allow(dead_code)]
fn parse_sbs_datetime(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date, "%Y/%m/%d").ok()?;
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S%.3f").ok()?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_airborne_position() {
        let line = "MSG,3,111,11111,A04424,111111,2016/03/11,13:07:05.343,2016/03/11,13:07:05.288,,11025,,,37.17274,-122.03935,,,,,,0";
        let msg = parse_line(line).unwrap();
        assert_eq!(
            msg,
            SbsMessage::AirbornePosition(AirbornePosition {
                hex_ident: "A04424".to_string(),
                callsign: None,
                altitude_ft: Some(11025.0),
                latitude: 37.17274,
                longitude: -122.03935,
            })
        );
    }

    #[test]
    fn parses_airborne_velocity() {
        let line = "MSG,4,111,11111,AC1FCC,111111,2016/03/11,13:07:07.777,2016/03/11,13:07:07.713,,,316,106,,,1536,,,,,0";
        let msg = parse_line(line).unwrap();
        assert_eq!(
            msg,
            SbsMessage::AirborneVelocity(AirborneVelocity {
                hex_ident: "AC1FCC".to_string(),
                ground_speed_kt: Some(316.0),
                track_deg: Some(106.0),
                vertical_rate_fpm: Some(1536.0),
            })
        );
    }

    #[test]
    fn position_without_lat_lon_is_dropped() {
        let line = "MSG,3,111,11111,A04424,111111,2016/03/11,13:07:05.343,2016/03/11,13:07:05.288,,11025,,,,,,,,,,0";
        assert!(parse_line(line).is_none());
    }

    #[test]
    fn truncated_line_is_dropped() {
        assert!(parse_line("MSG,3,111").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn other_message_types_are_ignored_not_errors() {
        let line = "MSG,1,111,11111,AA2BC2,111111,2016/03/11,13:07:16.663,2016/03/11,13:07:16.626,UAL814,,,,,,,,,,,0";
        assert_eq!(parse_line(line), Some(SbsMessage::Ignored));
    }

    #[test]
    fn format_then_parse_round_trips_the_fields_used() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let line = format_airborne_position("AAAAAA", t, 37.1, -122.0, 35000.0);
        let parsed = parse_line(&line).unwrap();
        match parsed {
            SbsMessage::AirbornePosition(p) => {
                assert_eq!(p.hex_ident, "AAAAAA");
                assert_eq!(p.latitude, 37.1);
                assert_eq!(p.longitude, -122.0);
                assert_eq!(p.altitude_ft, Some(35000.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
