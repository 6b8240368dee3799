//! Target state estimation: fuses delayed, irregular position reports from
//! aircraft (SBS-1) and satellites (SGP4) into a current-time az/el
//! prediction. Owned exclusively by the fusion task; every other task talks
//! to it through [`FusionHandle`].

mod fusion;
mod report;

pub use fusion::{spawn_fusion_task, FusionHandle, TargetSummary};
pub use report::Report;

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};

use crate::astro_math::{enu_to_az_el, Degrees, Vec3};
use crate::config::LocationConfig;
use crate::counters::DropCounters;

/// A single target's linear motion model in the observer's East-North-Up
/// tangent frame: position `p0` and velocity `v0` at time `t0`.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: String,
    pub name: Option<String>,
    pub is_space: bool,
    pub p0: Vec3,
    pub v0: Vec3,
    pub t0: DateTime<Utc>,
    /// Last azimuth with a well-defined horizontal component — used to
    /// "freeze" azimuth when a target passes through the zenith/nadir.
    last_good_az: Option<Degrees>,
    pub stale: bool,
}

impl Target {
    fn new(id: String, name: Option<String>, is_space: bool, p0: Vec3, v0: Vec3, t0: DateTime<Utc>) -> Self {
        Target {
            id,
            name,
            is_space,
            p0,
            v0,
            t0,
            last_good_az: None,
            stale: false,
        }
    }

    /// Linear extrapolation `p0 + v0 * (t - t0)`, no filtering.
    pub fn predict_enu(&self, t: DateTime<Utc>) -> Vec3 {
        let dt = (t - self.t0).num_milliseconds() as f64 / 1000.0;
        self.p0.add(&self.v0.scale(dt))
    }

    /// Predicted az/el at `t`. Azimuth is frozen at the last well-defined
    /// value while the target is near the zenith/nadir.
    pub fn predict_az_el(&mut self, t: DateTime<Utc>) -> (Degrees, Degrees) {
        let p = self.predict_enu(t);
        let (az, el) = enu_to_az_el(&p);
        let az = match az {
            Some(a) => {
                self.last_good_az = Some(a);
                a
            }
            None => self.last_good_az.unwrap_or(0.0),
        };
        (az, el)
    }
}

/// Owns the target map. Not `Send` across await points by design — it lives
/// entirely inside the fusion task; everything else reaches it via
/// [`FusionHandle`].
pub struct TargetStore {
    targets: std::collections::HashMap<String, Target>,
    observer: LocationConfig,
    silence_timeout: StdDuration,
}

impl TargetStore {
    pub fn new(observer: LocationConfig, silence_timeout: StdDuration) -> Self {
        TargetStore {
            targets: std::collections::HashMap::new(),
            observer,
            silence_timeout,
        }
    }

    /// Applies one report, converting world-frame position/velocity to the
    /// observer-centered ENU frame. Drops out-of-order and non-finite
    /// reports per the error taxonomy, bumping the matching counter.
    pub fn apply_report(&mut self, report: Report, counters: &DropCounters) {
        let (id, name, is_space, p0, v0, t0) = report.into_enu(&self.observer);

        if !p0.x.is_finite() || !p0.y.is_finite() || !p0.z.is_finite()
            || !v0.x.is_finite() || !v0.y.is_finite() || !v0.z.is_finite()
        {
            counters.bump_non_finite();
            return;
        }

        if let Some(existing) = self.targets.get(&id) {
            if t0 <= existing.t0 {
                counters.bump_out_of_order();
                return;
            }
        }

        let mut target = Target::new(id.clone(), name, is_space, p0, v0, t0);
        if let Some(existing) = self.targets.get(&id) {
            target.last_good_az = existing.last_good_az;
        }
        self.targets.insert(id, target);
    }

    /// Marks targets silent for more than the timeout as stale, and evicts
    /// those silent for more than twice the timeout. Run once per incoming
    /// batch rather than on a dedicated timer task.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let timeout = chrono::Duration::from_std(self.silence_timeout).unwrap_or(chrono::Duration::seconds(60));
        self.targets.retain(|_, t| now - t.t0 < timeout * 2);
        for target in self.targets.values_mut() {
            target.stale = now - target.t0 >= timeout;
        }
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Target> {
        self.targets.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Target> {
        self.targets.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::report::Report;

    fn observer() -> LocationConfig {
        LocationConfig {
            lat_degrees: 38.879084,
            lon_degrees: -77.036531,
            alt_meters: 18.0,
        }
    }

    fn t(offset_secs: i64) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::seconds(offset_secs)
    }

    fn aircraft_report(id: &str, ts: DateTime<Utc>, lat: f64, lon: f64) -> Report {
        Report::Aircraft {
            hex_ident: id.to_string(),
            callsign: None,
            timestamp: ts,
            lat,
            lon,
            altitude_ft: Some(35000.0),
            ground_speed_kt: Some(400.0),
            track_deg: Some(90.0),
            vertical_rate_fpm: Some(0.0),
        }
    }

    #[test]
    fn time_monotonicity_keeps_the_latest_report_regardless_of_arrival_order() {
        let mut store = TargetStore::new(observer(), StdDuration::from_secs(60));
        let counters = DropCounters::new();

        let early = t(0);
        let late = t(10);

        store.apply_report(aircraft_report("ABC123", late, 38.9, -77.0), &counters);
        store.apply_report(aircraft_report("ABC123", early, 38.8, -77.1), &counters);

        let stored = store.get_mut("ABC123").unwrap();
        assert_eq!(stored.t0, late);
    }

    #[test]
    fn out_of_order_report_is_dropped_and_counted() {
        let mut store = TargetStore::new(observer(), StdDuration::from_secs(60));
        let counters = DropCounters::new();

        store.apply_report(aircraft_report("XYZ", t(10), 38.9, -77.0), &counters);
        store.apply_report(aircraft_report("XYZ", t(5), 39.0, -76.0), &counters);

        assert_eq!(
            counters.out_of_order_reports.load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn non_finite_coordinate_is_dropped_and_counted() {
        let mut store = TargetStore::new(observer(), StdDuration::from_secs(60));
        let counters = DropCounters::new();

        store.apply_report(aircraft_report("BAD", t(0), f64::NAN, -77.0), &counters);
        assert!(store.get_mut("BAD").is_none());
        assert_eq!(
            counters.non_finite_coordinates.load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn sweep_marks_stale_then_evicts() {
        let mut store = TargetStore::new(observer(), StdDuration::from_secs(60));
        let counters = DropCounters::new();
        let created_at = t(0);
        store.apply_report(aircraft_report("OLD", created_at, 38.9, -77.0), &counters);

        store.sweep(created_at + chrono::Duration::seconds(61));
        assert!(store.get_mut("OLD").unwrap().stale);

        store.sweep(created_at + chrono::Duration::seconds(121));
        assert!(store.get_mut("OLD").is_none());
    }

    #[test]
    fn predict_extrapolates_linearly() {
        let mut store = TargetStore::new(observer(), StdDuration::from_secs(60));
        let counters = DropCounters::new();
        let t0 = t(0);
        store.apply_report(aircraft_report("LIN", t0, 38.9, -77.0), &counters);

        let target = store.get_mut("LIN").unwrap();
        let p_now = target.predict_enu(t0);
        let p_later = target.predict_enu(t0 + chrono::Duration::seconds(10));
        assert!(p_later.x != p_now.x || p_later.y != p_now.y);
    }
}
