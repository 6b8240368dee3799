//! The pointing controller: fixed-cadence rate loop that turns a target
//! prediction, the mount's reported attitude, and an operator bias into a
//! slew-rate command, gated by the Sun-exclusion interlock.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::alignment::AlignmentOffset;
use crate::astro_math::{
    angular_separation, parallactic_angle, sun_topocentric, wrap_pm180, Degrees,
};
use crate::config::{GainsConfig, MountMode};
use crate::counters::DropCounters;
use crate::error::{MountError, SafetyError};
use crate::mount::{frame, Axis, FrameKind, MountLike};
use crate::pid::{Pid, PidGains};
use crate::target::fusion::FusionHandle;

/// Error magnitude above which the controller requests an absolute slew
/// instead of engaging the rate loop directly.
const SLEW_ENGAGE_THRESHOLD_DEG: f64 = 5.0;
/// Loss of attitude for longer than this drops the controller to `Idle`.
const ATTITUDE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Slewing,
    Tracking,
    SunLockout,
}

fn gains_to_pid(g: GainsConfig) -> PidGains {
    PidGains {
        kp: g.kp,
        ki: g.ki,
        kd: g.kd,
    }
}

pub struct Controller {
    state: ControllerState,
    target_id: Option<String>,
    bias_az: Degrees,
    bias_el: Degrees,
    pid_axis1: Pid,
    pid_axis2: Pid,
    last_attitude_at: Option<Instant>,
    last_tick_at: Option<Instant>,
    alignment: AlignmentOffset,
    sun_exclusion_radius_degrees: Degrees,
    mount_mode: MountMode,
    observer_lat: Degrees,
    observer_lon: Degrees,
}

impl Controller {
    pub fn new(
        gains: GainsConfig,
        output_limit_deg_per_sec: f64,
        sun_exclusion_radius_degrees: Degrees,
        mount_mode: MountMode,
        observer_lat: Degrees,
        observer_lon: Degrees,
    ) -> Self {
        let pid_gains = gains_to_pid(gains);
        Controller {
            state: ControllerState::Idle,
            target_id: None,
            bias_az: 0.0,
            bias_el: 0.0,
            pid_axis1: Pid::new(pid_gains, output_limit_deg_per_sec),
            pid_axis2: Pid::new(pid_gains, output_limit_deg_per_sec),
            last_attitude_at: None,
            last_tick_at: None,
            alignment: AlignmentOffset::identity(),
            sun_exclusion_radius_degrees,
            mount_mode,
            observer_lat,
            observer_lon,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn set_alignment(&mut self, alignment: AlignmentOffset) {
        self.alignment = alignment;
    }

    /// Selecting a new target (or clearing the current one) always resets
    /// the PID memory: stale integrator/derivative history from the old
    /// target must never leak into the new one.
    pub fn set_target(&mut self, target_id: Option<String>) {
        self.target_id = target_id;
        self.pid_axis1.reset();
        self.pid_axis2.reset();
        self.state = if self.target_id.is_some() {
            ControllerState::Slewing
        } else {
            ControllerState::Idle
        };
    }

    pub fn set_gains(&mut self, gains: GainsConfig) {
        let pid_gains = gains_to_pid(gains);
        self.pid_axis1.set_gains(pid_gains);
        self.pid_axis2.set_gains(pid_gains);
    }

    pub fn set_bias(&mut self, bias_az: Degrees, bias_el: Degrees) {
        self.bias_az = bias_az;
        self.bias_el = bias_el;
    }

    fn world_to_mount_components(
        &self,
        world_az: Degrees,
        world_el: Degrees,
        time: DateTime<Utc>,
    ) -> (Degrees, Degrees) {
        let world = match self.mount_mode {
            MountMode::AltAz => (world_az, world_el),
            MountMode::Equatorial => {
                frame::altaz_to_radec(world_az, world_el, self.observer_lat, self.observer_lon, time)
            }
        };
        self.alignment.world_to_mount(world)
    }

    fn mount_to_world_az_el(
        &self,
        attitude: (Degrees, Degrees),
        frame_kind: FrameKind,
        time: DateTime<Utc>,
    ) -> (Degrees, Degrees) {
        let world = self.alignment.mount_to_world(attitude);
        match frame_kind {
            FrameKind::AltAz => world,
            FrameKind::Equatorial => {
                frame::radec_to_altaz(world.0, world.1, self.observer_lat, self.observer_lon, time)
            }
        }
    }

    /// Rotates the operator's az/el ("right, up" on the display) bias into
    /// the mount's native axes. Identity for alt-az; for equatorial mounts,
    /// the bias is rotated by the current parallactic angle so "up" on the
    /// display still means "up" in the sky.
    fn rotate_bias(&self, target_mount: (Degrees, Degrees), time: DateTime<Utc>) -> (Degrees, Degrees) {
        match self.mount_mode {
            MountMode::AltAz => (self.bias_az, self.bias_el),
            MountMode::Equatorial => {
                let lst = crate::astro_math::calculate_local_sidereal_time(time, self.observer_lon);
                let ha = lst - crate::astro_math::deg_to_hours(target_mount.0);
                let p = parallactic_angle(ha, target_mount.1, self.observer_lat).to_radians();
                let d1 = self.bias_az * p.cos() - self.bias_el * p.sin();
                let d2 = self.bias_az * p.sin() + self.bias_el * p.cos();
                (d1, d2)
            }
        }
    }

    /// Runs one controller tick. Reads the mount's attitude, queries the
    /// fusion task for the tracked target's prediction, checks the Sun
    /// interlock, and emits at most one rate (or absolute slew) command.
    pub async fn tick(
        &mut self,
        now: DateTime<Utc>,
        fusion: &FusionHandle,
        mount: &mut dyn MountLike,
        counters: &DropCounters,
    ) {
        let dt = match self.last_tick_at {
            Some(prev) => Instant::now().duration_since(prev),
            None => Duration::from_secs_f64(1.0 / 20.0),
        };
        self.last_tick_at = Some(Instant::now());

        let frame_kind = mount.frame_kind();
        let attitude = match mount.read_attitude().await {
            Ok(a) => {
                self.last_attitude_at = Some(Instant::now());
                a
            }
            Err(e) => {
                if !matches!(e, MountError::TransportLost) {
                    tracing::warn!(error = %e, "attitude read failed");
                }
                self.maybe_time_out_attitude();
                return;
            }
        };
        self.maybe_time_out_attitude();
        if self.state == ControllerState::Idle && self.target_id.is_none() {
            return;
        }

        let Some(target_id) = self.target_id.clone() else {
            self.state = ControllerState::Idle;
            return;
        };

        let Some((target_az, target_el, stale)) = fusion.query(&target_id, now).await else {
            tracing::info!(target_id, "tracked target no longer present, going idle");
            self.set_target(None);
            return;
        };
        if stale {
            tracing::debug!(target_id, "tracking a stale target");
        }

        let sun = sun_topocentric(now, self.observer_lat, self.observer_lon);
        let boresight_world = self.mount_to_world_az_el(attitude, frame_kind, now);
        let sun_to_target = angular_separation(sun.0, sun.1, target_az, target_el);
        let sun_to_boresight = angular_separation(sun.0, sun.1, boresight_world.0, boresight_world.1);

        if sun_to_target < self.sun_exclusion_radius_degrees || sun_to_boresight < self.sun_exclusion_radius_degrees {
            let reason = SafetyError::SunExclusion;
            if self.state != ControllerState::SunLockout {
                tracing::warn!(target_id, error = %reason, "Sun exclusion triggered, emitting zero rate");
            }
            self.state = ControllerState::SunLockout;
            let _ = mount.slew_rate(Axis::Axis1, 0.0).await;
            let _ = mount.slew_rate(Axis::Axis2, 0.0).await;
            return;
        }

        let target_mount = self.world_to_mount_components(target_az, target_el, now);
        let (bias1, bias2) = self.rotate_bias(target_mount, now);

        let e1 = wrap_pm180(target_mount.0 - attitude.0) + bias1;
        let e2 = (target_mount.1 - attitude.1) + bias2;
        let error_mag = (e1 * e1 + e2 * e2).sqrt();

        if self.state == ControllerState::Slewing {
            if error_mag <= SLEW_ENGAGE_THRESHOLD_DEG {
                self.state = ControllerState::Tracking;
                self.pid_axis1.reset();
                self.pid_axis2.reset();
            } else {
                if let Err(e) = mount.slew_to(Axis::Axis1, target_mount.0).await {
                    tracing::warn!(error = %e, "absolute slew (axis 1) failed");
                }
                if let Err(e) = mount.slew_to(Axis::Axis2, target_mount.1).await {
                    tracing::warn!(error = %e, "absolute slew (axis 2) failed");
                }
                return;
            }
        } else {
            self.state = ControllerState::Tracking;
        }

        let rate1 = self.pid_axis1.step(e1, dt);
        let rate2 = self.pid_axis2.step(e2, dt);

        if let Err(e) = mount.slew_rate(Axis::Axis1, rate1).await {
            counters.bump_rate_rejection();
            tracing::debug!(error = %e, "rate command rejected (axis 1)");
        }
        if let Err(e) = mount.slew_rate(Axis::Axis2, rate2).await {
            counters.bump_rate_rejection();
            tracing::debug!(error = %e, "rate command rejected (axis 2)");
        }
    }

    fn maybe_time_out_attitude(&mut self) {
        let timed_out = match self.last_attitude_at {
            Some(t) => Instant::now().duration_since(t) > ATTITUDE_TIMEOUT,
            None => true,
        };
        if timed_out && self.state != ControllerState::Idle {
            tracing::warn!("attitude stream stale for over 1s, going idle");
            self.state = ControllerState::Idle;
        }
    }
}
