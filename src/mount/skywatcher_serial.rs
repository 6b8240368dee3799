//! Sky-Watcher / EQMOD binary motor-controller protocol over USB serial,
//! built on the `synscan` crate's `MotorController`, one `SingleChannel` per
//! axis. Cannot self-report an aligned frame — landmark alignment is
//! mandatory for this adapter.

use std::time::Duration;

use synscan::serialport::SPSerialPort;
use synscan::util::{SynScanError, SynScanResult};
use synscan::{Direction, MotorController, SingleChannel};

use crate::astro_math::Degrees;
use crate::error::MountError;

use super::{clamp_rate, Axis, FrameKind, MountResult, TrackingMode};

const BAUD_RATE: u32 = 115_200;
const DEFAULT_TIMEOUT_MILLIS: u64 = 50;
const NUM_TRIES: u64 = 3;
const RETRY_MILLIS: u64 = 10;

const SIDEREAL_DEG_PER_SEC: f64 = 0.004_178_09;
const LUNAR_DEG_PER_SEC: f64 = 0.004_024_138;
const SOLAR_DEG_PER_SEC: f64 = 0.004_166_65;

fn axis_channel(axis: Axis) -> SingleChannel {
    match axis {
        Axis::Axis1 => SingleChannel::Channel1,
        Axis::Axis2 => SingleChannel::Channel2,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct AxisState {
    is_moving: bool,
    direction: Option<Direction>,
}

pub struct SkyWatcherSerial {
    mc: MotorController<SPSerialPort>,
    axis1: AxisState,
    axis2: AxisState,
}

impl SkyWatcherSerial {
    pub fn connect(path: &str, timeout: Option<Duration>) -> MountResult<Self> {
        let timeout = timeout.unwrap_or_else(|| Duration::from_millis(DEFAULT_TIMEOUT_MILLIS));
        let mc = MotorController::new_serialport(path, BAUD_RATE, timeout)
            .map_err(|e| MountError::Device(e.to_string()))?;

        Ok(SkyWatcherSerial {
            mc,
            axis1: AxisState::default(),
            axis2: AxisState::default(),
        })
    }

    pub fn auto_detect(timeout: Option<Duration>) -> MountResult<Self> {
        let ports = serialport::available_ports().map_err(|e| MountError::Device(e.description))?;

        let port = ports
            .into_iter()
            .find(|p| {
                matches!(&p.port_type, serialport::SerialPortType::UsbPort(info)
                    if info.vid == 0x67b && info.pid == 0x2303)
            })
            .ok_or_else(|| MountError::Device("no Sky-Watcher serial port found".to_string()))?;

        tracing::info!(port = %port.port_name, "found Sky-Watcher serial port");
        Self::connect(&port.port_name, timeout)
    }

    async fn with_retries<F, T>(f: F) -> MountResult<T>
    where
        F: Fn() -> SynScanResult<T> + Send,
        T: Send + 'static,
    {
        let result = retry::retry_with_index(
            retry::delay::Exponential::from_millis(RETRY_MILLIS).take(NUM_TRIES as usize),
            |try_no| {
                let r = f();
                if let Err(e) = &r {
                    if try_no < NUM_TRIES {
                        tracing::warn!("error sending command to Sky-Watcher motor controller: {e} -- retrying");
                    }
                }
                r
            },
        );

        match result {
            Ok(v) => Ok(v),
            Err(retry::Error::Operation { error, .. }) => match error {
                SynScanError::CommunicationError(_) => Err(MountError::TransportLost),
                other => Err(MountError::Protocol(other.to_string())),
            },
            Err(retry::Error::Internal(msg)) => Err(MountError::Protocol(msg)),
        }
    }

    fn axis_state_mut(&mut self, axis: Axis) -> &mut AxisState {
        match axis {
            Axis::Axis1 => &mut self.axis1,
            Axis::Axis2 => &mut self.axis2,
        }
    }

    pub async fn read_attitude(&mut self) -> MountResult<(Degrees, Degrees)> {
        let mc = &self.mc;
        let a1 = Self::with_retries(|| mc.inquire_pos_degrees(SingleChannel::Channel1)).await?;
        let a2 = Self::with_retries(|| mc.inquire_pos_degrees(SingleChannel::Channel2)).await?;
        Ok((a1, a2))
    }

    pub async fn slew_rate(&mut self, axis: Axis, rate_deg_per_sec: f64) -> MountResult<()> {
        let rate = clamp_rate(rate_deg_per_sec);
        let channel = axis_channel(axis);
        let direction = if rate >= 0.0 {
            Direction::Clockwise
        } else {
            Direction::CounterClockwise
        };

        let state = self.axis_state_mut(axis);
        let direction_changed = state.direction != Some(direction);

        if direction_changed {
            let mc = &self.mc;
            Self::with_retries(|| mc.set_tracking_motion_mode(channel, false, direction)).await?;
        }

        let mc = &self.mc;
        Self::with_retries(|| mc.set_motion_rate_degrees(channel, rate)).await?;

        let state = self.axis_state_mut(axis);
        state.direction = Some(direction);

        if !state.is_moving {
            let mc = &self.mc;
            Self::with_retries(|| mc.start_motion(channel)).await?;
            self.axis_state_mut(axis).is_moving = true;
        }

        Ok(())
    }

    pub async fn slew_to(&mut self, axis: Axis, angle_deg: Degrees) -> MountResult<()> {
        let channel = axis_channel(axis);
        let mc = &self.mc;
        Self::with_retries(|| mc.set_goto_motion_mode(channel, true)).await?;
        Self::with_retries(|| mc.set_goto_target_degrees(channel, angle_deg)).await?;
        Self::with_retries(|| mc.start_motion(channel)).await?;
        self.axis_state_mut(axis).is_moving = true;
        Ok(())
    }

    pub async fn set_tracking_mode(&mut self, mode: TrackingMode) -> MountResult<()> {
        let rate = match mode {
            TrackingMode::Off => {
                let mc = &self.mc;
                Self::with_retries(|| mc.stop_motion(SingleChannel::Channel1)).await?;
                self.axis1.is_moving = false;
                return Ok(());
            }
            TrackingMode::Sidereal => SIDEREAL_DEG_PER_SEC,
            TrackingMode::Lunar => LUNAR_DEG_PER_SEC,
            TrackingMode::Solar => SOLAR_DEG_PER_SEC,
        };
        self.slew_rate(Axis::Axis1, rate).await
    }

    pub async fn cancel(&mut self) -> MountResult<()> {
        let mc = &self.mc;
        Self::with_retries(|| mc.stop_motion(SingleChannel::Channel1)).await?;
        Self::with_retries(|| mc.stop_motion(SingleChannel::Channel2)).await?;
        self.axis1.is_moving = false;
        self.axis2.is_moving = false;
        Ok(())
    }

    pub fn frame_kind(&self) -> FrameKind {
        FrameKind::Equatorial
    }
}
