//! Hardware-out-of-the-loop simulator. Integrates the last commanded rate
//! forward using the monotonic clock and quantizes reads to the step size of
//! the real encoder it stands in for, so HOOTL-driven tests exercise the
//! same rounding the hardware would.

use std::time::Instant;

use tokio::net::UdpSocket;

use crate::astro_math::Degrees;
use crate::error::MountError;

use super::{clamp_rate, Axis, FrameKind, MountResult, TrackingMode};

/// Matches the Sky-Watcher encoder's angular resolution used elsewhere in
/// the mount layer, so quantization artifacts look the same in simulation.
const DEFAULT_STEP_DEGREES: f64 = 360.0 / 0x1000000 as f64;

#[derive(Debug, Clone, Copy)]
struct SimAxis {
    angle_deg: Degrees,
    rate_deg_per_sec: f64,
    last_update: Instant,
}

impl SimAxis {
    fn new(initial_deg: Degrees) -> Self {
        SimAxis {
            angle_deg: initial_deg,
            rate_deg_per_sec: 0.0,
            last_update: Instant::now(),
        }
    }

    fn advance(&mut self, now: Instant) {
        let dt = now.duration_since(self.last_update).as_secs_f64();
        self.angle_deg = crate::astro_math::modulo(
            self.angle_deg + self.rate_deg_per_sec * dt,
            360.0,
        );
        self.last_update = now;
    }

    fn quantized(&self, step: f64) -> Degrees {
        (self.angle_deg / step).round() * step
    }
}

pub struct Hootl {
    axis1: SimAxis,
    axis2: SimAxis,
    step_degrees: f64,
    frame_kind: FrameKind,
}

impl Hootl {
    pub fn new(initial_axis1_deg: Degrees, initial_axis2_deg: Degrees, frame_kind: FrameKind) -> Self {
        Hootl {
            axis1: SimAxis::new(initial_axis1_deg),
            axis2: SimAxis::new(initial_axis2_deg),
            step_degrees: DEFAULT_STEP_DEGREES,
            frame_kind,
        }
    }

    pub fn with_step_degrees(mut self, step_degrees: f64) -> Self {
        self.step_degrees = step_degrees;
        self
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut SimAxis {
        match axis {
            Axis::Axis1 => &mut self.axis1,
            Axis::Axis2 => &mut self.axis2,
        }
    }

    pub async fn read_attitude(&mut self) -> MountResult<(Degrees, Degrees)> {
        let now = Instant::now();
        self.axis1.advance(now);
        self.axis2.advance(now);
        Ok((
            self.axis1.quantized(self.step_degrees),
            self.axis2.quantized(self.step_degrees),
        ))
    }

    pub async fn slew_rate(&mut self, axis: Axis, rate_deg_per_sec: f64) -> MountResult<()> {
        let rate = clamp_rate(rate_deg_per_sec);
        let now = Instant::now();
        let a = self.axis_mut(axis);
        a.advance(now);
        a.rate_deg_per_sec = rate;
        Ok(())
    }

    pub async fn slew_to(&mut self, axis: Axis, angle_deg: Degrees) -> MountResult<()> {
        let now = Instant::now();
        let a = self.axis_mut(axis);
        a.advance(now);
        a.angle_deg = crate::astro_math::modulo(angle_deg, 360.0);
        a.rate_deg_per_sec = 0.0;
        Ok(())
    }

    pub async fn set_tracking_mode(&mut self, mode: TrackingMode) -> MountResult<()> {
        let rate = match mode {
            TrackingMode::Off => 0.0,
            TrackingMode::Sidereal => 0.004_178_09,
            TrackingMode::Lunar => 0.004_024_138,
            TrackingMode::Solar => 0.004_166_65,
        };
        self.slew_rate(Axis::Axis1, rate).await
    }

    pub async fn cancel(&mut self) -> MountResult<()> {
        self.slew_rate(Axis::Axis1, 0.0).await?;
        self.slew_rate(Axis::Axis2, 0.0).await
    }

    pub fn frame_kind(&self) -> FrameKind {
        self.frame_kind
    }
}

/// Stands in for a real Sky-Watcher Wi-Fi mount head: a standalone UDP
/// listener speaking the same `:`/`=`/`!`/CR wire protocol, so the Wi-Fi
/// adapter can be exercised without hardware. Always answers; does not
/// itself model packet loss — `SkyWatcherWifi`'s retransmit-once timeout
/// policy is what a lossy link exercises, and is covered at the unit level
/// in `skywatcher_wifi.rs`, not by dropping packets here.
pub struct HootlWifiServer {
    socket: UdpSocket,
    sim: Hootl,
}

impl HootlWifiServer {
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(HootlWifiServer {
            socket,
            sim: Hootl::new(0.0, 0.0, FrameKind::Equatorial),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs until the socket errors or the process is torn down; intended to
    /// be spawned as its own task in test harnesses.
    pub async fn run(&mut self) -> MountResult<()> {
        let mut buf = [0u8; 256];
        loop {
            let (n, peer) = self
                .socket
                .recv_from(&mut buf)
                .await
                .map_err(|_| MountError::TransportLost)?;
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            if let Some(reply) = self.handle_request(&request).await {
                let _ = self.socket.send_to(reply.as_bytes(), peer).await;
            }
        }
    }

    async fn handle_request(&mut self, request: &str) -> Option<String> {
        let body = request.strip_prefix(':')?;
        let body = body.trim_end_matches('\r');
        if body.len() < 4 {
            return None;
        }
        let seq = &body[0..2];
        let cmd = body.as_bytes()[2];
        let axis_digit = body.as_bytes()[3];
        let axis = if axis_digit == b'1' { Axis::Axis1 } else { Axis::Axis2 };
        let payload = &body[4..];

        let response = match cmd {
            b'e' => Some("0001".to_string()),
            b'j' => {
                let (a1, a2) = self.sim.read_attitude().await.ok()?;
                let deg = if matches!(axis, Axis::Axis1) { a1 } else { a2 };
                let steps = ((crate::astro_math::modulo(deg, 360.0) / 360.0) * 0x1000000 as f64).round() as u64;
                Some(format!("{steps:06X}"))
            }
            b'G' => Some(String::new()),
            b'S' => {
                let steps = u64::from_str_radix(payload, 16).ok()?;
                let degrees = (steps as f64) / (0x1000000_u64 as f64) * 360.0;
                self.sim.slew_to(axis, degrees).await.ok()?;
                Some(String::new())
            }
            b'I' => {
                let period_us = u64::from_str_radix(payload, 16).ok()?;
                let rate_deg = if period_us == 0 {
                    0.0
                } else {
                    let steps_per_sec = 1_000_000.0 / period_us as f64;
                    steps_per_sec / 0x1000000 as f64 * 360.0
                };
                self.sim.slew_rate(axis, rate_deg).await.ok()?;
                Some(String::new())
            }
            b'J' | b'K' => Some(String::new()),
            _ => None,
        }?;

        Some(format!("={seq}{response}\r"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn integrates_rate_forward_and_quantizes() {
        let mut mount = Hootl::new(0.0, 0.0, FrameKind::AltAz).with_step_degrees(0.01);
        mount.slew_rate(Axis::Axis1, 1.0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let (a1, _a2) = mount.read_attitude().await.unwrap();
        assert!(a1 > 0.0);
        assert!((a1 / 0.01 - (a1 / 0.01).round()).abs() < 1e-9);
    }

    #[tokio::test]
    async fn slew_to_sets_absolute_angle_and_stops_motion() {
        let mut mount = Hootl::new(0.0, 0.0, FrameKind::AltAz);
        mount.slew_to(Axis::Axis2, 45.0).await.unwrap();
        let (_, a2) = mount.read_attitude().await.unwrap();
        assert!((a2 - 45.0).abs() < 0.1);
    }

    #[tokio::test]
    async fn wifi_server_answers_position_query() {
        let mut server = HootlWifiServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(addr).await.unwrap();
        client.send(b":01j1\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = tokio::time::timeout(Duration::from_millis(200), client.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let reply = String::from_utf8_lossy(&buf[..n]).to_string();
        assert!(reply.starts_with("=01"));
    }

    #[tokio::test]
    async fn wifi_server_slew_to_moves_the_axis() {
        let mut server = HootlWifiServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(addr).await.unwrap();

        // Quarter turn on axis 2: 0x400000 of 0x1000000 steps per revolution.
        client.send(b":01S2400000\r").await.unwrap();
        let mut buf = [0u8; 64];
        tokio::time::timeout(Duration::from_millis(200), client.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();

        client.send(b":02j2\r").await.unwrap();
        let n = tokio::time::timeout(Duration::from_millis(200), client.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let reply = String::from_utf8_lossy(&buf[..n]).to_string();
        let steps = u64::from_str_radix(reply.trim_start_matches("=02").trim_end_matches('\r'), 16).unwrap();
        let degrees = (steps as f64) / (0x1000000_u64 as f64) * 360.0;
        assert!((degrees - 90.0).abs() < 0.01, "expected ~90 degrees, got {degrees}");
    }
}
