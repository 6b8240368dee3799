//! Sky-Watcher UDP protocol, spoken directly to the mount head on port
//! 11880 rather than through the `synscan` crate (which only implements the
//! serial transport). Same command vocabulary and `:`/`=`/`!`/CR framing as
//! the real protocol, with a sequence tag added so replies can be matched to
//! requests across a lossy, reordering UDP path, and a one-retransmit retry
//! policy.

use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::astro_math::Degrees;
use crate::error::MountError;

use super::{clamp_rate, Axis, FrameKind, MountResult, TrackingMode};

pub const PORT: u16 = 11880;
const REPLY_TIMEOUT: Duration = Duration::from_millis(200);
const STEPS_PER_REVOLUTION: u64 = 0x1000000; // matches the real encoder's 24-bit counter

fn axis_digit(axis: Axis) -> u8 {
    match axis {
        Axis::Axis1 => b'1',
        Axis::Axis2 => b'2',
    }
}

fn steps_to_degrees(steps: u64) -> Degrees {
    (steps as f64) / (STEPS_PER_REVOLUTION as f64) * 360.0
}

fn degrees_to_steps(deg: Degrees) -> u64 {
    let wrapped = crate::astro_math::modulo(deg, 360.0);
    ((wrapped / 360.0) * STEPS_PER_REVOLUTION as f64).round() as u64
}

pub struct SkyWatcherWifi {
    socket: UdpSocket,
    seq: u8,
}

impl SkyWatcherWifi {
    pub async fn connect(addr: &str) -> MountResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|_| MountError::TransportLost)?;
        socket
            .connect(addr)
            .await
            .map_err(|_| MountError::TransportLost)?;
        Ok(SkyWatcherWifi { socket, seq: 0 })
    }

    fn next_seq(&mut self) -> u8 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    /// Sends one framed request, retransmitting once on timeout, per the
    /// adapter's lossy-UDP tolerance policy.
    async fn request(&mut self, cmd: u8, axis: Axis, payload: &str) -> MountResult<String> {
        let seq = self.next_seq();
        let frame = format!(":{:02X}{}{}{}\r", seq, cmd as char, axis_digit(axis) as char, payload);

        for attempt in 0..2 {
            self.socket
                .send(frame.as_bytes())
                .await
                .map_err(|_| MountError::TransportLost)?;

            let mut buf = [0u8; 256];
            match timeout(REPLY_TIMEOUT, self.socket.recv(&mut buf)).await {
                Ok(Ok(n)) => {
                    let reply = String::from_utf8_lossy(&buf[..n]).to_string();
                    match Self::parse_reply(&reply, seq) {
                        Some(body) => return Ok(body),
                        None => continue, // stale or malformed reply, try again within the budget
                    }
                }
                Ok(Err(_)) => return Err(MountError::TransportLost),
                Err(_) if attempt == 0 => {
                    tracing::warn!(seq, "Sky-Watcher Wi-Fi reply timed out, retransmitting once");
                    continue;
                }
                Err(_) => return Err(MountError::TransportLost),
            }
        }
        Err(MountError::TransportLost)
    }

    fn parse_reply(reply: &str, expected_seq: u8) -> Option<String> {
        let reply = reply.trim_end_matches('\r');
        if reply.len() < 3 {
            return None;
        }
        let status = reply.as_bytes()[0];
        let seq = u8::from_str_radix(&reply[1..3], 16).ok()?;
        if seq != expected_seq {
            return None;
        }
        match status {
            b'=' => Some(reply[3..].to_string()),
            b'!' => None,
            _ => None,
        }
    }

    pub async fn read_attitude(&mut self) -> MountResult<(Degrees, Degrees)> {
        let a1 = self.request(b'j', Axis::Axis1, "").await?;
        let a2 = self.request(b'j', Axis::Axis2, "").await?;
        let steps1 = u64::from_str_radix(a1.trim(), 16).map_err(|_| MountError::Protocol("bad position reply".to_string()))?;
        let steps2 = u64::from_str_radix(a2.trim(), 16).map_err(|_| MountError::Protocol("bad position reply".to_string()))?;
        Ok((steps_to_degrees(steps1), steps_to_degrees(steps2)))
    }

    pub async fn slew_rate(&mut self, axis: Axis, rate_deg_per_sec: f64) -> MountResult<()> {
        let rate = clamp_rate(rate_deg_per_sec);
        let direction_digit = if rate >= 0.0 { '0' } else { '1' };
        self.request(b'G', axis, &format!("{direction_digit}0")).await?;

        let steps_per_sec = (rate.abs() / 360.0) * STEPS_PER_REVOLUTION as f64;
        let period = if steps_per_sec > 0.0 { (1.0 / steps_per_sec * 1_000_000.0).round() as u64 } else { 0 };
        self.request(b'I', axis, &format!("{period:06X}")).await?;
        self.request(b'J', axis, "").await?;
        Ok(())
    }

    pub async fn slew_to(&mut self, axis: Axis, angle_deg: Degrees) -> MountResult<()> {
        let steps = degrees_to_steps(angle_deg);
        self.request(b'S', axis, &format!("{steps:06X}")).await?;
        self.request(b'J', axis, "").await?;
        Ok(())
    }

    pub async fn set_tracking_mode(&mut self, mode: TrackingMode) -> MountResult<()> {
        match mode {
            TrackingMode::Off => self.cancel().await,
            TrackingMode::Sidereal => self.slew_rate(Axis::Axis1, 0.004_178_09).await,
            TrackingMode::Lunar => self.slew_rate(Axis::Axis1, 0.004_024_138).await,
            TrackingMode::Solar => self.slew_rate(Axis::Axis1, 0.004_166_65).await,
        }
    }

    pub async fn cancel(&mut self) -> MountResult<()> {
        self.request(b'K', Axis::Axis1, "").await?;
        self.request(b'K', Axis::Axis2, "").await?;
        Ok(())
    }

    pub fn frame_kind(&self) -> FrameKind {
        FrameKind::Equatorial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_round_trip() {
        for deg in [0.0, 45.0, 90.0, 359.0] {
            let steps = degrees_to_steps(deg);
            let back = steps_to_degrees(steps);
            assert!((back - deg).abs() < 1e-3, "deg={deg} back={back}");
        }
    }

    #[test]
    fn parse_reply_rejects_mismatched_sequence() {
        assert!(SkyWatcherWifi::parse_reply("=01DEADBEEF\r", 2).is_none());
        assert_eq!(
            SkyWatcherWifi::parse_reply("=02DEADBEEF\r", 2).as_deref(),
            Some("DEADBEEF")
        );
    }

    #[test]
    fn parse_reply_treats_failure_status_as_none() {
        assert!(SkyWatcherWifi::parse_reply("!05\r", 5).is_none());
    }

    /// A mount head that never answers (standing in for a packet-loss-heavy
    /// link, per the S6 scenario) gets one retransmit and then fails rather
    /// than hanging the caller indefinitely.
    #[tokio::test]
    async fn silent_mount_head_fails_after_one_retransmit() {
        let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();
        // Keep the socket alive (and draining, so the OS doesn't ICMP-reject
        // the client's sends) without ever replying.
        let _drain = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            loop {
                if silent.recv_from(&mut buf).await.is_err() {
                    break;
                }
            }
        });

        let mut client = SkyWatcherWifi::connect(&addr.to_string()).await.unwrap();
        let started = tokio::time::Instant::now();
        let result = client.read_attitude().await;

        assert!(matches!(result, Err(MountError::TransportLost)));
        // Two 200ms timeouts (the request, then the one retransmit).
        assert!(started.elapsed() >= Duration::from_millis(390));
    }
}
