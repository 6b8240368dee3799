//! NexStar ASCII hand-controller protocol over serial. No suitable
//! off-the-shelf crate exists for this one, so the command language is
//! implemented directly against `serialport`.
//!
//! Attitude reads use the precise (32-bit) get-position commands, whose
//! reply is two comma-separated 8-digit hex fractions of a revolution
//! terminated by `#`. Variable-rate slews go through the hand controller's
//! pass-through command to the Az/RA or El/Dec motor, using the PMC-8-style
//! two-byte signed rate encoding (direction byte 6/7, magnitude in
//! arcsec/sec * 4, high byte then low byte).

use std::io::{Read, Write};
use std::time::Duration;

use crate::astro_math::Degrees;
use crate::error::MountError;

use super::{clamp_rate, Axis, FrameKind, MountResult, TrackingMode};

const REVOLUTION: f64 = 4_294_967_296.0; // 2^32
const READ_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
enum Device {
    AzRaMotor = 16,
    ElDecMotor = 17,
}

fn device_for_axis(axis: Axis) -> Device {
    match axis {
        Axis::Axis1 => Device::AzRaMotor,
        Axis::Axis2 => Device::ElDecMotor,
    }
}

fn rate_bytes(rate_arcsec_per_sec: f64) -> (u8, u8) {
    let scaled = (rate_arcsec_per_sec.abs() * 4.0).round().min(65535.0) as u16;
    ((scaled / 256) as u8, (scaled % 256) as u8)
}

fn fraction_to_degrees(fraction: u32) -> Degrees {
    (fraction as f64) / REVOLUTION * 360.0
}

fn degrees_to_fraction(deg: Degrees) -> u32 {
    let wrapped = crate::astro_math::modulo(deg, 360.0);
    ((wrapped / 360.0) * REVOLUTION).round() as u32
}

pub struct NexStar {
    port: Box<dyn serialport::SerialPort>,
    frame_kind: FrameKind,
}

impl NexStar {
    pub fn connect(path: &str, frame_kind: FrameKind) -> MountResult<Self> {
        let port = serialport::new(path, 9600)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| MountError::Device(e.to_string()))?;
        Ok(NexStar { port, frame_kind })
    }

    fn write_and_await_hash(&mut self, buf: &[u8]) -> MountResult<Vec<u8>> {
        self.port
            .write_all(buf)
            .map_err(|_| MountError::TransportLost)?;

        let mut response = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Err(MountError::TransportLost),
                Ok(_) => {
                    response.push(byte[0]);
                    if byte[0] == b'#' {
                        break;
                    }
                    if response.len() > 64 {
                        return Err(MountError::Protocol("reply too long".to_string()));
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(MountError::Protocol("timed out waiting for reply".to_string()))
                }
                Err(_) => return Err(MountError::TransportLost),
            }
        }
        Ok(response)
    }

    fn parse_precise_position(reply: &[u8]) -> MountResult<(Degrees, Degrees)> {
        let text = std::str::from_utf8(reply).map_err(|_| MountError::Protocol("non-utf8 reply".to_string()))?;
        let text = text.trim_end_matches('#');
        let mut parts = text.split(',');
        let a = parts.next().ok_or_else(|| MountError::Protocol("missing field".to_string()))?;
        let b = parts.next().ok_or_else(|| MountError::Protocol("missing field".to_string()))?;

        let a = u32::from_str_radix(a, 16).map_err(|_| MountError::Protocol("bad hex".to_string()))?;
        let b = u32::from_str_radix(b, 16).map_err(|_| MountError::Protocol("bad hex".to_string()))?;

        Ok((fraction_to_degrees(a), fraction_to_degrees(b)))
    }

    pub async fn read_attitude(&mut self) -> MountResult<(Degrees, Degrees)> {
        let cmd: u8 = match self.frame_kind {
            FrameKind::Equatorial => b'e',
            FrameKind::AltAz => b'z',
        };
        let reply = self.write_and_await_hash(&[cmd])?;
        Self::parse_precise_position(&reply)
    }

    pub async fn slew_rate(&mut self, axis: Axis, rate_deg_per_sec: f64) -> MountResult<()> {
        let rate = clamp_rate(rate_deg_per_sec);
        let rate_arcsec = rate * 3600.0;
        let device = device_for_axis(axis);
        let dir_byte: u8 = if rate >= 0.0 { 6 } else { 7 };
        let (hi, lo) = rate_bytes(rate_arcsec);

        let frame = [b'P', 2, device as u8, dir_byte, hi, lo, 0, 0];
        self.write_and_await_hash(&frame)?;
        Ok(())
    }

    pub async fn slew_to(&mut self, axis: Axis, angle_deg: Degrees) -> MountResult<()> {
        let current = self.read_attitude().await?;
        let (a1, a2) = match axis {
            Axis::Axis1 => (angle_deg, current.1),
            Axis::Axis2 => (current.0, angle_deg),
        };

        let cmd: u8 = match self.frame_kind {
            FrameKind::Equatorial => b'r',
            FrameKind::AltAz => b'b',
        };

        let payload = format!(
            "{:08X},{:08X}",
            degrees_to_fraction(a1),
            degrees_to_fraction(a2)
        );
        let mut frame = vec![cmd];
        frame.extend_from_slice(payload.as_bytes());
        self.write_and_await_hash(&frame)?;
        Ok(())
    }

    pub async fn set_tracking_mode(&mut self, mode: TrackingMode) -> MountResult<()> {
        let byte = match mode {
            TrackingMode::Off => 0u8,
            TrackingMode::Sidereal => match self.frame_kind {
                FrameKind::AltAz => 1,
                FrameKind::Equatorial => 2,
            },
            TrackingMode::Lunar | TrackingMode::Solar => 2,
        };
        self.write_and_await_hash(&[b'T', byte])?;
        Ok(())
    }

    pub async fn cancel(&mut self) -> MountResult<()> {
        self.write_and_await_hash(&[b'M'])?;
        Ok(())
    }

    pub fn frame_kind(&self) -> FrameKind {
        self.frame_kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_round_trip() {
        for deg in [0.0, 45.0, 90.0, 180.0, 270.0, 359.999] {
            let fraction = degrees_to_fraction(deg);
            let back = fraction_to_degrees(fraction);
            assert!((back - deg).abs() < 1e-4, "deg={deg} back={back}");
        }
    }

    #[test]
    fn rate_bytes_scale_by_four() {
        let (hi, lo) = rate_bytes(100.0);
        let combined = (hi as u16) * 256 + lo as u16;
        assert_eq!(combined, 400);
    }

    #[test]
    fn parse_precise_position_reads_two_hex_fractions() {
        let reply = b"00000000,40000000#";
        let (a, b) = NexStar::parse_precise_position(reply).unwrap();
        assert!((a - 0.0).abs() < 1e-4);
        assert!((b - 90.0).abs() < 1e-4);
    }
}
