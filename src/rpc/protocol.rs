//! Wire types for the bridge RPC. Frames are length-prefixed (handled by
//! `tokio_util::codec::LengthDelimitedCodec`); the payload inside each frame
//! is this protocol's JSON encoding of a `Request` or `Response`.

use serde::{Deserialize, Serialize};

use crate::astro_math::Degrees;
use crate::error::MountError;
use crate::mount::{Axis, FrameKind, TrackingMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: Method,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Method {
    ReadAttitude,
    SlewRate { axis: Axis, rate_deg_per_sec: f64 },
    SlewTo { axis: Axis, angle_deg: Degrees },
    SetTrackingMode { mode: TrackingMode },
    Cancel,
    FrameKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub result: Result<MethodResult, MountError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MethodResult {
    Attitude(Degrees, Degrees),
    Ack,
    FrameKind(FrameKind),
}
