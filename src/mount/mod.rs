//! The mount abstraction layer: a uniform interface over three concrete
//! protocols plus the HOOTL simulator. Per the closed, compile-time-known
//! adapter set, this is a tagged union with one variant per protocol rather
//! than a trait object — there is no fourth adapter coming at runtime.

pub mod frame;
mod hootl;
mod nexstar;
mod skywatcher_serial;
mod skywatcher_wifi;

pub use hootl::Hootl;
pub use nexstar::NexStar;
pub use skywatcher_serial::SkyWatcherSerial;
pub use skywatcher_wifi::SkyWatcherWifi;

use serde::{Deserialize, Serialize};

use crate::astro_math::Degrees;
use crate::error::MountError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    /// Azimuth or right-ascension.
    Axis1,
    /// Elevation or declination.
    Axis2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    AltAz,
    Equatorial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingMode {
    Off,
    Sidereal,
    Lunar,
    Solar,
}

pub type MountResult<T> = Result<T, MountError>;

/// The uniform operation set from the mount abstraction contract. Implemented
/// both by `MountAdapter` (the in-process adapters, used by the bridge) and
/// by `RpcMountClient` (used by the tracker, which always talks to a mount
/// across the bridge RPC connection) so the controller can drive either one
/// without caring which.
#[async_trait::async_trait]
pub trait MountLike: Send {
    async fn read_attitude(&mut self) -> MountResult<(Degrees, Degrees)>;
    async fn slew_rate(&mut self, axis: Axis, rate_deg_per_sec: f64) -> MountResult<()>;
    async fn slew_to(&mut self, axis: Axis, angle_deg: Degrees) -> MountResult<()>;
    async fn set_tracking_mode(&mut self, mode: TrackingMode) -> MountResult<()>;
    async fn cancel(&mut self) -> MountResult<()>;
    fn frame_kind(&self) -> FrameKind;
}

/// The uniform operation set from the mount abstraction contract, dispatched
/// by matching on the adapter variant.
pub enum MountAdapter {
    NexStar(NexStar),
    SkyWatcherSerial(SkyWatcherSerial),
    SkyWatcherWifi(SkyWatcherWifi),
    Hootl(Hootl),
}

impl MountAdapter {
    pub async fn read_attitude(&mut self) -> MountResult<(Degrees, Degrees)> {
        match self {
            MountAdapter::NexStar(a) => a.read_attitude().await,
            MountAdapter::SkyWatcherSerial(a) => a.read_attitude().await,
            MountAdapter::SkyWatcherWifi(a) => a.read_attitude().await,
            MountAdapter::Hootl(a) => a.read_attitude().await,
        }
    }

    pub async fn slew_rate(&mut self, axis: Axis, rate_deg_per_sec: f64) -> MountResult<()> {
        match self {
            MountAdapter::NexStar(a) => a.slew_rate(axis, rate_deg_per_sec).await,
            MountAdapter::SkyWatcherSerial(a) => a.slew_rate(axis, rate_deg_per_sec).await,
            MountAdapter::SkyWatcherWifi(a) => a.slew_rate(axis, rate_deg_per_sec).await,
            MountAdapter::Hootl(a) => a.slew_rate(axis, rate_deg_per_sec).await,
        }
    }

    pub async fn slew_to(&mut self, axis: Axis, angle_deg: Degrees) -> MountResult<()> {
        match self {
            MountAdapter::NexStar(a) => a.slew_to(axis, angle_deg).await,
            MountAdapter::SkyWatcherSerial(a) => a.slew_to(axis, angle_deg).await,
            MountAdapter::SkyWatcherWifi(a) => a.slew_to(axis, angle_deg).await,
            MountAdapter::Hootl(a) => a.slew_to(axis, angle_deg).await,
        }
    }

    pub async fn set_tracking_mode(&mut self, mode: TrackingMode) -> MountResult<()> {
        match self {
            MountAdapter::NexStar(a) => a.set_tracking_mode(mode).await,
            MountAdapter::SkyWatcherSerial(a) => a.set_tracking_mode(mode).await,
            MountAdapter::SkyWatcherWifi(a) => a.set_tracking_mode(mode).await,
            MountAdapter::Hootl(a) => a.set_tracking_mode(mode).await,
        }
    }

    pub async fn cancel(&mut self) -> MountResult<()> {
        match self {
            MountAdapter::NexStar(a) => a.cancel().await,
            MountAdapter::SkyWatcherSerial(a) => a.cancel().await,
            MountAdapter::SkyWatcherWifi(a) => a.cancel().await,
            MountAdapter::Hootl(a) => a.cancel().await,
        }
    }

    pub fn frame_kind(&self) -> FrameKind {
        match self {
            MountAdapter::NexStar(a) => a.frame_kind(),
            MountAdapter::SkyWatcherSerial(a) => a.frame_kind(),
            MountAdapter::SkyWatcherWifi(a) => a.frame_kind(),
            MountAdapter::Hootl(a) => a.frame_kind(),
        }
    }
}

#[async_trait::async_trait]
impl MountLike for MountAdapter {
    async fn read_attitude(&mut self) -> MountResult<(Degrees, Degrees)> {
        MountAdapter::read_attitude(self).await
    }

    async fn slew_rate(&mut self, axis: Axis, rate_deg_per_sec: f64) -> MountResult<()> {
        MountAdapter::slew_rate(self, axis, rate_deg_per_sec).await
    }

    async fn slew_to(&mut self, axis: Axis, angle_deg: Degrees) -> MountResult<()> {
        MountAdapter::slew_to(self, axis, angle_deg).await
    }

    async fn set_tracking_mode(&mut self, mode: TrackingMode) -> MountResult<()> {
        MountAdapter::set_tracking_mode(self, mode).await
    }

    async fn cancel(&mut self) -> MountResult<()> {
        MountAdapter::cancel(self).await
    }

    fn frame_kind(&self) -> FrameKind {
        MountAdapter::frame_kind(self)
    }
}

/// The per-protocol rate-command magnitude ceiling (degrees/sec), enforced
/// by every adapter before a rate reaches the transport.
pub const MAX_RATE_DEG_PER_SEC: f64 = 4.0;

pub(crate) fn clamp_rate(rate: f64) -> f64 {
    rate.clamp(-MAX_RATE_DEG_PER_SEC, MAX_RATE_DEG_PER_SEC)
}
