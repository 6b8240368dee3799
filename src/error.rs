//! Error taxonomy shared across the three binaries.
//!
//! Each category corresponds to a disposition: Configuration errors are
//! fatal at startup; Transport/Protocol/Device errors are recoverable and
//! the controller degrades to `Idle` rather than crashing; Safety errors
//! short-circuit command emission without ever propagating to the process
//! exit path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("unknown location {0:?}")]
    UnknownLocation(String),

    #[error("unknown landmark {0:?}")]
    UnknownLandmark(String),

    #[error("unknown telescope protocol {0:?}")]
    UnknownProtocol(String),

    #[error("missing required key {0}")]
    MissingKey(&'static str),
}

/// Errors surfaced by a `MountAdapter`. Variant names mirror the bridge's
/// wire error kinds one-to-one so RPC round-trips without re-mapping.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum MountError {
    #[error("transport lost")]
    TransportLost,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("unsupported operation")]
    Unsupported,

    #[error("mount busy")]
    Busy,
}

impl MountError {
    pub fn is_transport(&self) -> bool {
        matches!(self, MountError::TransportLost)
    }
}

/// Used internally by the controller to short-circuit command emission.
/// Never crosses a task boundary as an `Err` — the controller observes it
/// and transitions to `SunLockout` instead of propagating it further.
#[derive(Debug, Error, Clone, Copy)]
pub enum SafetyError {
    #[error("predicted boresight within sun exclusion radius")]
    SunExclusion,
}
