//! Shared library behind the three binaries (`tracker`, `bridge`,
//! `ephemeris`): target fusion, the pointing controller, the mount
//! abstraction layer, landmark alignment, configuration, and the RPC
//! transport between tracker and bridge.

pub mod alignment;
pub mod astro_math;
pub mod config;
pub mod controller;
pub mod counters;
pub mod error;
pub mod mount;
pub mod pid;
pub mod rpc;
pub mod satellite;
pub mod sbs1;
pub mod shared_state;
pub mod target;
