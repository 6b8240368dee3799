//! Layered YAML configuration and the per-binary CLI surface.
//!
//! Three layers, later wins per-key: an embedded built-in default, an
//! optional `nexplane.yaml` in the working directory, then each `--config`
//! override file in the order given. All three are merged with the `config`
//! crate rather than a hand-rolled YAML parser.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::astro_math::Degrees;
use crate::error::ConfigError;

const DEFAULT_YAML: &str = include_str!("../config/default.yaml");

#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    pub lat_degrees: Degrees,
    pub lon_degrees: Degrees,
    pub alt_meters: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GainsConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub locations: HashMap<String, LocationConfig>,
    pub location: Option<String>,
    pub landmark: Option<String>,
    pub gains: Option<GainsConfig>,
    #[serde(default)]
    pub hootl: bool,
    pub telescope_server: Option<String>,
    pub telescope_protocol: Option<String>,
    pub mount_mode: Option<String>,
    #[serde(default)]
    pub sbs1_servers: Vec<String>,
    #[serde(default)]
    pub tle_files: Vec<String>,
    pub serial_port: Option<String>,
    #[serde(default)]
    pub sun_exclusion_radius_degrees: Option<Degrees>,
    #[serde(default)]
    pub silence_timeout_secs: Option<u64>,
    #[serde(default)]
    pub controller_hz: Option<f64>,
    #[serde(default)]
    pub star_catalog_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelescopeProtocol {
    NexStar,
    SkyWatcherSerial,
    SkyWatcherWifi,
    Hootl,
}

impl TelescopeProtocol {
    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "nexstar" => Ok(Self::NexStar),
            "skywatcher_serial" => Ok(Self::SkyWatcherSerial),
            "skywatcher_wifi" => Ok(Self::SkyWatcherWifi),
            "hootl" => Ok(Self::Hootl),
            other => Err(ConfigError::UnknownProtocol(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    AltAz,
    Equatorial,
}

impl MountMode {
    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "altaz" => Ok(Self::AltAz),
            "eq" => Ok(Self::Equatorial),
            other => Err(ConfigError::UnknownProtocol(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Landmark {
    Named(String),
    SolarSystemBody(String),
    Star(String),
}

fn parse_landmark(s: &str) -> Landmark {
    if let Some(body) = s.strip_prefix("sky:") {
        Landmark::SolarSystemBody(body.to_string())
    } else if let Some(name) = s.strip_prefix("star:") {
        Landmark::Star(name.to_string())
    } else {
        Landmark::Named(s.to_string())
    }
}

/// The fully resolved configuration for a run, constructed once at startup
/// and shared read-only via `Arc<RunConfig>`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub locations: HashMap<String, LocationConfig>,
    pub observer: LocationConfig,
    pub landmark: Landmark,
    pub gains: GainsConfig,
    pub hootl: bool,
    pub telescope_server: String,
    pub telescope_protocol: TelescopeProtocol,
    pub mount_mode: MountMode,
    pub sbs1_servers: Vec<String>,
    pub tle_files: Vec<String>,
    pub serial_port: String,
    pub sun_exclusion_radius_degrees: Degrees,
    pub silence_timeout_secs: u64,
    pub controller_hz: f64,
    pub star_catalog_url: String,
}

impl RunConfig {
    pub fn resolve(raw: RawConfig) -> Result<Self, ConfigError> {
        let location_name = raw.location.ok_or(ConfigError::MissingKey("location"))?;
        let observer = raw
            .locations
            .get(&location_name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownLocation(location_name.clone()))?;

        let landmark_raw = raw.landmark.ok_or(ConfigError::MissingKey("landmark"))?;
        let landmark = parse_landmark(&landmark_raw);
        if let Landmark::Named(name) = &landmark {
            if !raw.locations.contains_key(name) {
                return Err(ConfigError::UnknownLandmark(landmark_raw));
            }
        }

        let gains = raw.gains.ok_or(ConfigError::MissingKey("gains"))?;

        let telescope_server = raw
            .telescope_server
            .ok_or(ConfigError::MissingKey("telescope_server"))?;

        let telescope_protocol = TelescopeProtocol::parse(
            &raw.telescope_protocol
                .ok_or(ConfigError::MissingKey("telescope_protocol"))?,
        )?;

        let mount_mode = MountMode::parse(
            &raw.mount_mode.ok_or(ConfigError::MissingKey("mount_mode"))?,
        )?;

        Ok(RunConfig {
            locations: raw.locations,
            observer,
            landmark,
            gains,
            hootl: raw.hootl,
            telescope_server,
            telescope_protocol,
            mount_mode,
            sbs1_servers: raw.sbs1_servers,
            tle_files: raw.tle_files,
            serial_port: raw.serial_port.unwrap_or_else(|| "auto".to_string()),
            sun_exclusion_radius_degrees: raw.sun_exclusion_radius_degrees.unwrap_or(5.0),
            silence_timeout_secs: raw.silence_timeout_secs.unwrap_or(60),
            controller_hz: raw.controller_hz.unwrap_or(20.0),
            star_catalog_url: raw
                .star_catalog_url
                .unwrap_or_else(|| "https://api.nexplane.example/catalog".to_string()),
        })
    }
}

/// Builds the layered config from the built-in default, an optional
/// `nexplane.yaml` in the working directory, and each `--config` override in
/// order. Later sources win on a per-key basis.
pub fn load_raw_config(overrides: &[PathBuf]) -> Result<RawConfig, ConfigError> {
    let mut builder = config::Config::builder().add_source(config::File::from_str(
        DEFAULT_YAML,
        config::FileFormat::Yaml,
    ));

    builder = builder.add_source(config::File::with_name("nexplane").required(false));

    for path in overrides {
        builder = builder.add_source(
            config::File::from(path.as_path())
                .format(config::FileFormat::Yaml)
                .required(true),
        );
    }

    let built = builder.build()?;
    Ok(built.try_deserialize()?)
}

pub fn load_run_config(overrides: &[PathBuf]) -> Result<RunConfig, ConfigError> {
    RunConfig::resolve(load_raw_config(overrides)?)
}

fn parse_verbosity(level: u8) -> tracing::Level {
    match level {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

pub fn init_logging(verbosity: u8) {
    let level = parse_verbosity(verbosity);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .init();
}

/// Shared by all three binaries: the repeatable `--config` override flag and
/// a verbosity counter.
#[derive(Debug, Parser, Clone)]
pub struct CommonArgs {
    /// Additional YAML config file to layer on top of the defaults and any
    /// `nexplane.yaml` found in the working directory. May be repeated;
    /// later files win per-key.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Vec<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Parser)]
#[command(name = "tracker", about = "Target fusion, pointing controller, and mount client")]
pub struct TrackerArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Parser)]
#[command(name = "bridge", about = "Exposes a locally attached mount as an RPC service")]
pub struct BridgeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Address to listen on for tracker connections.
    #[arg(long, default_value = "0.0.0.0:45345")]
    pub listen: String,
}

#[derive(Debug, Parser)]
#[command(name = "ephemeris", about = "Propagates TLEs and publishes SBS-1 position records")]
pub struct EphemerisArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Address to listen on for tracker connections.
    #[arg(long, default_value = "0.0.0.0:30003")]
    pub listen: String,
}
