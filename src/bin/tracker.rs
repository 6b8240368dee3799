//! The tracker binary: fuses ADS-B and satellite reports into target
//! predictions, runs the pointing controller, and drives the mount over an
//! RPC connection to a bridge. Never talks to hardware directly.

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use nexplane::alignment::{self, AlignmentOffset};
use nexplane::config::{self, RunConfig, TrackerArgs};
use nexplane::counters::DropCounters;
use nexplane::rpc::RpcMountClient;
use nexplane::sbs1::{self, SbsMessage};
use nexplane::shared_state::SharedState;
use nexplane::target::{fusion::FusionHandle, Report};

const SBS1_RECONNECT_MIN: Duration = Duration::from_millis(500);
const SBS1_RECONNECT_MAX: Duration = Duration::from_secs(10);
const TARGET_AUTOSELECT_INTERVAL: Duration = Duration::from_secs(2);

/// Cached velocity fields per aircraft, keyed by `hex_ident`. MSG,3
/// (position) and MSG,4 (velocity) arrive as separate SBS-1 lines; a report
/// is only emitted to fusion on a position line, using whatever velocity was
/// last seen (zero if none yet).
#[derive(Default, Clone, Copy)]
struct CachedVelocity {
    ground_speed_kt: Option<f64>,
    track_deg: Option<f64>,
    vertical_rate_fpm: Option<f64>,
}

async fn run_sbs1_connection(
    addr: String,
    fusion: FusionHandle,
    counters: Arc<DropCounters>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut backoff = SBS1_RECONNECT_MIN;
    let mut velocities: HashMap<String, CachedVelocity> = HashMap::new();

    loop {
        let stream = tokio::select! {
            biased;
            _ = shutdown.recv() => return,
            result = TcpStream::connect(&addr) => result,
        };

        let stream = match stream {
            Ok(s) => {
                tracing::info!(%addr, "connected to SBS-1 source");
                backoff = SBS1_RECONNECT_MIN;
                s
            }
            Err(e) => {
                tracing::warn!(%addr, error = %e, "SBS-1 connection failed, retrying");
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(SBS1_RECONNECT_MAX);
                continue;
            }
        };

        let mut lines = BufReader::new(stream).lines();
        loop {
            let line = tokio::select! {
                biased;
                _ = shutdown.recv() => return,
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::warn!(%addr, "SBS-1 source closed the connection");
                    break;
                }
                Err(e) => {
                    tracing::warn!(%addr, error = %e, "SBS-1 read failed");
                    break;
                }
            };

            let Some(message) = sbs1::parse_line(&line) else {
                counters.bump_malformed_sbs1();
                continue;
            };

            match message {
                SbsMessage::AirborneVelocity(v) => {
                    let entry = velocities.entry(v.hex_ident.clone()).or_default();
                    if v.ground_speed_kt.is_some() {
                        entry.ground_speed_kt = v.ground_speed_kt;
                    }
                    if v.track_deg.is_some() {
                        entry.track_deg = v.track_deg;
                    }
                    if v.vertical_rate_fpm.is_some() {
                        entry.vertical_rate_fpm = v.vertical_rate_fpm;
                    }
                }
                SbsMessage::AirbornePosition(p) => {
                    let velocity = velocities.get(&p.hex_ident).copied().unwrap_or_default();
                    fusion
                        .report(Report::Aircraft {
                            hex_ident: p.hex_ident,
                            callsign: p.callsign,
                            timestamp: Utc::now(),
                            lat: p.latitude,
                            lon: p.longitude,
                            altitude_ft: p.altitude_ft,
                            ground_speed_kt: velocity.ground_speed_kt,
                            track_deg: velocity.track_deg,
                            vertical_rate_fpm: velocity.vertical_rate_fpm,
                        })
                        .await;
                }
                SbsMessage::Ignored => {}
            }
        }
    }
}

/// In the absence of an operator display, the tracker follows whatever
/// target it has seen for the longest without interruption: the first one
/// returned by a snapshot taken once no target is already selected.
async fn run_target_autoselect(shared: SharedState, fusion: FusionHandle, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(TARGET_AUTOSELECT_INTERVAL);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => return,
            _ = ticker.tick() => {
                if shared.snapshot().await.state != nexplane::controller::ControllerState::Idle {
                    continue;
                }
                let snapshot = fusion.snapshot(Utc::now()).await;
                if let Some(first) = snapshot.into_iter().next() {
                    tracing::info!(target_id = %first.id, "auto-selecting target");
                    shared.select_target(Some(first.id)).await;
                }
            }
        }
    }
}

async fn resolve_initial_alignment(
    cfg: Arc<RunConfig>,
    mount: &RpcMountClient,
) -> Result<AlignmentOffset, String> {
    let now = Utc::now();
    let landmark = cfg.landmark.clone();
    let world = tokio::task::spawn_blocking(move || alignment::resolve_landmark(&landmark, &cfg, now))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;

    let mount_reading = mount.read_attitude().await.map_err(|e| e.to_string())?;
    Ok(AlignmentOffset::from_reading(world, mount_reading))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = TrackerArgs::parse();
    config::init_logging(args.common.verbose);

    let cfg = match config::load_run_config(&args.common.config) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            return ExitCode::from(1);
        }
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let ctrlc_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = ctrlc_tx.send(());
        }
    });

    let mut mount = RpcMountClient::connect(cfg.telescope_server.clone(), shutdown_tx.subscribe()).await;

    let alignment = match resolve_initial_alignment(cfg.clone(), &mount).await {
        Ok(alignment) => alignment,
        Err(e) => {
            tracing::error!(error = %e, "failed to resolve alignment landmark");
            return ExitCode::from(2);
        }
    };

    let counters = Arc::new(DropCounters::new());
    let (fusion, _fusion_task) = nexplane::target::fusion::spawn_fusion_task(
        cfg.observer.clone(),
        Duration::from_secs(cfg.silence_timeout_secs),
        counters.clone(),
        shutdown_tx.subscribe(),
    );

    for addr in &cfg.sbs1_servers {
        tokio::spawn(run_sbs1_connection(
            addr.clone(),
            fusion.clone(),
            counters.clone(),
            shutdown_tx.subscribe(),
        ));
    }

    let controller = nexplane::controller::Controller::new(
        cfg.gains,
        nexplane::mount::MAX_RATE_DEG_PER_SEC,
        cfg.sun_exclusion_radius_degrees,
        cfg.mount_mode,
        cfg.observer.lat_degrees,
        cfg.observer.lon_degrees,
    );
    let shared = SharedState::new(controller);
    shared.set_alignment(alignment).await;

    tokio::spawn(run_target_autoselect(
        shared.clone(),
        fusion.clone(),
        shutdown_tx.subscribe(),
    ));

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / cfg.controller_hz));
    let mut tick_shutdown = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            biased;
            _ = tick_shutdown.recv() => break,
            _ = ticker.tick() => {
                shared.tick(Utc::now(), &fusion, &mut mount, &counters).await;
            }
        }
    }

    ExitCode::SUCCESS
}
