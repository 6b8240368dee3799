//! The ephemeris binary: propagates a set of TLEs forward and publishes
//! their sub-satellite points as synthetic SBS-1 position/velocity records,
//! so the tracker can follow a satellite through the exact same ingest path
//! it uses for ADS-B aircraft.

use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use nexplane::config::{self, EphemerisArgs};
use nexplane::sbs1::{format_airborne_position, format_airborne_velocity};
use nexplane::satellite::{load_tle_file, SatelliteTrack};

const PROPAGATE_INTERVAL: Duration = Duration::from_secs(1);

async fn handle_client(
    mut stream: tokio::net::TcpStream,
    peer: std::net::SocketAddr,
    mut lines: broadcast::Receiver<String>,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(%peer, "ephemeris client connected");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            line = lines.recv() => {
                match line {
                    Ok(line) => {
                        if stream.write_all(format!("{line}\r\n").as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
    tracing::info!(%peer, "ephemeris client disconnected");
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = EphemerisArgs::parse();
    config::init_logging(args.common.verbose);

    let cfg = match config::load_run_config(&args.common.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            return ExitCode::from(1);
        }
    };

    let mut tracks: Vec<SatelliteTrack> = Vec::new();
    for path in &cfg.tle_files {
        match load_tle_file(std::path::Path::new(path)) {
            Ok(mut loaded) => {
                tracing::info!(path, count = loaded.len(), "loaded TLE file");
                tracks.append(&mut loaded);
            }
            Err(e) => {
                tracing::error!(path, error = %e, "failed to read TLE file");
                return ExitCode::from(1);
            }
        }
    }

    let listener = match TcpListener::bind(&args.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, listen = %args.listen, "failed to bind ephemeris listener");
            return ExitCode::from(2);
        }
    };
    tracing::info!(listen = %args.listen, satellites = tracks.len(), "ephemeris listening");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let ctrlc_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = ctrlc_tx.send(());
        }
    });

    let (lines_tx, _) = broadcast::channel::<String>(1024);

    let mut accept_shutdown = shutdown_tx.subscribe();
    let accept_lines_tx = lines_tx.clone();
    let accept_shutdown_tx = shutdown_tx.clone();
    let accept_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = accept_shutdown.recv() => break,
                accepted = listener.accept() => {
                    let Ok((stream, peer)) = accepted else { continue };
                    tokio::spawn(handle_client(
                        stream,
                        peer,
                        accept_lines_tx.subscribe(),
                        accept_shutdown_tx.subscribe(),
                    ));
                }
            }
        }
    });

    let mut ticker = tokio::time::interval(PROPAGATE_INTERVAL);
    let mut tick_shutdown = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            biased;
            _ = tick_shutdown.recv() => break,
            _ = ticker.tick() => {
                let now = Utc::now();
                for track in &tracks {
                    match track.geodetic_sub_point(now) {
                        Ok((lat, lon, alt_m, gs_kt, track_deg, vr_fpm)) => {
                            let alt_ft = alt_m / 0.3048;
                            let _ = lines_tx.send(format_airborne_position(
                                &track.hex_ident, now, lat, lon, alt_ft,
                            ));
                            let _ = lines_tx.send(format_airborne_velocity(
                                &track.hex_ident, now, gs_kt, track_deg, vr_fpm,
                            ));
                        }
                        Err(e) => tracing::warn!(hex_ident = %track.hex_ident, error = %e, "propagation failed"),
                    }
                }
            }
        }
    }

    let _ = tokio::time::timeout(Duration::from_secs(1), accept_task).await;
    ExitCode::SUCCESS
}
