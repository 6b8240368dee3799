//! The bridge binary: owns exactly one mount adapter and exposes its
//! operations as an RPC service so the tracker never has to be the process
//! holding the serial port or UDP socket.

use std::process::ExitCode;

use clap::Parser;
use tokio::sync::broadcast;

use nexplane::config::{self, BridgeArgs, TelescopeProtocol};
use nexplane::mount::{FrameKind, Hootl, MountAdapter, NexStar, SkyWatcherSerial, SkyWatcherWifi};
use nexplane::rpc;

fn frame_kind_for(mode: config::MountMode) -> FrameKind {
    match mode {
        config::MountMode::AltAz => FrameKind::AltAz,
        config::MountMode::Equatorial => FrameKind::Equatorial,
    }
}

async fn build_adapter(cfg: &config::RunConfig) -> Result<MountAdapter, String> {
    let frame_kind = frame_kind_for(cfg.mount_mode);

    if cfg.hootl {
        return Ok(MountAdapter::Hootl(Hootl::new(0.0, 0.0, frame_kind)));
    }

    match cfg.telescope_protocol {
        TelescopeProtocol::NexStar => NexStar::connect(&cfg.serial_port, frame_kind)
            .map(MountAdapter::NexStar)
            .map_err(|e| e.to_string()),
        TelescopeProtocol::SkyWatcherSerial => SkyWatcherSerial::connect(&cfg.serial_port, None)
            .map(MountAdapter::SkyWatcherSerial)
            .map_err(|e| e.to_string()),
        TelescopeProtocol::SkyWatcherWifi => SkyWatcherWifi::connect(&cfg.telescope_server)
            .await
            .map(MountAdapter::SkyWatcherWifi)
            .map_err(|e| e.to_string()),
        TelescopeProtocol::Hootl => Ok(MountAdapter::Hootl(Hootl::new(0.0, 0.0, frame_kind))),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = BridgeArgs::parse();
    config::init_logging(args.common.verbose);

    let cfg = match config::load_run_config(&args.common.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            return ExitCode::from(1);
        }
    };

    let adapter = match build_adapter(&cfg).await {
        Ok(adapter) => adapter,
        Err(e) => {
            tracing::error!(error = %e, "failed to start mount adapter");
            return ExitCode::from(2);
        }
    };

    let (shutdown_tx, _) = broadcast::channel(1);
    let ctrlc_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = ctrlc_tx.send(());
        }
    });

    match rpc::serve_bridge(&args.listen, adapter, shutdown_tx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "bridge listener failed");
            ExitCode::from(2)
        }
    }
}
