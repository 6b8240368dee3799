//! Bridge-side RPC server: accepts tracker connections and drives a single
//! `MountAdapter`, one outstanding command at a time, per the mount I/O
//! task's "exactly one outstanding command" rule.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::mount::MountAdapter;

use super::protocol::{Method, MethodResult, Request, Response};

enum MountMsg {
    Call(Method, oneshot::Sender<Result<MethodResult, crate::error::MountError>>),
}

async fn run_mount_task(mut adapter: MountAdapter, mut rx: mpsc::Receiver<MountMsg>) {
    while let Some(MountMsg::Call(method, reply)) = rx.recv().await {
        let result = dispatch(&mut adapter, method).await;
        let _ = reply.send(result);
    }
}

async fn dispatch(adapter: &mut MountAdapter, method: Method) -> Result<MethodResult, crate::error::MountError> {
    match method {
        Method::ReadAttitude => adapter.read_attitude().await.map(|(a, b)| MethodResult::Attitude(a, b)),
        Method::SlewRate { axis, rate_deg_per_sec } => {
            adapter.slew_rate(axis, rate_deg_per_sec).await.map(|_| MethodResult::Ack)
        }
        Method::SlewTo { axis, angle_deg } => adapter.slew_to(axis, angle_deg).await.map(|_| MethodResult::Ack),
        Method::SetTrackingMode { mode } => adapter.set_tracking_mode(mode).await.map(|_| MethodResult::Ack),
        Method::Cancel => adapter.cancel().await.map(|_| MethodResult::Ack),
        Method::FrameKind => Ok(MethodResult::FrameKind(adapter.frame_kind())),
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    mount_tx: mpsc::Sender<MountMsg>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            frame = framed.next() => {
                let Some(frame) = frame else { break };
                let Ok(bytes) = frame else { break };

                let request: Request = match serde_json::from_slice(&bytes) {
                    Ok(r) => r,
                    Err(_) => continue,
                };

                let (reply_tx, reply_rx) = oneshot::channel();
                if mount_tx.send(MountMsg::Call(request.method, reply_tx)).await.is_err() {
                    break;
                }
                let result = reply_rx.await.unwrap_or(Err(crate::error::MountError::TransportLost));
                let response = Response { id: request.id, result };

                match serde_json::to_vec(&response) {
                    Ok(encoded) => {
                        if framed.send(Bytes::from(encoded)).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    }
}

/// Binds `listen_addr`, accepts connections, and serves them against a
/// single `MountAdapter` owned by a dedicated task until shutdown fires.
pub async fn serve_bridge(
    listen_addr: &str,
    adapter: MountAdapter,
    shutdown: broadcast::Sender<()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "bridge listening");

    let (mount_tx, mount_rx) = mpsc::channel(16);
    tokio::spawn(run_mount_task(adapter, mount_rx));

    let mut shutdown_rx = shutdown.subscribe();
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                tracing::info!(%peer, "tracker connected");
                let mount_tx = mount_tx.clone();
                let conn_shutdown = shutdown.subscribe();
                tokio::spawn(handle_connection(stream, mount_tx, conn_shutdown));
            }
        }
    }
    Ok(())
}
