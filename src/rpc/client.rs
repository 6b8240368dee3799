//! Tracker-side RPC client: connects to a bridge over TCP, reconnecting with
//! exponential backoff on transport loss. Implements the same uniform
//! operation set as `MountAdapter` so the controller doesn't need to care
//! whether the mount is in-process or across the network.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::astro_math::Degrees;
use crate::error::MountError;
use crate::mount::{Axis, FrameKind, MountLike, MountResult, TrackingMode};

use super::protocol::{Method, MethodResult, Request, Response};

const BACKOFF_MIN: Duration = Duration::from_millis(100);
const BACKOFF_MAX: Duration = Duration::from_secs(2);

enum ClientMsg {
    Call(Method, oneshot::Sender<Result<MethodResult, MountError>>),
}

pub struct RpcMountClient {
    tx: mpsc::Sender<ClientMsg>,
    cached_frame_kind: FrameKind,
}

impl RpcMountClient {
    /// Spawns the connection task and queries the bridge's `frame_kind` once
    /// up front (it is constant per session), so the trait's synchronous
    /// `frame_kind` accessor has something to return.
    pub async fn connect(addr: String, shutdown: tokio::sync::broadcast::Receiver<()>) -> Self {
        let tx = Self::spawn_connection_task(addr, shutdown);
        let mut client = RpcMountClient {
            tx,
            cached_frame_kind: FrameKind::AltAz,
        };
        if let Ok(MethodResult::FrameKind(kind)) = client.call(Method::FrameKind).await {
            client.cached_frame_kind = kind;
        }
        client
    }

    fn spawn_connection_task(addr: String, mut shutdown: tokio::sync::broadcast::Receiver<()>) -> mpsc::Sender<ClientMsg> {
        let (tx, mut rx) = mpsc::channel::<ClientMsg>(64);

        tokio::spawn(async move {
            let mut conn: Option<Framed<TcpStream, LengthDelimitedCodec>> = None;
            let mut outstanding: HashMap<u64, oneshot::Sender<Result<MethodResult, MountError>>> = HashMap::new();
            let mut next_id: u64 = 0;
            let mut backoff = BACKOFF_MIN;

            loop {
                if conn.is_none() {
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => break,
                        result = TcpStream::connect(&addr) => {
                            match result {
                                Ok(stream) => {
                                    tracing::info!(%addr, "connected to mount bridge");
                                    conn = Some(Framed::new(stream, LengthDelimitedCodec::new()));
                                    backoff = BACKOFF_MIN;
                                }
                                Err(e) => {
                                    tracing::warn!(%addr, error = %e, "bridge connection failed, retrying");
                                    tokio::select! {
                                        biased;
                                        _ = shutdown.recv() => break,
                                        _ = tokio::time::sleep(backoff) => {}
                                    }
                                    backoff = (backoff * 2).min(BACKOFF_MAX);
                                }
                            }
                            continue;
                        }
                    }
                }

                let framed = conn.as_mut().unwrap();
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => break,
                    msg = rx.recv() => {
                        let Some(ClientMsg::Call(method, reply)) = msg else { break };
                        let id = next_id;
                        next_id += 1;
                        let request = Request { id, method };
                        match serde_json::to_vec(&request) {
                            Ok(bytes) => {
                                if framed.send(Bytes::from(bytes)).await.is_err() {
                                    conn = None;
                                    let _ = reply.send(Err(MountError::TransportLost));
                                    fail_all_outstanding(&mut outstanding);
                                } else {
                                    outstanding.insert(id, reply);
                                }
                            }
                            Err(_) => {
                                let _ = reply.send(Err(MountError::Protocol("failed to encode request".to_string())));
                            }
                        }
                    }
                    frame = framed.next() => {
                        match frame {
                            Some(Ok(bytes)) => {
                                match serde_json::from_slice::<Response>(&bytes) {
                                    Ok(response) => {
                                        if let Some(reply) = outstanding.remove(&response.id) {
                                            let _ = reply.send(response.result);
                                        }
                                    }
                                    Err(_) => tracing::warn!("malformed bridge reply, dropping"),
                                }
                            }
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "bridge connection lost");
                                conn = None;
                                fail_all_outstanding(&mut outstanding);
                            }
                            None => {
                                tracing::warn!("bridge closed the connection");
                                conn = None;
                                fail_all_outstanding(&mut outstanding);
                            }
                        }
                    }
                }
            }
        });

        tx
    }

    async fn call(&self, method: Method) -> Result<MethodResult, MountError> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ClientMsg::Call(method, reply)).await.is_err() {
            return Err(MountError::TransportLost);
        }
        rx.await.unwrap_or(Err(MountError::TransportLost))
    }

    pub async fn read_attitude(&self) -> Result<(Degrees, Degrees), MountError> {
        match self.call(Method::ReadAttitude).await? {
            MethodResult::Attitude(a, b) => Ok((a, b)),
            _ => Err(MountError::Protocol("unexpected reply shape".to_string())),
        }
    }

    pub async fn slew_rate(&self, axis: Axis, rate_deg_per_sec: f64) -> Result<(), MountError> {
        self.call(Method::SlewRate { axis, rate_deg_per_sec }).await.map(|_| ())
    }

    pub async fn slew_to(&self, axis: Axis, angle_deg: Degrees) -> Result<(), MountError> {
        self.call(Method::SlewTo { axis, angle_deg }).await.map(|_| ())
    }

    pub async fn set_tracking_mode(&self, mode: TrackingMode) -> Result<(), MountError> {
        self.call(Method::SetTrackingMode { mode }).await.map(|_| ())
    }

    pub async fn cancel(&self) -> Result<(), MountError> {
        self.call(Method::Cancel).await.map(|_| ())
    }

    pub async fn frame_kind(&self) -> Result<FrameKind, MountError> {
        match self.call(Method::FrameKind).await? {
            MethodResult::FrameKind(k) => Ok(k),
            _ => Err(MountError::Protocol("unexpected reply shape".to_string())),
        }
    }
}

#[async_trait::async_trait]
impl MountLike for RpcMountClient {
    async fn read_attitude(&mut self) -> MountResult<(Degrees, Degrees)> {
        RpcMountClient::read_attitude(self).await
    }

    async fn slew_rate(&mut self, axis: Axis, rate_deg_per_sec: f64) -> MountResult<()> {
        RpcMountClient::slew_rate(self, axis, rate_deg_per_sec).await
    }

    async fn slew_to(&mut self, axis: Axis, angle_deg: Degrees) -> MountResult<()> {
        RpcMountClient::slew_to(self, axis, angle_deg).await
    }

    async fn set_tracking_mode(&mut self, mode: TrackingMode) -> MountResult<()> {
        RpcMountClient::set_tracking_mode(self, mode).await
    }

    async fn cancel(&mut self) -> MountResult<()> {
        RpcMountClient::cancel(self).await
    }

    fn frame_kind(&self) -> FrameKind {
        // The cached frame kind from the last successful query; bridges
        // answer this instantly and it never changes mid-session, so the
        // tracker asks once at startup and the controller reads it via
        // `cached_frame_kind` rather than every tick (frame_kind can't be
        // async in this trait).
        self.cached_frame_kind
    }
}

fn fail_all_outstanding(outstanding: &mut HashMap<u64, oneshot::Sender<Result<MethodResult, MountError>>>) {
    for (_, reply) in outstanding.drain() {
        let _ = reply.send(Err(MountError::TransportLost));
    }
}
