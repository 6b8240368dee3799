//! The tracker-to-bridge RPC transport: a length-prefixed, JSON-framed
//! request/response protocol so a `MountAdapter` can be driven either
//! in-process or over a TCP connection to a machine physically wired to the
//! mount.

mod client;
mod protocol;
mod server;

pub use client::RpcMountClient;
pub use protocol::{Request, Response};
pub use server::serve_bridge;
