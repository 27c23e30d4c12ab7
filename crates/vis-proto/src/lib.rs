//! Hand-rolled WebSocket transport for a single local subscriber.
//!
//! No `tungstenite`, no `tokio`: the daemon's main loop is a plain poll
//! loop, so the transport is a plain non-blocking `TcpListener` plus a
//! minimal RFC 6455 implementation covering exactly what a single local
//! viewer needs.

mod frame;
mod handshake;
mod server;

pub use frame::{DecodeOutcome, DecodedFrame, MAX_CLIENT_PAYLOAD};
pub use handshake::{accept_key, build_response, extract_key};
pub use server::{Inbound, WsServer, DEFAULT_PORT};

/// Error type for the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// Failed to bind or configure the listening socket.
    #[error("failed to bind websocket listener: {0}")]
    Bind(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
