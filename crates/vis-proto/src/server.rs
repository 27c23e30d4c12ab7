//! Non-blocking TCP + WebSocket server accepting exactly one subscriber.

use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener, TcpStream};

use tracing::{debug, info, warn};

use crate::frame::{self, DecodeOutcome, DecodedFrame, OP_BINARY, OP_CLOSE, OP_PING, OP_PONG, OP_TEXT};
use crate::handshake;
use crate::{ProtoError, Result};

/// Default port the server listens on.
pub const DEFAULT_PORT: u16 = 7700;

/// A single connected subscriber: a handshake-complete TCP stream plus its
/// unparsed inbound byte buffer.
struct Client {
    stream: TcpStream,
    inbound: Vec<u8>,
    handshaked: bool,
    http_buf: Vec<u8>,
}

/// Text command received from the subscriber, with WebSocket framing
/// already stripped.
pub struct Inbound {
    pub text: String,
}

/// Hand-rolled single-subscriber WebSocket server.
///
/// Only one client is ever accepted; a second incoming connection is
/// accepted at the TCP layer (so the listen backlog doesn't stall) and then
/// immediately closed without a handshake, per spec.
pub struct WsServer {
    listener: Option<TcpListener>,
    client: Option<Client>,
}

impl WsServer {
    pub fn new() -> Self {
        WsServer {
            listener: None,
            client: None,
        }
    }

    /// Bind the listening socket. Suppresses `SIGPIPE` on unix so a write to
    /// a half-closed socket surfaces as an `Err` instead of killing the
    /// process.
    pub fn start(&mut self, port: u16) -> Result<()> {
        #[cfg(unix)]
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        }

        let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, port);
        let listener = TcpListener::bind(addr).map_err(ProtoError::Bind)?;
        listener.set_nonblocking(true).map_err(ProtoError::Bind)?;
        info!(port, "websocket server listening");
        self.listener = Some(listener);
        Ok(())
    }

    pub fn has_client(&self) -> bool {
        self.client.as_ref().is_some_and(|c| c.handshaked)
    }

    /// Drive one iteration: accept a pending connection, advance a pending
    /// handshake, and drain any complete frames from the current client.
    ///
    /// Returns the text commands received this poll, in order.
    pub fn poll(&mut self) -> Vec<Inbound> {
        self.accept_pending();

        let Some(client) = self.client.as_mut() else {
            return Vec::new();
        };

        if !client.handshaked {
            if let Err(()) = try_handshake(client) {
                debug!("handshake failed, dropping connection");
                self.client = None;
            }
            return Vec::new();
        }

        match drain_client(client) {
            Ok(inbound) => inbound,
            Err(()) => {
                info!("subscriber disconnected");
                self.client = None;
                Vec::new()
            }
        }
    }

    fn accept_pending(&mut self) {
        let Some(listener) = &self.listener else {
            return;
        };

        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if self.client.is_some() {
                        debug!(%peer, "rejecting extra connection, already have a subscriber");
                        drop(stream);
                        continue;
                    }
                    if stream.set_nonblocking(true).is_err() {
                        continue;
                    }
                    let _ = stream.set_nodelay(true);
                    info!(%peer, "accepted connection");
                    self.client = Some(Client {
                        stream,
                        inbound: Vec::new(),
                        handshaked: false,
                        http_buf: Vec::new(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    /// Send a binary spectrum frame to the current subscriber, if any.
    pub fn send_binary(&mut self, payload: &[u8]) {
        self.send(OP_BINARY, payload);
    }

    /// Send a text control-plane response to the current subscriber, if any.
    pub fn send_text(&mut self, payload: &str) {
        self.send(OP_TEXT, payload.as_bytes());
    }

    fn send(&mut self, opcode: u8, payload: &[u8]) {
        let Some(client) = self.client.as_mut() else {
            return;
        };
        if !client.handshaked {
            return;
        }
        let frame = frame::encode(opcode, payload);
        if write_all_nonblocking(&mut client.stream, &frame).is_err() {
            self.client = None;
        }
    }

    /// Drop the current subscriber, if any, closing its socket.
    pub fn stop(&mut self) {
        self.client = None;
        self.listener = None;
    }
}

impl Default for WsServer {
    fn default() -> Self {
        Self::new()
    }
}

fn try_handshake(client: &mut Client) -> std::result::Result<(), ()> {
    let mut buf = [0u8; 1024];
    loop {
        match client.stream.read(&mut buf) {
            Ok(0) => return Err(()),
            Ok(n) => client.http_buf.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(_) => return Err(()),
        }
    }

    let request = String::from_utf8_lossy(&client.http_buf);
    if !request.contains("\r\n\r\n") {
        return Ok(()); // headers incomplete, wait for more bytes
    }

    let key = handshake::extract_key(&request).ok_or(())?;
    let response = handshake::build_response(key);
    write_all_nonblocking(&mut client.stream, response.as_bytes()).map_err(|_| ())?;
    client.handshaked = true;
    client.http_buf.clear();
    Ok(())
}

fn drain_client(client: &mut Client) -> std::result::Result<Vec<Inbound>, ()> {
    let mut buf = [0u8; 4096];
    loop {
        match client.stream.read(&mut buf) {
            Ok(0) => return Err(()),
            Ok(n) => client.inbound.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(_) => return Err(()),
        }
    }

    let mut out = Vec::new();
    loop {
        match frame::decode(&client.inbound) {
            DecodeOutcome::Frame { frame, consumed } => {
                client.inbound.drain(..consumed);
                match handle_frame(client, frame)? {
                    Some(text) => out.push(Inbound { text }),
                    None => {}
                }
            }
            DecodeOutcome::Incomplete => break,
            DecodeOutcome::Violation => return Err(()),
        }
    }
    Ok(out)
}

fn handle_frame(client: &mut Client, frame: DecodedFrame) -> std::result::Result<Option<String>, ()> {
    match frame.opcode {
        OP_TEXT => Ok(Some(String::from_utf8_lossy(&frame.payload).into_owned())),
        OP_CLOSE => {
            let reply = frame::encode(OP_CLOSE, &frame.payload);
            let _ = write_all_nonblocking(&mut client.stream, &reply);
            Err(())
        }
        OP_PING => {
            let pong = frame::encode(OP_PONG, &frame.payload);
            write_all_nonblocking(&mut client.stream, &pong).map_err(|_| ())?;
            Ok(None)
        }
        OP_PONG => Ok(None),
        _ => Ok(None),
    }
}

fn write_all_nonblocking(stream: &mut TcpStream, mut buf: &[u8]) -> std::io::Result<()> {
    while !buf.is_empty() {
        match stream.write(buf) {
            Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
