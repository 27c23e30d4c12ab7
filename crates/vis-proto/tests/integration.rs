//! End-to-end handshake + framing tests against a real `WsServer` socket.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use vis_proto::WsServer;

fn connect_and_handshake(port: u16) -> TcpStream {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut stream = loop {
        match TcpStream::connect(("127.0.0.1", port)) {
            Ok(s) => break s,
            Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
            Err(e) => panic!("failed to connect: {e}"),
        }
    };
    stream.set_nodelay(true).unwrap();

    let request = "GET / HTTP/1.1\r\n\
                   Host: 127.0.0.1\r\n\
                   Upgrade: websocket\r\n\
                   Connection: Upgrade\r\n\
                   Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
                   Sec-WebSocket-Version: 13\r\n\r\n";
    stream.write_all(request.as_bytes()).unwrap();
    stream
}

fn read_available(stream: &mut TcpStream, timeout: Duration) -> Vec<u8> {
    stream.set_read_timeout(Some(timeout)).unwrap();
    let mut buf = vec![0u8; 4096];
    let mut out = Vec::new();
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                out.extend_from_slice(&buf[..n]);
                break;
            }
            Err(_) => break,
        }
    }
    out
}

fn masked_text_frame(text: &str) -> Vec<u8> {
    let mask = [0xAA, 0xBB, 0xCC, 0xDD];
    let payload = text.as_bytes();
    let mut out = vec![0x81u8, 0x80 | payload.len() as u8];
    out.extend_from_slice(&mask);
    for (i, &b) in payload.iter().enumerate() {
        out.push(b ^ mask[i % 4]);
    }
    out
}

fn poll_until<T>(server: &mut WsServer, mut f: impl FnMut(&mut WsServer) -> Option<T>, timeout: Duration) -> Option<T> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(v) = f(server) {
            return Some(v);
        }
        if Instant::now() >= deadline {
            return None;
        }
        server.poll();
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn handshake_completes_and_client_is_tracked() {
    let mut server = WsServer::new();
    server.start(17801).unwrap();

    let mut client = connect_and_handshake(17801);

    let ready = poll_until(
        &mut server,
        |s| if s.has_client() { Some(()) } else { None },
        Duration::from_secs(2),
    );
    assert!(ready.is_some(), "server never registered the handshake");

    let resp = read_available(&mut client, Duration::from_millis(500));
    let resp_text = String::from_utf8_lossy(&resp);
    assert!(resp_text.starts_with("HTTP/1.1 101 Switching Protocols"));
    assert!(resp_text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
}

#[test]
fn server_streams_binary_spectrum_frames_to_subscriber() {
    let mut server = WsServer::new();
    server.start(17802).unwrap();

    let mut client = connect_and_handshake(17802);
    poll_until(
        &mut server,
        |s| if s.has_client() { Some(()) } else { None },
        Duration::from_secs(2),
    )
    .expect("handshake never completed");
    let _ = read_available(&mut client, Duration::from_millis(200)); // drain handshake response

    let bars: Vec<u8> = vec![10, 20, 30, 255];
    server.send_binary(&bars);

    let raw = read_available(&mut client, Duration::from_millis(500));
    assert_eq!(raw[0], 0x82, "expected FIN+binary opcode");
    assert_eq!(raw[1] & 0x80, 0, "server frames must not be masked");
    let len = (raw[1] & 0x7F) as usize;
    assert_eq!(&raw[2..2 + len], &bars[..]);
}

#[test]
fn server_delivers_text_commands_from_subscriber() {
    let mut server = WsServer::new();
    server.start(17803).unwrap();

    let mut client = connect_and_handshake(17803);
    poll_until(
        &mut server,
        |s| if s.has_client() { Some(()) } else { None },
        Duration::from_secs(2),
    )
    .expect("handshake never completed");
    let _ = read_available(&mut client, Duration::from_millis(200));

    client
        .write_all(&masked_text_frame("SET_BAR_COUNT:16"))
        .unwrap();

    let inbound = poll_until(
        &mut server,
        |s| {
            let msgs = s.poll();
            msgs.into_iter().next()
        },
        Duration::from_secs(2),
    );
    let inbound = inbound.expect("server never delivered the text command");
    assert_eq!(inbound.text, "SET_BAR_COUNT:16");
}

#[test]
fn oversized_client_frame_drops_the_subscriber() {
    let mut server = WsServer::new();
    server.start(17804).unwrap();

    let mut client = connect_and_handshake(17804);
    poll_until(
        &mut server,
        |s| if s.has_client() { Some(()) } else { None },
        Duration::from_secs(2),
    )
    .expect("handshake never completed");
    let _ = read_available(&mut client, Duration::from_millis(200));

    let mask = [0x01, 0x02, 0x03, 0x04];
    let payload = vec![0u8; vis_proto::MAX_CLIENT_PAYLOAD + 1];
    let mut raw = vec![0x82u8, 0x80 | 127];
    raw.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    raw.extend_from_slice(&mask);
    for (i, &b) in payload.iter().enumerate() {
        raw.push(b ^ mask[i % 4]);
    }
    client.write_all(&raw).unwrap();

    let dropped = poll_until(
        &mut server,
        |s| if s.has_client() { None } else { Some(()) },
        Duration::from_secs(2),
    );
    assert!(dropped.is_some(), "server should have dropped the subscriber");
}

#[test]
fn second_connection_is_rejected_while_one_subscriber_is_active() {
    let mut server = WsServer::new();
    server.start(17805).unwrap();

    let mut first = connect_and_handshake(17805);
    poll_until(
        &mut server,
        |s| if s.has_client() { Some(()) } else { None },
        Duration::from_secs(2),
    )
    .expect("handshake never completed");
    let _ = read_available(&mut first, Duration::from_millis(200));

    let mut second = connect_and_handshake(17805);
    server.poll();
    server.poll();

    let resp = read_available(&mut second, Duration::from_millis(300));
    assert!(
        resp.is_empty(),
        "second connection should never receive a handshake response"
    );
    assert!(server.has_client());
}
