//! HTTP → WebSocket upgrade handshake (RFC 6455 §1.3).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha1::{Digest, Sha1};

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Compute `Sec-WebSocket-Accept` from a client's `Sec-WebSocket-Key`.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Find the `Sec-WebSocket-Key` header value in a raw HTTP request.
///
/// Returns `None` if the request doesn't look like a WebSocket upgrade
/// (missing `Upgrade: websocket` or the key header).
pub fn extract_key(request: &str) -> Option<&str> {
    let mut has_upgrade = false;
    let mut key = None;

    for line in request.split("\r\n") {
        let lower = line.to_ascii_lowercase();
        if lower.starts_with("upgrade:") && lower.contains("websocket") {
            has_upgrade = true;
        }
        if let Some(rest) = line
            .split_once(':')
            .filter(|(name, _)| name.trim().eq_ignore_ascii_case("sec-websocket-key"))
        {
            key = Some(rest.1.trim());
        }
    }

    if has_upgrade {
        key
    } else {
        None
    }
}

/// Build the `101 Switching Protocols` response for a given client key.
pub fn build_response(client_key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        accept_key(client_key)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_rfc6455_example() {
        // RFC 6455 §1.3 worked example.
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn extract_key_finds_header_case_insensitively() {
        let req = "GET / HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
                   Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n";
        assert_eq!(extract_key(req), Some("dGhlIHNhbXBsZSBub25jZQ=="));
    }

    #[test]
    fn extract_key_rejects_request_without_upgrade_header() {
        let req = "GET / HTTP/1.1\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n";
        assert_eq!(extract_key(req), None);
    }

    #[test]
    fn build_response_contains_switching_protocols() {
        let resp = build_response("dGhlIHNhbXBsZSBub25jZQ==");
        assert!(resp.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(resp.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
    }
}
