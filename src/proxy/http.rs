//! HTTP/1.x request-head parsing and response framing for the host proxy.

use reqwest::StatusCode;

use crate::error::{GateError, Result};
use crate::flow::{Headers, Response};

/// Headers that describe a single hop and are never relayed.
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "proxy-authorization",
    "proxy-authenticate",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// A parsed request line plus headers.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: Headers,
}

impl RequestHead {
    /// Declared body length. `Ok(None)` when absent, an error when unparsable.
    pub fn content_length(&self) -> Result<Option<usize>> {
        match self.headers.get("content-length") {
            None => Ok(None),
            Some(v) => v
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| GateError::Proxy(format!("invalid Content-Length: {}", v))),
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.headers
            .get_or_empty("transfer-encoding")
            .to_lowercase()
            .contains("chunked")
    }
}

/// Offset of the `\r\n\r\n` that ends a request head.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse a request head (everything before the blank line).
///
/// Header lines without a colon are skipped rather than rejected.
pub fn parse_head(raw: &[u8]) -> Result<RequestHead> {
    let text = String::from_utf8_lossy(raw);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().unwrap_or("");

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(GateError::Proxy(format!(
            "invalid request line: {:?}",
            request_line
        )));
    }

    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.append(name.trim(), value.trim());
        }
    }

    Ok(RequestHead {
        method: parts[0].to_string(),
        target: parts[1].to_string(),
        version: parts.get(2).unwrap_or(&"HTTP/1.1").to_string(),
        headers,
    })
}

/// Scheme of an absolute-form request target, lowercased. Origin-form
/// targets (`/path`) have no scheme and yield an empty string.
pub fn scheme_of(target: &str) -> String {
    if target.starts_with('/') {
        return String::new();
    }
    reqwest::Url::parse(target)
        .map(|url| url.scheme().to_string())
        .unwrap_or_default()
}

/// Split a CONNECT authority into host and port (default 443).
pub fn parse_authority(authority: &str) -> Option<(String, u16)> {
    if authority.is_empty() {
        return None;
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port.parse().ok()?;
            Some((host.trim_matches(['[', ']']).to_string(), port))
        }
        Some(_) => None,
        None => Some((authority.to_string(), 443)),
    }
}

pub fn status_line(status: u16) -> String {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("");
    format!("HTTP/1.1 {} {}\r\n", status, reason)
}

/// Serialize a response for the client, re-framed with `Content-Length`
/// and `Connection: close`.
pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut head = status_line(resp.status);
    for (name, value) in resp.headers.iter() {
        if is_hop_by_hop(name) || name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str(&format!("Content-Length: {}\r\n", resp.body.len()));
    head.push_str("Connection: close\r\n\r\n");

    let mut out = head.into_bytes();
    out.extend_from_slice(&resp.body);
    out
}

/// A plain-text error response generated by the host itself.
pub fn error_response(status: u16, message: &str) -> Vec<u8> {
    serialize_response(&Response::make(
        status,
        message.as_bytes(),
        [("Content-Type", "text/plain")],
    ))
}
