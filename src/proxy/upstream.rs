//! Forwarding of allowed requests to their upstream server.

use reqwest::header::{HeaderName, HeaderValue};
use tracing::debug;

use crate::config::ProxyConfig;
use crate::error::{GateError, Result};
use crate::flow::{Headers, Request, Response};
use crate::gate::WebSocketSession;

use super::http::is_hop_by_hop;

/// Build the shared upstream client. Redirects are passed back to the
/// client instead of being followed.
pub fn build_client(config: &ProxyConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(config.upstream_timeout())
        .build()?;
    Ok(client)
}

/// Send `req` upstream and collect the reply.
///
/// A `101 Switching Protocols` reply is returned without reading a body so
/// the caller can treat it as a websocket handshake.
pub async fn forward(client: &reqwest::Client, req: &Request) -> Result<Response> {
    let method = reqwest::Method::from_bytes(req.method.as_bytes())
        .map_err(|_| GateError::Proxy(format!("invalid method: {}", req.method)))?;

    let mut builder = client.request(method, req.url.as_str());
    for (name, value) in req.headers.iter() {
        if is_hop_by_hop(name)
            || name.eq_ignore_ascii_case("host")
            || name.eq_ignore_ascii_case("content-length")
        {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => builder = builder.header(n, v),
            _ => debug!("Dropping unforwardable header {:?}", name),
        }
    }
    if !req.body.is_empty() {
        builder = builder.body(req.body.clone());
    }

    let upstream = builder.send().await?;
    let status = upstream.status().as_u16();
    let headers: Headers = upstream
        .headers()
        .iter()
        .map(|(n, v)| {
            (
                n.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).to_string(),
            )
        })
        .collect();

    let body = if status == 101 {
        Vec::new()
    } else {
        upstream.bytes().await?.to_vec()
    };

    Ok(Response {
        status,
        body,
        headers,
    })
}

/// The client side of a websocket handshake observed by the host.
///
/// Terminating only marks the session; the connection handler closes the
/// client socket once the gate returns.
#[derive(Debug)]
pub struct ClientSession {
    url: String,
    terminated: bool,
}

impl ClientSession {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            terminated: false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl WebSocketSession for ClientSession {
    fn url(&self) -> &str {
        &self.url
    }

    fn terminate(&mut self) {
        self.terminated = true;
    }
}
