use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::ProxyConfig;
use crate::flow::{Flow, Request, Response};
use crate::gate::Gate;

use super::http::{self, RequestHead};
use super::upstream::{self, ClientSession};

/// Everything a connection task needs, shared across tasks.
pub struct ConnContext {
    pub gate: Gate,
    pub config: ProxyConfig,
    pub client: reqwest::Client,
}

enum HeadRead {
    Closed,
    TooLarge,
    Head { head: Vec<u8>, rest: Vec<u8> },
}

/// Main accept loop: accept incoming connections and handle each on its own task.
pub async fn accept_loop(listener: TcpListener, ctx: Arc<ConnContext>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                debug!("New connection from {}", peer_addr);
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &ctx).await {
                        error!("Error handling connection from {}: {}", peer_addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Read until the end of the request head. Bytes already received past the
/// head are returned as `rest`.
async fn read_head(stream: &mut TcpStream, max: usize) -> std::io::Result<HeadRead> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(HeadRead::Closed);
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = http::find_head_end(&buf) {
            let rest = buf.split_off(end + 4);
            buf.truncate(end);
            return Ok(HeadRead::Head { head: buf, rest });
        }
        if buf.len() > max {
            return Ok(HeadRead::TooLarge);
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(mut client: TcpStream, ctx: &ConnContext) -> anyhow::Result<()> {
    let (head, rest) = match read_head(&mut client, ctx.config.max_header_bytes).await? {
        HeadRead::Closed => return Ok(()),
        HeadRead::TooLarge => {
            warn!("Request head exceeds {} bytes", ctx.config.max_header_bytes);
            client
                .write_all(&http::error_response(431, "Request header fields too large"))
                .await?;
            return Ok(());
        }
        HeadRead::Head { head, rest } => (head, rest),
    };

    let head = match http::parse_head(&head) {
        Ok(head) => head,
        Err(e) => {
            warn!("{}", e);
            client
                .write_all(&http::error_response(400, "Bad request"))
                .await?;
            return Ok(());
        }
    };

    if head.method.eq_ignore_ascii_case("CONNECT") {
        handle_connect(client, &head.target, rest, ctx).await
    } else {
        handle_request(client, head, rest, ctx).await
    }
}

/// Handle CONNECT by splicing an opaque tunnel. The bytes inside are not
/// inspected.
async fn handle_connect(
    mut client: TcpStream,
    authority: &str,
    rest: Vec<u8>,
    ctx: &ConnContext,
) -> anyhow::Result<()> {
    if !ctx.config.allow_connect {
        warn!("BLOCKED CONNECT to {} - tunnels disabled", authority);
        client
            .write_all(&http::error_response(403, "CONNECT tunnels are disabled"))
            .await?;
        return Ok(());
    }

    let Some((host, port)) = http::parse_authority(authority) else {
        client
            .write_all(&http::error_response(400, "Bad CONNECT target"))
            .await?;
        return Ok(());
    };

    info!("CONNECT tunnel to {}:{}", host, port);
    let mut remote = match TcpStream::connect((host.as_str(), port)).await {
        Ok(remote) => remote,
        Err(e) => {
            warn!("Failed to connect to {}:{}: {}", host, port, e);
            client
                .write_all(&http::error_response(502, "Bad gateway"))
                .await?;
            return Ok(());
        }
    };

    client
        .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
        .await?;
    if !rest.is_empty() {
        remote.write_all(&rest).await?;
    }

    match tokio::io::copy_bidirectional(&mut client, &mut remote).await {
        Ok((up, down)) => debug!("Tunnel to {}:{} closed ({} up, {} down)", host, port, up, down),
        Err(e) => debug!("Tunnel to {}:{} ended: {}", host, port, e),
    }
    Ok(())
}

/// Run a non-CONNECT request through the gate and either answer it with the
/// attached denial or forward it upstream.
async fn handle_request(
    mut client: TcpStream,
    head: RequestHead,
    rest: Vec<u8>,
    ctx: &ConnContext,
) -> anyhow::Result<()> {
    let scheme = http::scheme_of(&head.target);
    let mut request = Request::new(&head.method, &head.target, &scheme);
    request.headers = head.headers.clone();
    let mut flow = Flow::new(request);

    ctx.gate.on_request(&mut flow);
    if let Some(response) = &flow.response {
        client.write_all(&http::serialize_response(response)).await?;
        return Ok(());
    }

    if head.is_chunked() {
        client
            .write_all(&http::error_response(411, "Length required"))
            .await?;
        return Ok(());
    }
    let length = match head.content_length() {
        Ok(length) => length.unwrap_or(0),
        Err(e) => {
            warn!("{}", e);
            client
                .write_all(&http::error_response(400, "Bad request"))
                .await?;
            return Ok(());
        }
    };
    if length > ctx.config.max_body_bytes {
        warn!(
            "Body of {} bytes for {} exceeds {}",
            length, flow.request.url, ctx.config.max_body_bytes
        );
        client
            .write_all(&http::error_response(413, "Payload too large"))
            .await?;
        return Ok(());
    }
    flow.request.body = read_body(&mut client, rest, length).await?;

    let response = match upstream::forward(&ctx.client, &flow.request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Upstream {} failed: {}", flow.request.url, e);
            client
                .write_all(&http::error_response(502, "Bad gateway"))
                .await?;
            return Ok(());
        }
    };

    match upstream_reply(&ctx.gate, &flow.request.url, &response) {
        ClientReply::Send(bytes) => client.write_all(&bytes).await?,
        ClientReply::Close => client.shutdown().await?,
    }
    Ok(())
}

/// What the client gets once an upstream response is in hand.
#[derive(Debug, PartialEq, Eq)]
enum ClientReply {
    Send(Vec<u8>),
    Close,
}

/// A `101 Switching Protocols` reply opens a websocket session, which is
/// handed to the gate and closed without relaying anything. Every other
/// response is framed for the client.
fn upstream_reply(gate: &Gate, url: &str, response: &Response) -> ClientReply {
    if response.status != 101 {
        return ClientReply::Send(http::serialize_response(response));
    }
    let mut session = ClientSession::new(url);
    gate.on_websocket_start(&mut session);
    if session.is_terminated() {
        ClientReply::Close
    } else {
        ClientReply::Send(http::error_response(502, "Websocket sessions are not relayed"))
    }
}

/// Read exactly `length` body bytes, starting with those already buffered.
/// The caller bounds `length`.
async fn read_body(client: &mut TcpStream, mut rest: Vec<u8>, length: usize) -> std::io::Result<Vec<u8>> {
    if rest.len() >= length {
        rest.truncate(length);
        return Ok(rest);
    }
    let remaining = (length - rest.len()) as u64;
    (&mut *client).take(remaining).read_to_end(&mut rest).await?;
    if rest.len() < length {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("body ended after {} of {} bytes", rest.len(), length),
        ));
    }
    Ok(rest)
}
