use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use workspace_proxy::config::ProxyConfig;
use workspace_proxy::proxy::ProxyServer;

const SCHEME_BODY: &str = "Only HTTPS requests are permitted through the Codex workspace proxy.";
const UPGRADE_BODY: &str = "WebSocket (wss) traffic is blocked in the Codex workspace proxy.";

async fn start_proxy(config: ProxyConfig) -> SocketAddr {
    ProxyServer::new(config).start().await.unwrap()
}

async fn start_default_proxy() -> SocketAddr {
    start_proxy(ProxyConfig::new("127.0.0.1:0")).await
}

/// Helper: connect to the proxy, send a raw request and read until close.
async fn send_raw_request(proxy_addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(proxy_addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8_lossy(&buf).to_string()
}

/// Helper: a listener that echoes everything it receives on one connection.
async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let (mut read, mut write) = stream.split();
            let _ = tokio::io::copy(&mut read, &mut write).await;
        }
    });
    addr
}

fn assert_forbidden(response: &str, body: &str) {
    assert!(
        response.starts_with("HTTP/1.1 403 Forbidden\r\n"),
        "Expected 403 Forbidden, got: {}",
        response
    );
    assert!(
        response.contains("Content-Type: text/plain\r\n"),
        "Expected text/plain, got: {}",
        response
    );
    assert!(
        response.contains(&format!("Content-Length: {}\r\n", body.len())),
        "Expected exact Content-Length, got: {}",
        response
    );
    assert!(
        response.ends_with(&format!("\r\n\r\n{}", body)),
        "Expected exact denial body, got: {}",
        response
    );
}

#[tokio::test]
async fn plain_http_request_is_denied() {
    let addr = start_default_proxy().await;
    let request = "GET http://example.com/ HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let response = send_raw_request(addr, request).await;
    assert_forbidden(&response, SCHEME_BODY);
}

#[tokio::test]
async fn origin_form_request_is_denied_for_scheme() {
    let addr = start_default_proxy().await;
    let request = "GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let response = send_raw_request(addr, request).await;
    assert_forbidden(&response, SCHEME_BODY);
}

#[tokio::test]
async fn plain_http_websocket_upgrade_reports_scheme() {
    let addr = start_default_proxy().await;
    let request = "GET http://example.com/socket HTTP/1.1\r\nHost: example.com\r\n\
                   Upgrade: websocket\r\nConnection: Upgrade\r\n\r\n";
    let response = send_raw_request(addr, request).await;
    assert_forbidden(&response, SCHEME_BODY);
}

#[tokio::test]
async fn https_websocket_upgrade_is_denied() {
    let addr = start_default_proxy().await;
    let request = "GET https://example.com/socket HTTP/1.1\r\nHost: example.com\r\n\
                   Upgrade: WebSocket\r\nConnection: Upgrade\r\n\r\n";
    let response = send_raw_request(addr, request).await;
    assert_forbidden(&response, UPGRADE_BODY);
}

#[tokio::test]
async fn https_connection_upgrade_alone_is_denied() {
    let addr = start_default_proxy().await;
    let request = "GET https://example.com/ HTTP/1.1\r\nHost: example.com\r\n\
                   Connection: keep-alive, Upgrade\r\n\r\n";
    let response = send_raw_request(addr, request).await;
    assert_forbidden(&response, UPGRADE_BODY);
}

#[tokio::test]
async fn allowed_request_to_unreachable_upstream_is_bad_gateway() {
    let addr = start_default_proxy().await;
    let request = "GET https://127.0.0.1:1/ HTTP/1.1\r\nHost: 127.0.0.1:1\r\n\r\n";
    let response = send_raw_request(addr, request).await;
    assert!(
        response.starts_with("HTTP/1.1 502 Bad Gateway\r\n"),
        "Expected 502, got: {}",
        response
    );
}

#[tokio::test]
async fn chunked_upload_requires_length() {
    let addr = start_default_proxy().await;
    let request = "POST https://127.0.0.1:1/ HTTP/1.1\r\nHost: 127.0.0.1:1\r\n\
                   Transfer-Encoding: chunked\r\n\r\n0\r\n\r\n";
    let response = send_raw_request(addr, request).await;
    assert!(
        response.starts_with("HTTP/1.1 411 Length Required\r\n"),
        "Expected 411, got: {}",
        response
    );
}

#[tokio::test]
async fn malformed_request_line_is_bad_request() {
    let addr = start_default_proxy().await;
    let response = send_raw_request(addr, "NONSENSE\r\n\r\n").await;
    assert!(
        response.starts_with("HTTP/1.1 400 Bad Request\r\n"),
        "Expected 400, got: {}",
        response
    );
}

#[tokio::test]
async fn oversized_head_is_rejected() {
    let mut config = ProxyConfig::new("127.0.0.1:0");
    config.max_header_bytes = 128;
    let addr = start_proxy(config).await;

    let request = format!(
        "GET https://example.com/ HTTP/1.1\r\nX-Filler: {}\r\n\r\n",
        "a".repeat(512)
    );
    let response = send_raw_request(addr, &request).await;
    assert!(
        response.starts_with("HTTP/1.1 431 "),
        "Expected 431, got: {}",
        response
    );
}

async fn start_tunneling_proxy() -> SocketAddr {
    let mut config = ProxyConfig::new("127.0.0.1:0");
    config.allow_connect = true;
    start_proxy(config).await
}

#[tokio::test]
async fn huge_content_length_is_rejected_and_proxy_keeps_serving() {
    let addr = start_default_proxy().await;
    let request = "POST https://127.0.0.1:1/ HTTP/1.1\r\nHost: 127.0.0.1:1\r\n\
                   Content-Length: 1000000000000\r\n\r\nabc";
    let response = send_raw_request(addr, request).await;
    assert!(
        response.starts_with("HTTP/1.1 413 "),
        "Expected 413, got: {}",
        response
    );

    let next = "GET http://example.com/ HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let response = send_raw_request(addr, next).await;
    assert_forbidden(&response, SCHEME_BODY);
}

#[tokio::test]
async fn body_limit_is_configurable() {
    let mut config = ProxyConfig::new("127.0.0.1:0");
    config.max_body_bytes = 4;
    let addr = start_proxy(config).await;

    let over = "POST https://127.0.0.1:1/ HTTP/1.1\r\nHost: 127.0.0.1:1\r\n\
                Content-Length: 5\r\n\r\nhello";
    let response = send_raw_request(addr, over).await;
    assert!(
        response.starts_with("HTTP/1.1 413 "),
        "Expected 413, got: {}",
        response
    );

    let within = "POST https://127.0.0.1:1/ HTTP/1.1\r\nHost: 127.0.0.1:1\r\n\
                  Content-Length: 4\r\n\r\nhell";
    let response = send_raw_request(addr, within).await;
    assert!(
        response.starts_with("HTTP/1.1 502 "),
        "Expected 502, got: {}",
        response
    );
}

#[tokio::test]
async fn connect_is_refused_by_default() {
    let addr = start_default_proxy().await;
    let request = "CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n";
    let response = send_raw_request(addr, request).await;
    assert!(
        response.starts_with("HTTP/1.1 403 Forbidden\r\n"),
        "Expected 403, got: {}",
        response
    );
}

#[tokio::test]
async fn connect_tunnel_relays_bytes() {
    let echo_addr = start_echo_server().await;
    let addr = start_tunneling_proxy().await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let connect_req = format!(
        "CONNECT {} HTTP/1.1\r\nHost: {}\r\n\r\n",
        echo_addr, echo_addr
    );
    stream.write_all(connect_req.as_bytes()).await.unwrap();

    let established = b"HTTP/1.1 200 Connection Established\r\n\r\n";
    let mut buf = vec![0u8; established.len()];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf, established);

    stream.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"ping");
}

#[tokio::test]
async fn connect_to_closed_port_is_bad_gateway() {
    let addr = start_tunneling_proxy().await;
    let request = "CONNECT 127.0.0.1:1 HTTP/1.1\r\nHost: 127.0.0.1:1\r\n\r\n";
    let response = send_raw_request(addr, request).await;
    assert!(
        response.starts_with("HTTP/1.1 502 "),
        "Expected 502, got: {}",
        response
    );
}
