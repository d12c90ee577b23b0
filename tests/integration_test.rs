use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use workspace_proxy::config::AppConfig;
use workspace_proxy::gate::{Gate, TracingObserver};
use workspace_proxy::logging::{self, DecisionLogObserver};
use workspace_proxy::proxy::ProxyServer;

async fn send_raw_request(proxy_addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(proxy_addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8_lossy(&buf).to_string()
}

// ===== Template tests =====

#[test]
fn default_template_is_valid_toml() {
    let content = include_str!("../templates/default.toml");
    let config: AppConfig = toml::from_str(content).unwrap();
    assert_eq!(config.proxy.listen, "127.0.0.1:8080");
    assert!(!config.proxy.allow_connect);
    assert_eq!(config.proxy.max_body_bytes, 10 * 1024 * 1024);
    assert_eq!(config.logging().level, "info");
    assert!(config.logging().database.is_none());
}

#[test]
fn template_written_to_disk_loads() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("workspace-proxy.toml");
    std::fs::write(&config_path, include_str!("../templates/default.toml")).unwrap();

    let config = AppConfig::load_from_path(&config_path).unwrap();
    assert_eq!(config.proxy.upstream_timeout_secs, 30);
}

#[test]
fn invalid_toml_returns_error() {
    assert!(AppConfig::from_toml("this is not valid toml [[[").is_err());
}

// ===== End-to-end: proxy + gate + decision log =====

#[tokio::test]
async fn e2e_denials_are_recorded_in_decision_log() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("decisions.db");
    let pool = logging::open_pool(&db_path).unwrap();

    let gate = Gate::new()
        .with_observer(Arc::new(TracingObserver))
        .with_observer(Arc::new(DecisionLogObserver::new(pool.clone())));
    let config = AppConfig::from_toml("[proxy]\nlisten = \"127.0.0.1:0\"\n").unwrap();
    let addr = ProxyServer::new(config.proxy)
        .with_gate(gate)
        .start()
        .await
        .unwrap();

    // 1. Plain HTTP - denied for scheme
    let response = send_raw_request(
        addr,
        "GET http://example.com/ HTTP/1.1\r\nHost: example.com\r\n\r\n",
    )
    .await;
    assert!(response.contains("403"));

    // 2. HTTPS websocket upgrade - denied for upgrade
    let response = send_raw_request(
        addr,
        "GET https://example.com/ws HTTP/1.1\r\nHost: example.com\r\nUpgrade: websocket\r\n\r\n",
    )
    .await;
    assert!(response.contains("403"));

    // 3. Allowed HTTPS request - upstream unreachable, but the decision is logged
    let response = send_raw_request(
        addr,
        "GET https://127.0.0.1:1/ HTTP/1.1\r\nHost: 127.0.0.1:1\r\n\r\n",
    )
    .await;
    assert!(response.contains("502"));

    let conn = pool.get().unwrap();
    let stats = logging::query_stats(&conn).unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.denied_scheme, 1);
    assert_eq!(stats.denied_upgrade, 1);
    assert_eq!(stats.allowed, 1);

    let recent = logging::query_recent(&conn, 1).unwrap();
    assert_eq!(recent[0].url, "https://127.0.0.1:1/");
    assert_eq!(recent[0].verdict, "allow");
}

#[tokio::test]
async fn e2e_connect_is_refused_by_default() {
    let pool = logging::open_memory_pool().unwrap();
    let gate = Gate::new().with_observer(Arc::new(DecisionLogObserver::new(pool.clone())));
    let config = AppConfig::from_toml("[proxy]\nlisten = \"127.0.0.1:0\"\n").unwrap();
    let addr = ProxyServer::new(config.proxy)
        .with_gate(gate)
        .start()
        .await
        .unwrap();

    let response = send_raw_request(
        addr,
        "CONNECT 127.0.0.1:1 HTTP/1.1\r\nHost: 127.0.0.1:1\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 403 Forbidden\r\n"));

    let conn = pool.get().unwrap();
    assert!(logging::query_recent(&conn, 10).unwrap().is_empty());
}

#[tokio::test]
async fn e2e_opted_in_tunnels_are_not_gated() {
    let pool = logging::open_memory_pool().unwrap();
    let gate = Gate::new().with_observer(Arc::new(DecisionLogObserver::new(pool.clone())));
    let config = AppConfig::from_toml(
        "[proxy]\nlisten = \"127.0.0.1:0\"\nallow_connect = true\n",
    )
    .unwrap();
    let addr = ProxyServer::new(config.proxy)
        .with_gate(gate)
        .start()
        .await
        .unwrap();

    let response = send_raw_request(
        addr,
        "CONNECT 127.0.0.1:1 HTTP/1.1\r\nHost: 127.0.0.1:1\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 502 "));

    let conn = pool.get().unwrap();
    assert!(logging::query_recent(&conn, 10).unwrap().is_empty());
}
