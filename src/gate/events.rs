//! Structured gate events and the observer seam.
//!
//! The gate reports what it sees and decides through a [`GateObserver`].
//! Observers are fire-and-forget: they cannot influence a verdict, and a
//! failing observer must swallow its own error.

use tracing::{info, warn};

/// Events emitted by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// A request's line and headers reached the gate.
    RequestReceived {
        method: String,
        url: String,
        headers: Vec<(String, String)>,
    },
    /// A request passed the policy and will be forwarded.
    RequestAllowed {
        method: String,
        url: String,
        scheme: String,
    },
    /// A request was rejected for not using HTTPS.
    SchemeBlocked {
        method: String,
        url: String,
        scheme: String,
    },
    /// An HTTPS request was rejected for attempting a protocol upgrade.
    UpgradeBlocked {
        method: String,
        url: String,
        scheme: String,
    },
    /// A websocket handshake was started and the session was terminated.
    WebSocketKilled { url: String },
}

impl GateEvent {
    /// Short machine-readable event name.
    pub fn kind(&self) -> &'static str {
        match self {
            GateEvent::RequestReceived { .. } => "request-received",
            GateEvent::RequestAllowed { .. } => "request-allowed",
            GateEvent::SchemeBlocked { .. } => "scheme-blocked",
            GateEvent::UpgradeBlocked { .. } => "upgrade-blocked",
            GateEvent::WebSocketKilled { .. } => "websocket-killed",
        }
    }
}

/// Receiver of gate events such as the log or the decision database.
///
/// Implementations must be `Send + Sync`: the gate is shared across
/// connection tasks.
pub trait GateObserver: Send + Sync {
    fn observe(&self, event: &GateEvent);

    /// Observer name for diagnostics.
    fn name(&self) -> &str;
}

/// Renders gate events as `tracing` log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl GateObserver for TracingObserver {
    fn observe(&self, event: &GateEvent) {
        match event {
            GateEvent::RequestReceived {
                method,
                url,
                headers,
            } => {
                info!(
                    "Proxy handling request: {} {} headers={}",
                    method,
                    url,
                    format_headers(headers)
                );
            }
            GateEvent::RequestAllowed { method, url, .. } => {
                info!("ALLOWED {} {}", method, url);
            }
            GateEvent::SchemeBlocked {
                method,
                url,
                scheme,
            } => {
                warn!("BLOCKED {} {} - non-HTTPS scheme {:?}", method, url, scheme);
            }
            GateEvent::UpgradeBlocked { method, url, .. } => {
                warn!("Blocking websocket upgrade attempt: {} {}", method, url);
            }
            GateEvent::WebSocketKilled { url } => {
                warn!("Killing websocket connection to {}", url);
            }
        }
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// Format headers as `{'Name': 'value', ...}` in arrival order.
pub fn format_headers(headers: &[(String, String)]) -> String {
    let pairs: Vec<String> = headers
        .iter()
        .map(|(n, v)| format!("'{}': '{}'", n, v))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}
