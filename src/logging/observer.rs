use tracing::warn;

use crate::gate::{GateEvent, GateObserver};
use crate::policy::Verdict;

use super::{log_decision, DbPool, DecisionLog, WS_KILLED};

/// Writes one row per decision and per killed websocket.
///
/// `RequestReceived` carries no decision and is not stored. Database errors
/// are logged and dropped.
pub struct DecisionLogObserver {
    pool: DbPool,
}

impl DecisionLogObserver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn record(&self, entry: DecisionLog) {
        let conn = match self.pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Decision log unavailable: {}", e);
                return;
            }
        };
        if let Err(e) = log_decision(&conn, &entry) {
            warn!("Failed to log decision for {}: {}", entry.url, e);
        }
    }
}

fn entry(method: &str, url: &str, scheme: &str, verdict: &str, reason: String) -> DecisionLog {
    DecisionLog {
        id: None,
        timestamp: chrono::Utc::now().to_rfc3339(),
        method: method.to_string(),
        url: url.to_string(),
        scheme: scheme.to_string(),
        verdict: verdict.to_string(),
        reason,
    }
}

impl GateObserver for DecisionLogObserver {
    fn observe(&self, event: &GateEvent) {
        let row = match event {
            GateEvent::RequestReceived { .. } => return,
            GateEvent::RequestAllowed {
                method,
                url,
                scheme,
            } => entry(
                method,
                url,
                scheme,
                Verdict::Allow.as_str(),
                "HTTPS request without upgrade signals".to_string(),
            ),
            GateEvent::SchemeBlocked {
                method,
                url,
                scheme,
            } => entry(
                method,
                url,
                scheme,
                Verdict::DenyScheme.as_str(),
                format!("scheme {:?} is not https", scheme),
            ),
            GateEvent::UpgradeBlocked {
                method,
                url,
                scheme,
            } => entry(
                method,
                url,
                scheme,
                Verdict::DenyUpgrade.as_str(),
                "websocket upgrade attempt".to_string(),
            ),
            GateEvent::WebSocketKilled { url } => entry(
                "",
                url,
                "",
                WS_KILLED,
                "websocket handshake terminated".to_string(),
            ),
        };
        self.record(row);
    }

    fn name(&self) -> &str {
        "decision-log"
    }
}
