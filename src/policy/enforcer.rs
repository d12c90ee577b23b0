use crate::flow::{Flow, Response};

use super::evaluator::Verdict;

/// Status code of every denial response.
pub const DENY_STATUS: u16 = 403;

pub const DENY_SCHEME_BODY: &[u8] =
    b"Only HTTPS requests are permitted through the Codex workspace proxy.";

pub const DENY_UPGRADE_BODY: &[u8] =
    b"WebSocket (wss) traffic is blocked in the Codex workspace proxy.";

/// The response a denied flow receives, or `None` for [`Verdict::Allow`].
pub fn denial_response(verdict: Verdict) -> Option<Response> {
    let body = match verdict {
        Verdict::Allow => return None,
        Verdict::DenyScheme => DENY_SCHEME_BODY,
        Verdict::DenyUpgrade => DENY_UPGRADE_BODY,
    };
    Some(Response::make(
        DENY_STATUS,
        body,
        [("Content-Type", "text/plain")],
    ))
}

/// Apply a verdict to a flow.
///
/// Allowed flows are left untouched. Denied flows get a 403 attached, unless
/// a response is already present: a flow carries at most one response from
/// the gate.
pub fn enforce(flow: &mut Flow, verdict: Verdict) {
    if flow.response.is_some() {
        return;
    }
    flow.response = denial_response(verdict);
}
