use std::fmt;

use crate::flow::Request;

/// Classification of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Let the request continue upstream.
    Allow,
    /// Reject: the request was not made over HTTPS.
    DenyScheme,
    /// Reject: an HTTPS request tried to upgrade the connection.
    DenyUpgrade,
}

impl Verdict {
    pub const ALL: [Verdict; 3] = [Verdict::Allow, Verdict::DenyScheme, Verdict::DenyUpgrade];

    /// Inverse of [`Verdict::as_str`].
    pub fn from_label(label: &str) -> Option<Verdict> {
        Self::ALL.into_iter().find(|v| v.as_str() == label)
    }

    /// Stable lowercase label used in logs and the decision database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::DenyScheme => "deny-scheme",
            Verdict::DenyUpgrade => "deny-upgrade",
        }
    }

    pub fn is_denied(&self) -> bool {
        !matches!(self, Verdict::Allow)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluate a request against the workspace traffic policy.
///
/// The scheme check runs first and short-circuits, so a plain-HTTP websocket
/// upgrade is reported as [`Verdict::DenyScheme`]. Only HTTPS requests are
/// inspected for upgrade signals.
pub fn evaluate(req: &Request) -> Verdict {
    if !req.scheme.eq_ignore_ascii_case("https") {
        return Verdict::DenyScheme;
    }

    if is_upgrade_attempt(req) {
        return Verdict::DenyUpgrade;
    }

    Verdict::Allow
}

/// Either signal alone is enough: `Upgrade` mentioning websocket, or
/// `Connection` mentioning upgrade.
fn is_upgrade_attempt(req: &Request) -> bool {
    let upgrade = req.headers.get_or_empty("upgrade").to_lowercase();
    let connection = req.headers.get_or_empty("connection").to_lowercase();
    upgrade.contains("websocket") || connection.contains("upgrade")
}
