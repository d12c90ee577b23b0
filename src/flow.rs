//! Flow data shared between the host proxy and the policy gate.
//!
//! A [`Flow`] is one intercepted client-request/server-response exchange. The
//! host owns it for its whole lifetime; the gate only inspects the
//! [`Request`] and may attach a synthesized [`Response`].

/// Ordered header collection with case-insensitive lookup by name.
///
/// Insertion order and duplicate names are preserved so the host can relay
/// headers verbatim. Lookups return the first matching entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any existing entries with the same name.
    pub fn append(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// Replace every entry named `name` with a single entry.
    pub fn set(&mut self, name: &str, value: &str) {
        self.remove(name);
        self.append(name, value);
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// First value for `name`, compared ASCII-case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Like [`Headers::get`] but a missing header reads as `""`.
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

/// An intercepted client request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    /// Target URL as sent by the client (absolute-form for proxied requests).
    pub url: String,
    /// URL scheme as seen by the host; empty when the target had none.
    pub scheme: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: &str, url: &str, scheme: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            scheme: scheme.to_string(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// A response the gate attaches to a flow instead of forwarding upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: Headers,
}

impl Response {
    /// Build a response with the given status, body and headers.
    pub fn make<'a>(
        status: u16,
        body: &[u8],
        headers: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self {
            status,
            body: body.to_vec(),
            headers: headers.into_iter().collect(),
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// One client-request/server-response exchange.
#[derive(Debug, Clone)]
pub struct Flow {
    pub request: Request,
    /// When set, the host must not forward the request and instead returns
    /// this response to the client verbatim.
    pub response: Option<Response>,
}

impl Flow {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: None,
        }
    }

    pub fn is_intercepted(&self) -> bool {
        self.response.is_some()
    }
}
