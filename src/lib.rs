//! # Workspace Proxy
//!
//! **HTTPS-only traffic gate for an intercepting workspace proxy.**
//!
//! Every intercepted request is classified and either allowed to continue or
//! answered with a synthesized `403 Forbidden`. Websocket handshakes are
//! always terminated.
//!
//! ## Architecture
//!
//! - **[`policy`]** — the verdict logic: [`policy::evaluate`] and [`policy::enforce`]
//! - **[`gate`]** — the two hooks a host calls, plus the observer seam for structured events
//! - **[`flow`]** — request, response and flow types shared with the host
//! - **[`proxy`]** — a minimal TCP host proxy driving the gate
//! - **[`logging`]** — SQLite decision log with JSON/CSV export
//! - **[`config`]** — TOML configuration
//! - **[`cli`]** — command-line interface (clap)
//! - **[`error`]** — unified error types using `thiserror`
//!
//! ## Quick Start
//!
//! ```bash
//! workspace-proxy init
//! workspace-proxy start
//! printf 'GET https://example.com/ HTTP/1.1\r\nHost: example.com\r\n\r\n' | nc 127.0.0.1 8080
//! ```
//!
//! CONNECT tunnels are refused unless `allow_connect` is set. A tunnel is
//! opaque, so nothing inside it is gated.

pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod gate;
pub mod logging;
pub mod policy;
pub mod proxy;

pub use flow::{Flow, Headers, Request, Response};
pub use gate::{Gate, GateEvent, GateObserver, WebSocketSession};
pub use policy::Verdict;
