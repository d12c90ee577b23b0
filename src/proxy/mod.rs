//! Minimal host proxy that drives the [`Gate`].
//!
//! Plain requests are parsed, handed to [`Gate::on_request`] and either
//! answered with the attached denial or forwarded upstream. CONNECT is refused
//! unless `allow_connect` is set, in which case it becomes an opaque tunnel
//! the gate never sees. An upstream `101 Switching Protocols` reply is
//! reported through [`Gate::on_websocket_start`].

pub mod connect;
pub mod http;
pub mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::gate::{Gate, TracingObserver};

use self::connect::ConnContext;

pub struct ProxyServer {
    config: ProxyConfig,
    gate: Gate,
}

impl ProxyServer {
    /// A server whose gate only reports through `tracing`.
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            gate: Gate::new().with_observer(Arc::new(TracingObserver)),
        }
    }

    /// Replace the gate (e.g. to add a decision-log observer).
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    /// Bind, spawn the accept loop and return the actual bound address.
    pub async fn start(&self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.config.listen).await?;
        let local_addr = listener.local_addr()?;
        info!("Workspace proxy listening on {}", local_addr);

        let ctx = Arc::new(ConnContext {
            gate: self.gate.clone(),
            config: self.config.clone(),
            client: upstream::build_client(&self.config)?,
        });
        tokio::spawn(async move {
            connect::accept_loop(listener, ctx).await;
        });

        Ok(local_addr)
    }
}
