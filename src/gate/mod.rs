//! The policy gate: the two hooks a host proxy calls.
//!
//! - [`Gate::on_request`] runs once per intercepted request. It evaluates the
//!   request and attaches a denial response when the policy rejects it.
//! - [`Gate::on_websocket_start`] runs once per websocket handshake and always
//!   terminates the session.
//!
//! A [`Gate`] is immutable after construction. Share it across connection
//! tasks with an `Arc`; calls for different flows never interact.

pub mod events;

use std::sync::Arc;

use crate::flow::Flow;
use crate::policy::{self, Verdict};

pub use events::{GateEvent, GateObserver, TracingObserver};

/// A websocket session owned by the host.
///
/// The gate never inspects the session to make a decision; `url` is only
/// used to label the emitted event.
pub trait WebSocketSession {
    fn url(&self) -> &str;

    /// Close the connection. Must be safe to call on any session state.
    fn terminate(&mut self);
}

#[derive(Clone, Default)]
pub struct Gate {
    observers: Vec<Arc<dyn GateObserver>>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer. Events are delivered to observers in insertion order.
    pub fn with_observer(mut self, observer: Arc<dyn GateObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn observer_names(&self) -> Vec<&str> {
        self.observers.iter().map(|o| o.name()).collect()
    }

    /// Request hook: classify the flow's request and apply the verdict.
    pub fn on_request(&self, flow: &mut Flow) -> Verdict {
        let req = &flow.request;
        self.emit(GateEvent::RequestReceived {
            method: req.method.clone(),
            url: req.url.clone(),
            headers: req
                .headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        });

        let verdict = policy::evaluate(req);
        let event = match verdict {
            Verdict::Allow => GateEvent::RequestAllowed {
                method: req.method.clone(),
                url: req.url.clone(),
                scheme: req.scheme.clone(),
            },
            Verdict::DenyScheme => GateEvent::SchemeBlocked {
                method: req.method.clone(),
                url: req.url.clone(),
                scheme: req.scheme.clone(),
            },
            Verdict::DenyUpgrade => GateEvent::UpgradeBlocked {
                method: req.method.clone(),
                url: req.url.clone(),
                scheme: req.scheme.clone(),
            },
        };
        self.emit(event);

        policy::enforce(flow, verdict);
        verdict
    }

    /// Websocket hook: terminate the session, unconditionally.
    pub fn on_websocket_start<S: WebSocketSession + ?Sized>(&self, session: &mut S) {
        self.emit(GateEvent::WebSocketKilled {
            url: session.url().to_string(),
        });
        session.terminate();
    }

    fn emit(&self, event: GateEvent) {
        for observer in &self.observers {
            observer.observe(&event);
        }
    }
}
