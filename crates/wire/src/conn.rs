//! Per-connection state
//!
//! Each connection owns its parser buffer (held by the server loop), an
//! authentication flag, and its subscription bookkeeping. Nothing here is
//! shared across connections.

use brine_engine::{Engine, PubSubMessage, SubscriberId};
use std::collections::HashSet;
use tokio::sync::mpsc::UnboundedReceiver;

/// State carried for one client connection
#[derive(Debug)]
pub struct ConnState {
    /// Set once `AUTH` succeeds; starts true when no password is required
    pub authenticated: bool,
    required_password: Option<String>,
    /// Channels this connection is subscribed to
    pub channels: HashSet<String>,
    /// Patterns this connection is subscribed to
    pub patterns: HashSet<String>,
    /// Pub/sub identity, registered lazily on first subscribe
    pub subscriber: Option<SubscriberId>,
    /// Receiver handed to the server loop after the first subscribe
    pub pending_receiver: Option<UnboundedReceiver<PubSubMessage>>,
    /// Set by `QUIT`; the server closes after flushing the reply
    pub closing: bool,
}

impl ConnState {
    /// Fresh connection state. With no configured password every
    /// connection starts authenticated.
    pub fn new(required_password: Option<String>) -> Self {
        Self {
            authenticated: required_password.is_none(),
            required_password,
            channels: HashSet::new(),
            patterns: HashSet::new(),
            subscriber: None,
            pending_receiver: None,
            closing: false,
        }
    }

    /// Validate an `AUTH` attempt
    pub fn try_auth(&mut self, password: &str) -> bool {
        match &self.required_password {
            Some(required) if required == password => {
                self.authenticated = true;
                true
            }
            Some(_) => false,
            // AUTH against a password-less server is accepted for client
            // compatibility
            None => {
                self.authenticated = true;
                true
            }
        }
    }

    /// The connection's subscriber id, registering with the engine on
    /// first use
    pub fn ensure_subscriber(&mut self, engine: &Engine) -> SubscriberId {
        match self.subscriber {
            Some(id) => id,
            None => {
                let (id, rx) = engine.register_subscriber();
                self.subscriber = Some(id);
                self.pending_receiver = Some(rx);
                id
            }
        }
    }

    /// Total live subscriptions for this connection
    pub fn subscription_count(&self) -> usize {
        self.channels.len() + self.patterns.len()
    }
}
