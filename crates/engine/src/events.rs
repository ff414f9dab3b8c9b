//! Engine event fan-out
//!
//! One event per state-changing operation, delivered best-effort on
//! unbounded channels. A slow or dropped listener never blocks the
//! engine; closed channels are pruned on the next emit.

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Events observable from an engine or provisioning manager
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A key was written
    KeySet { namespace: String, key: Vec<u8> },
    /// A key was read (hit)
    KeyGet { namespace: String, key: Vec<u8> },
    /// A key was deleted by a client
    KeyDelete { namespace: String, key: Vec<u8> },
    /// A key's TTL elapsed
    KeyExpire { namespace: String, key: Vec<u8> },
    /// A key was evicted under memory pressure
    KeyEvict { namespace: String, key: Vec<u8> },
    /// A tenant instance was provisioned
    InstanceCreate { instance_id: String, namespace: String },
    /// A tenant instance was removed
    InstanceDelete { instance_id: String, namespace: String },
    /// A node registered with the cluster
    NodeJoin { node_id: String },
    /// A node went offline or was removed
    NodeLeave { node_id: String },
    /// A TEE node refreshed its attestation blob
    AttestationRefresh { node_id: String },
    /// A message was published
    PubSubPublish { channel: String, receivers: usize },
    /// A subscription was added
    PubSubSubscribe { channel: String },
    /// A subscription was removed
    PubSubUnsubscribe { channel: String },
}

/// Best-effort listener registry
#[derive(Debug, Default)]
pub struct EventBus {
    listeners: Mutex<Vec<UnboundedSender<EngineEvent>>>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; events arrive on the returned receiver
    pub fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live listener
    pub fn emit(&self, event: EngineEvent) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of registered listeners (closed ones may still be counted
    /// until the next emit prunes them)
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}
