//! Synchronous pub/sub with exact channels and glob patterns
//!
//! Subscribers register once and receive everything on a single unbounded
//! channel; channel and pattern bindings reference the subscriber by id.
//! `publish` delivers once **per subscription** — a subscriber bound via
//! two matching patterns is delivered to (and counted) twice.
//!
//! Delivery is best-effort: a closed receiver is pruned, and a slow one
//! only grows its own queue.

use brine_core::{glob_match, now_ms};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Identifier of a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A delivered message
#[derive(Debug, Clone, PartialEq)]
pub struct PubSubMessage {
    /// The channel the message was published to
    pub channel: String,
    /// The matching pattern, when delivery came from a pattern binding
    pub pattern: Option<String>,
    /// Message payload
    pub payload: Vec<u8>,
    /// Publish time, ms since epoch
    pub timestamp_ms: u64,
    /// Publisher identity when known
    pub publisher_id: Option<String>,
}

#[derive(Debug, Default)]
struct PubSubInner {
    subscribers: HashMap<SubscriberId, UnboundedSender<PubSubMessage>>,
    channels: HashMap<String, HashSet<SubscriberId>>,
    patterns: HashMap<String, HashSet<SubscriberId>>,
}

impl PubSubInner {
    fn subscription_count(&self, id: SubscriberId) -> usize {
        self.channels.values().filter(|s| s.contains(&id)).count()
            + self.patterns.values().filter(|s| s.contains(&id)).count()
    }

    fn drop_binding(map: &mut HashMap<String, HashSet<SubscriberId>>, name: &str, id: SubscriberId) {
        if let Some(set) = map.get_mut(name) {
            set.remove(&id);
            if set.is_empty() {
                map.remove(name);
            }
        }
    }
}

/// Registry of subscribers, channels, and patterns
#[derive(Debug, Default)]
pub struct PubSub {
    inner: Mutex<PubSubInner>,
}

impl PubSub {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; all its deliveries arrive on the returned
    /// receiver until [`PubSub::remove_subscriber`].
    pub fn register(&self) -> (SubscriberId, UnboundedReceiver<PubSubMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriberId::new();
        self.inner.lock().subscribers.insert(id, tx);
        (id, rx)
    }

    /// Bind `id` to an exact channel; returns the subscriber's total
    /// subscription count afterwards.
    pub fn subscribe(&self, id: SubscriberId, channel: &str) -> usize {
        let mut inner = self.inner.lock();
        inner
            .channels
            .entry(channel.to_string())
            .or_default()
            .insert(id);
        inner.subscription_count(id)
    }

    /// Bind `id` to a glob pattern
    pub fn psubscribe(&self, id: SubscriberId, pattern: &str) -> usize {
        let mut inner = self.inner.lock();
        inner
            .patterns
            .entry(pattern.to_string())
            .or_default()
            .insert(id);
        inner.subscription_count(id)
    }

    /// Drop an exact-channel binding
    pub fn unsubscribe(&self, id: SubscriberId, channel: &str) -> usize {
        let mut inner = self.inner.lock();
        PubSubInner::drop_binding(&mut inner.channels, channel, id);
        inner.subscription_count(id)
    }

    /// Drop a pattern binding
    pub fn punsubscribe(&self, id: SubscriberId, pattern: &str) -> usize {
        let mut inner = self.inner.lock();
        PubSubInner::drop_binding(&mut inner.patterns, pattern, id);
        inner.subscription_count(id)
    }

    /// Remove a subscriber and every binding it holds
    pub fn remove_subscriber(&self, id: SubscriberId) {
        let mut inner = self.inner.lock();
        inner.subscribers.remove(&id);
        inner.channels.retain(|_, set| {
            set.remove(&id);
            !set.is_empty()
        });
        inner.patterns.retain(|_, set| {
            set.remove(&id);
            !set.is_empty()
        });
    }

    /// Deliver `payload` to every subscription bound to `channel`.
    /// Returns the number of deliveries.
    pub fn publish(
        &self,
        channel: &str,
        payload: &[u8],
        publisher_id: Option<&str>,
    ) -> usize {
        let timestamp_ms = now_ms();
        let mut inner = self.inner.lock();
        let mut delivered = 0usize;
        let mut dead: Vec<SubscriberId> = Vec::new();

        // Exact-channel bindings
        if let Some(subs) = inner.channels.get(channel) {
            for &id in subs {
                match inner.subscribers.get(&id) {
                    Some(tx) => {
                        let msg = PubSubMessage {
                            channel: channel.to_string(),
                            pattern: None,
                            payload: payload.to_vec(),
                            timestamp_ms,
                            publisher_id: publisher_id.map(str::to_string),
                        };
                        if tx.send(msg).is_ok() {
                            delivered += 1;
                        } else {
                            dead.push(id);
                        }
                    }
                    None => dead.push(id),
                }
            }
        }

        // Pattern bindings; one delivery per matching subscription
        for (pattern, subs) in &inner.patterns {
            if !glob_match(pattern.as_bytes(), channel.as_bytes()) {
                continue;
            }
            for &id in subs {
                match inner.subscribers.get(&id) {
                    Some(tx) => {
                        let msg = PubSubMessage {
                            channel: channel.to_string(),
                            pattern: Some(pattern.clone()),
                            payload: payload.to_vec(),
                            timestamp_ms,
                            publisher_id: publisher_id.map(str::to_string),
                        };
                        if tx.send(msg).is_ok() {
                            delivered += 1;
                        } else {
                            dead.push(id);
                        }
                    }
                    None => dead.push(id),
                }
            }
        }

        drop(inner);
        for id in dead {
            self.remove_subscriber(id);
        }
        delivered
    }

    /// The subscriber's current number of bindings
    pub fn subscription_count(&self, id: SubscriberId) -> usize {
        self.inner.lock().subscription_count(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_counts_exact_subscribers() {
        let ps = PubSub::new();
        let (a, mut rx_a) = ps.register();
        let (b, mut rx_b) = ps.register();
        ps.subscribe(a, "news");
        ps.subscribe(b, "news");

        let n = ps.publish("news", b"hello", None);
        assert_eq!(n, 2);
        assert_eq!(rx_a.try_recv().unwrap().payload, b"hello");
        assert_eq!(rx_b.try_recv().unwrap().payload, b"hello");
    }

    #[test]
    fn test_pattern_delivery_carries_pattern() {
        let ps = PubSub::new();
        let (a, mut rx) = ps.register();
        ps.psubscribe(a, "news.*");

        let n = ps.publish("news.sport", b"goal", Some("pub-1"));
        assert_eq!(n, 1);
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.pattern.as_deref(), Some("news.*"));
        assert_eq!(msg.channel, "news.sport");
        assert_eq!(msg.publisher_id.as_deref(), Some("pub-1"));
    }

    #[test]
    fn test_channel_and_pattern_both_count() {
        // One subscriber bound both ways receives twice: once per subscription
        let ps = PubSub::new();
        let (a, mut rx) = ps.register();
        ps.subscribe(a, "news.sport");
        ps.psubscribe(a, "news.*");

        let n = ps.publish("news.sport", b"x", None);
        assert_eq!(n, 2);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_no_subscribers_returns_zero() {
        let ps = PubSub::new();
        assert_eq!(ps.publish("empty", b"x", None), 0);
    }

    #[test]
    fn test_unsubscribe_and_counts() {
        let ps = PubSub::new();
        let (a, _rx) = ps.register();
        assert_eq!(ps.subscribe(a, "c1"), 1);
        assert_eq!(ps.subscribe(a, "c2"), 2);
        assert_eq!(ps.psubscribe(a, "p.*"), 3);
        assert_eq!(ps.unsubscribe(a, "c1"), 2);
        assert_eq!(ps.punsubscribe(a, "p.*"), 1);
        assert_eq!(ps.publish("c1", b"x", None), 0);
        assert_eq!(ps.publish("c2", b"x", None), 1);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let ps = PubSub::new();
        let (a, rx) = ps.register();
        ps.subscribe(a, "c");
        drop(rx);
        assert_eq!(ps.publish("c", b"x", None), 0);
        // Binding was cleaned up along with the subscriber
        assert_eq!(ps.subscription_count(a), 0);
    }

    #[test]
    fn test_remove_subscriber_clears_bindings() {
        let ps = PubSub::new();
        let (a, _rx) = ps.register();
        ps.subscribe(a, "c");
        ps.psubscribe(a, "p*");
        ps.remove_subscriber(a);
        assert_eq!(ps.publish("c", b"x", None), 0);
        assert_eq!(ps.publish("pq", b"x", None), 0);
    }
}
