//! In-process publish/subscribe registry backing the relay's broadcast
//! topics.
//!
//! A topic is a named set of output channels. Connections register a sender
//! on subscribe and remove it on unsubscribe; those are the only mutators.
//! Publishing clones the frame to every matching subscriber and silently
//! drops the ones whose receiving task has gone away.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::frames::OutboundFrame;

/// Handle returned by `subscribe`, needed to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct Subscriber {
    tx: mpsc::UnboundedSender<OutboundFrame>,
    /// Recipient id this subscription is bound to. `None` means unscoped:
    /// every frame on the topic is delivered.
    scope: Option<String>,
}

impl Subscriber {
    fn wants(&self, frame: &OutboundFrame) -> bool {
        match (&self.scope, frame.receiver_id()) {
            (Some(bound), Some(receiver)) => bound == receiver,
            // Unscoped subscriptions and frames without a recipient pass
            // through unfiltered.
            _ => true,
        }
    }
}

#[derive(Default)]
pub struct TopicRegistry {
    next_id: AtomicU64,
    topics: Mutex<HashMap<String, HashMap<u64, Subscriber>>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        topic: &str,
        scope: Option<String>,
        tx: mpsc::UnboundedSender<OutboundFrame>,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut topics = self.topics.lock();
        topics
            .entry(topic.to_string())
            .or_default()
            .insert(id, Subscriber { tx, scope });
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) {
        let mut topics = self.topics.lock();
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.remove(&id.0);
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Delivers `frame` to every live matching subscriber of `topic` and
    /// returns how many received it. Zero subscribers is not an error.
    pub fn publish(&self, topic: &str, frame: &OutboundFrame) -> usize {
        let mut topics = self.topics.lock();
        let Some(subscribers) = topics.get_mut(topic) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, subscriber) in subscribers.iter() {
            if !subscriber.wants(frame) {
                continue;
            }
            if subscriber.tx.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }

        for id in dead {
            subscribers.remove(&id);
        }
        if subscribers.is_empty() {
            topics.remove(topic);
        }
        delivered
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tokio::sync::mpsc;

    use super::TopicRegistry;
    use crate::relay::frames::OutboundFrame;

    fn notification(receiver_id: &str) -> OutboundFrame {
        OutboundFrame::MessageNotification {
            sender_id: "10".to_string(),
            sender_name: "Ada".to_string(),
            sender_type: "student".to_string(),
            content: "You have a new message from Ada".to_string(),
            timestamp: Utc::now(),
            receiver_id: receiver_id.to_string(),
        }
    }

    #[test]
    fn scoped_subscription_filters_by_receiver() {
        let registry = TopicRegistry::new();
        let (scoped_tx, mut scoped_rx) = mpsc::unbounded_channel();
        let (unscoped_tx, mut unscoped_rx) = mpsc::unbounded_channel();

        registry.subscribe("global_notifications", Some("42".to_string()), scoped_tx);
        registry.subscribe("global_notifications", None, unscoped_tx);

        registry.publish("global_notifications", &notification("42"));
        registry.publish("global_notifications", &notification("7"));

        let delivered = scoped_rx.try_recv().expect("event for 42 delivered");
        assert_eq!(delivered.receiver_id(), Some("42"));
        assert!(scoped_rx.try_recv().is_err(), "event for 7 must be filtered");

        assert!(unscoped_rx.try_recv().is_ok());
        assert!(unscoped_rx.try_recv().is_ok(), "unscoped receives both");
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let registry = TopicRegistry::new();
        assert_eq!(registry.publish("chat_10_20", &notification("20")), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = TopicRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let id = registry.subscribe("chat_10_20", None, tx);
        registry.publish("chat_10_20", &notification("20"));
        assert!(rx.try_recv().is_ok());

        registry.unsubscribe("chat_10_20", id);
        assert_eq!(registry.publish("chat_10_20", &notification("20")), 0);
        assert_eq!(registry.subscriber_count("chat_10_20"), 0);
    }

    #[test]
    fn dropped_receivers_are_pruned_on_publish() {
        let registry = TopicRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();

        registry.subscribe("chat_10_20", None, tx);
        drop(rx);

        assert_eq!(registry.publish("chat_10_20", &notification("20")), 0);
        assert_eq!(registry.subscriber_count("chat_10_20"), 0);
    }
}
