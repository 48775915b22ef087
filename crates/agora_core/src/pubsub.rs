//! In-process publish/subscribe bus.
//!
//! # Responsibility
//! - Fan out change and notification events to topic subscribers.
//! - Provide one process-wide bus alongside independently owned buses.
//!
//! # Invariants
//! - Delivery to one subscriber never blocks on another; channels are
//!   unbounded.
//! - Subscribers whose receiver has been dropped are pruned on the next
//!   publish to their topic.

use crate::doc::Document;
use crate::store::ChangeEvent;
use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const NOTIFICATION_ADDED: &str = "NOTIFICATION_ADDED";
pub const DIRECT_MESSAGE_NOTIFICATION_ADDED: &str = "DIRECT_MESSAGE_NOTIFICATION_ADDED";

/// Topic carrying change events of `collection`.
pub fn changed_topic(collection: &str) -> String {
    format!("{collection}.changed")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Changed(ChangeEvent),
    Notification(Document),
}

static GLOBAL: Lazy<PubSub> = Lazy::new(PubSub::new);

/// Returns the process-wide bus.
pub fn global() -> &'static PubSub {
    &GLOBAL
}

#[derive(Debug, Default)]
pub struct PubSub {
    topics: Mutex<HashMap<String, Vec<Sender<Event>>>>,
}

impl PubSub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        self.lock().entry(topic.to_string()).or_default().push(sender);
        Subscription {
            topic: topic.to_string(),
            receiver,
        }
    }

    /// Sends `event` to every live subscriber of `topic`; returns how many
    /// received it.
    pub fn publish(&self, topic: &str, event: Event) -> usize {
        let mut topics = self.lock();
        let Some(senders) = topics.get_mut(topic) else {
            return 0;
        };

        senders.retain(|sender| sender.send(event.clone()).is_ok());
        let delivered = senders.len();
        if senders.is_empty() {
            topics.remove(topic);
        }
        debug!("event=publish module=pubsub topic={topic} delivered={delivered}");
        delivered
    }

    /// Number of registered subscribers, including ones not yet pruned.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().get(topic).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Sender<Event>>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving end of one topic subscription.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    receiver: Receiver<Event>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Waits up to `timeout` for the first event satisfying `predicate`,
    /// discarding the ones that do not.
    pub fn next_matching(
        &self,
        mut predicate: impl FnMut(&Event) -> bool,
        timeout: Duration,
    ) -> Option<Event> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Returns every event already queued.
    pub fn drain(&self) -> Vec<Event> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{changed_topic, Event, PubSub};
    use serde_json::json;
    use std::time::Duration;

    fn notification(id: &str) -> Event {
        Event::Notification(json!({ "id": id }).as_object().cloned().unwrap())
    }

    #[test]
    fn publish_reaches_only_subscribers_of_the_topic() {
        let bus = PubSub::new();
        let users = bus.subscribe(&changed_topic("users"));
        let threads = bus.subscribe(&changed_topic("threads"));

        assert_eq!(bus.publish(&changed_topic("users"), notification("n1")), 1);
        assert_eq!(users.try_recv(), Some(notification("n1")));
        assert_eq!(threads.try_recv(), None);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = PubSub::new();
        let kept = bus.subscribe("t");
        drop(bus.subscribe("t"));
        assert_eq!(bus.subscriber_count("t"), 2);

        assert_eq!(bus.publish("t", notification("n1")), 1);
        assert_eq!(bus.subscriber_count("t"), 1);
        assert_eq!(kept.drain().len(), 1);
    }

    #[test]
    fn next_matching_skips_other_events_and_times_out() {
        let bus = PubSub::new();
        let sub = bus.subscribe("t");
        bus.publish("t", notification("n1"));
        bus.publish("t", notification("n2"));

        let found = sub.next_matching(
            |event| matches!(event, Event::Notification(doc) if doc["id"] == "n2"),
            Duration::from_millis(50),
        );
        assert_eq!(found, Some(notification("n2")));
        assert_eq!(sub.next_matching(|_| true, Duration::from_millis(10)), None);
    }
}
