//! Real-time fan-out layer.
//!
//! One broadcast channel per topic, created lazily on first subscription or
//! publish and dropped again once the last subscriber is gone. Delivery is
//! best effort to whoever is subscribed at publish time; there is no queue
//! and no replay, so a reconnecting client must re-read current state.

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::events::ServerEvent;

/// Named fan-out channel. Every session holds a subscription to its own user
/// topic; challenge topics are joined explicitly while viewing a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Per-user topic (`user:<id>`).
    User(String),
    /// Per-challenge topic (`challenge:<id>`).
    Challenge(Uuid),
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::User(id) => write!(f, "user:{id}"),
            Topic::Challenge(id) => write!(f, "challenge:{id}"),
        }
    }
}

/// Topic registry delivering lifecycle events to connected sessions.
pub struct EventBroadcaster {
    topics: DashMap<Topic, broadcast::Sender<ServerEvent>>,
    capacity: usize,
}

impl EventBroadcaster {
    /// Create a broadcaster whose per-topic channels hold `capacity` events
    /// before slow receivers start lagging.
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity,
        }
    }

    /// Register a subscriber on `topic`, creating the channel if needed.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<ServerEvent> {
        self.topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Send an event to the topic's current subscribers. A topic without
    /// subscribers is reclaimed instead of kept alive.
    pub fn publish(&self, topic: &Topic, event: ServerEvent) {
        let delivered = match self.topics.get(topic) {
            Some(sender) => sender.send(event).is_ok(),
            None => return,
        };

        if !delivered {
            self.topics
                .remove_if(topic, |_, sender| sender.receiver_count() == 0);
        }
    }

    /// Publish to a single user topic.
    pub fn publish_to_user(&self, user_id: &str, event: ServerEvent) {
        self.publish(&Topic::User(user_id.to_owned()), event);
    }

    /// Publish the same event to several user topics.
    pub fn publish_to_users<'a>(
        &self,
        user_ids: impl IntoIterator<Item = &'a str>,
        event: ServerEvent,
    ) {
        for user_id in user_ids {
            self.publish_to_user(user_id, event.clone());
        }
    }

    /// Publish to a challenge topic.
    pub fn publish_to_challenge(&self, challenge_id: Uuid, event: ServerEvent) {
        self.publish(&Topic::Challenge(challenge_id), event);
    }

    /// Publish to every connected session. Only user topics are targeted:
    /// each session always holds its user-topic subscription, so iterating
    /// challenge topics as well would deliver duplicates.
    pub fn publish_to_all(&self, event: ServerEvent) {
        let user_topics: Vec<Topic> = self
            .topics
            .iter()
            .filter(|entry| matches!(entry.key(), Topic::User(_)))
            .map(|entry| entry.key().clone())
            .collect();

        for topic in user_topics {
            self.publish(&topic, event.clone());
        }
    }
}
