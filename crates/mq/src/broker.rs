//! In-process topic transport with consumer groups.
//!
//! Every group subscribed to a topic receives each message published to it,
//! and within a group exactly one member gets it. Members are served
//! round-robin, each through its own bounded `tokio::sync::mpsc` channel.
//! A message is dropped for a group whose members are all full.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Default per-member buffer capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// A keyed message on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub topic: String,
    pub key: String,
    pub value: String,
}

#[derive(Default)]
struct Group {
    members: Vec<mpsc::Sender<QueueMessage>>,
    next: usize,
}

impl Group {
    /// Hand `message` to the next member with room, pruning members whose
    /// receiver is gone. Returns whether a member accepted it.
    fn deliver(&mut self, mut message: QueueMessage) -> bool {
        self.members.retain(|member| !member.is_closed());
        for _ in 0..self.members.len() {
            let index = self.next % self.members.len();
            self.next = index + 1;
            match self.members[index].try_send(message) {
                Ok(()) => return true,
                Err(mpsc::error::TrySendError::Full(returned))
                | Err(mpsc::error::TrySendError::Closed(returned)) => message = returned,
            }
        }
        false
    }
}

/// Topic registry. Share it via `Arc<Broker>`.
pub struct Broker {
    capacity: usize,
    /// topic -> group -> members
    topics: Mutex<HashMap<String, HashMap<String, Group>>>,
}

impl Broker {
    /// Create a broker whose group members buffer up to `capacity`
    /// messages each.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Publish `value` under `key`, returning how many groups received it.
    /// Zero means no group took the message and it was dropped.
    pub fn publish(&self, topic: &str, key: impl Into<String>, value: impl Into<String>) -> usize {
        let message = QueueMessage {
            topic: topic.to_string(),
            key: key.into(),
            value: value.into(),
        };
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(groups) = topics.get_mut(topic) else {
            return 0;
        };

        let mut delivered = 0;
        for (name, group) in groups.iter_mut() {
            if group.deliver(message.clone()) {
                delivered += 1;
            } else if !group.members.is_empty() {
                tracing::warn!(topic, group = %name, key = %message.key, "Group is full, message dropped");
            }
        }
        delivered
    }

    /// Publish `value` under a freshly generated key.
    pub fn publish_value(&self, topic: &str, value: impl Into<String>) -> usize {
        self.publish(topic, Uuid::new_v4().to_string(), value)
    }

    /// Join `group` on `topic` as a new member, receiving its share of
    /// the messages published from now on. Dropping the receiver leaves
    /// the group.
    pub fn subscribe(&self, topic: &str, group: &str) -> mpsc::Receiver<QueueMessage> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(topic.to_string())
            .or_default()
            .entry(group.to_string())
            .or_default()
            .members
            .push(sender);
        receiver
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
