//! Message type for Vox.
//!
//! A message is a topic plus a payload map. The payload is shared behind an
//! `Arc`, so copying a message for each recipient never copies the map.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Message payload: unique keys mapped to application-defined values.
pub type Payload = HashMap<String, Value>;

/// A topic-tagged message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    topic: String,
    payload: Arc<Payload>,
}

impl Message {
    /// Create a new message.
    ///
    /// No validation is performed; an empty topic only matches subscribers
    /// that explicitly subscribed to the empty string.
    #[must_use]
    pub fn new<K, I>(topic: impl Into<String>, payload: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            topic: topic.into(),
            payload: Arc::new(payload.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    /// Create a message with an empty payload.
    #[must_use]
    pub fn empty(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: Arc::new(Payload::new()),
        }
    }

    /// Create a message that shares an existing payload.
    #[must_use]
    pub fn with_shared_payload(topic: impl Into<String>, payload: Arc<Payload>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Return a copy of this message with one more payload entry.
    ///
    /// The original message is left untouched.
    #[must_use]
    pub fn with_entry(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut payload = (*self.payload).clone();
        payload.insert(key.into(), value.into());
        Self {
            topic: self.topic.clone(),
            payload: Arc::new(payload),
        }
    }

    /// Get the topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Get the payload map.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Get the shared payload handle.
    #[must_use]
    pub fn shared_payload(&self) -> &Arc<Payload> {
        &self.payload
    }

    /// Look up a payload value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Number of payload entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Build the per-recipient copy used by fan-out: same topic, same payload.
    pub(crate) fn fork(&self) -> Self {
        Self {
            topic: self.topic.clone(),
            payload: Arc::clone(&self.payload),
        }
    }
}
