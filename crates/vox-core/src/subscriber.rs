//! Subscribers for Vox.
//!
//! A subscriber owns a set of topics it is interested in and a bounded
//! mailbox that publishers deliver into. The owner drains the mailbox
//! through an [`Inbox`] or [`Subscriber::receive_loop`].
//!
//! ## Lifecycle
//!
//! ```text
//! Created ──▶ Active ──close()──▶ Closed
//! ```
//!
//! Once closed, deliveries fail with [`DeliveryError::ChannelClosed`] and
//! receivers drain whatever is still buffered before ending.

use crate::config::SubscriberConfig;
use crate::error::DeliveryError;
use crate::id::SubscriberId;
use crate::message::Message;
use dashmap::DashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

struct Inner {
    id: SubscriberId,
    topics: DashSet<String>,
    sender: mpsc::Sender<Message>,
    /// Single reader; held by whoever owns the [`Inbox`].
    receiver: Mutex<mpsc::Receiver<Message>>,
    closed: CancellationToken,
    capacity: usize,
}

/// A subscriber to one or more topics.
///
/// `Subscriber` is a cheap handle: clones refer to the same topics and
/// mailbox. Registering a subscriber on a publisher stores a clone and does
/// not tie their lifetimes together.
#[derive(Clone)]
pub struct Subscriber {
    inner: Arc<Inner>,
}

impl Subscriber {
    /// Create a subscriber with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SubscriberConfig::default())
    }

    /// Create a subscriber with a custom configuration.
    ///
    /// A mailbox capacity of zero is raised to one.
    #[must_use]
    pub fn with_config(config: SubscriberConfig) -> Self {
        let capacity = config.mailbox_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let id = SubscriberId::next();

        debug!(subscriber = %id, capacity, "Created subscriber");

        Self {
            inner: Arc::new(Inner {
                id,
                topics: DashSet::new(),
                sender,
                receiver: Mutex::new(receiver),
                closed: CancellationToken::new(),
                capacity,
            }),
        }
    }

    /// Get the subscriber ID.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Get the mailbox capacity.
    #[must_use]
    pub fn mailbox_capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Subscribe to a topic.
    ///
    /// Returns `true` if the topic was not already in the set.
    pub fn subscribe(&self, topic: impl Into<String>) -> bool {
        let topic = topic.into();
        trace!(subscriber = %self.inner.id, topic = %topic, "Subscribe");
        self.inner.topics.insert(topic)
    }

    /// Unsubscribe from a topic.
    ///
    /// Returns `true` if the subscriber was subscribed.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        let removed = self.inner.topics.remove(topic).is_some();
        if removed {
            trace!(subscriber = %self.inner.id, topic = %topic, "Unsubscribe");
        }
        removed
    }

    /// Check if the subscriber is subscribed to a topic.
    #[must_use]
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.inner.topics.contains(topic)
    }

    /// Snapshot of the subscribed topics.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.inner.topics.iter().map(|t| t.key().clone()).collect()
    }

    /// Number of subscribed topics.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.inner.topics.len()
    }

    /// Check if the subscriber has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Close the mailbox.
    ///
    /// Pending and future deliveries fail with
    /// [`DeliveryError::ChannelClosed`]. Messages already buffered stay
    /// readable until drained. Closing twice is a no-op.
    pub fn close(&self) {
        if self.inner.closed.is_cancelled() {
            return;
        }
        self.inner.closed.cancel();

        // If a reader holds the inbox it will close the receiver itself.
        if let Ok(mut receiver) = self.inner.receiver.try_lock() {
            receiver.close();
        }

        debug!(subscriber = %self.inner.id, "Subscriber closed");
    }

    /// Deliver a message into the mailbox.
    ///
    /// Waits while the mailbox is full. The wait ends when the message is
    /// accepted, the subscriber is closed, `cancel` fires, or `timeout`
    /// elapses, whichever comes first.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::ChannelClosed`] if the subscriber is or becomes closed.
    /// - [`DeliveryError::Cancelled`] if `cancel` fires first.
    /// - [`DeliveryError::Timeout`] if `timeout` elapses first.
    pub async fn deliver(
        &self,
        message: Message,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<(), DeliveryError> {
        let id = self.inner.id;
        if self.is_closed() {
            return Err(DeliveryError::ChannelClosed(id));
        }

        let send = async {
            tokio::select! {
                biased;
                () = self.inner.closed.cancelled() => Err(DeliveryError::ChannelClosed(id)),
                () = cancel.cancelled() => Err(DeliveryError::Cancelled(id)),
                res = self.inner.sender.send(message) => {
                    res.map_err(|_| DeliveryError::ChannelClosed(id))
                }
            }
        };

        match timeout {
            Some(after) => tokio::time::timeout(after, send)
                .await
                .unwrap_or_else(|_| Err(DeliveryError::Timeout { subscriber: id, after })),
            None => send.await,
        }
    }

    /// Deliver a message without cancellation or timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::ChannelClosed`] if the subscriber is closed.
    pub async fn send(&self, message: Message) -> Result<(), DeliveryError> {
        self.deliver(message, &CancellationToken::new(), None).await
    }

    /// Take the receive side of the mailbox.
    ///
    /// There is one reader at a time; this waits until any other [`Inbox`]
    /// for this subscriber is dropped.
    pub async fn inbox(&self) -> Inbox<'_> {
        Inbox {
            receiver: self.inner.receiver.lock().await,
            closed: &self.inner.closed,
        }
    }

    /// Take the receive side of the mailbox if no one else holds it.
    #[must_use]
    pub fn try_inbox(&self) -> Option<Inbox<'_>> {
        let receiver = self.inner.receiver.try_lock().ok()?;
        Some(Inbox {
            receiver,
            closed: &self.inner.closed,
        })
    }

    /// Invoke `callback` for every message, in arrival order, until the
    /// subscriber is closed and the mailbox is drained.
    ///
    /// The callback runs inline on the calling task. Spawn this on its own
    /// task if the caller must keep doing other work.
    pub async fn receive_loop<F>(&self, mut callback: F)
    where
        F: FnMut(Message),
    {
        let mut inbox = self.inbox().await;
        let mut received: u64 = 0;

        while let Some(message) = inbox.recv().await {
            callback(message);
            received += 1;
        }

        debug!(subscriber = %self.inner.id, received, "Receive loop finished");
    }

    /// Like [`receive_loop`](Self::receive_loop), awaiting each callback
    /// before taking the next message.
    pub async fn receive_loop_async<F, Fut>(&self, mut callback: F)
    where
        F: FnMut(Message) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut inbox = self.inbox().await;
        let mut received: u64 = 0;

        while let Some(message) = inbox.recv().await {
            callback(message).await;
            received += 1;
        }

        debug!(subscriber = %self.inner.id, received, "Receive loop finished");
    }
}

impl Default for Subscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.inner.id)
            .field("topics", &self.inner.topics.len())
            .field("capacity", &self.inner.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Receive-only handle to a subscriber's mailbox.
///
/// Holding an `Inbox` makes the holder the mailbox's only reader.
pub struct Inbox<'a> {
    receiver: MutexGuard<'a, mpsc::Receiver<Message>>,
    closed: &'a CancellationToken,
}

impl Inbox<'_> {
    /// Receive the next message.
    ///
    /// Returns `None` once the subscriber is closed and every buffered
    /// message has been returned.
    pub async fn recv(&mut self) -> Option<Message> {
        if !self.closed.is_cancelled() {
            tokio::select! {
                biased;
                message = self.receiver.recv() => return message,
                () = self.closed.cancelled() => {}
            }
        }

        self.receiver.close();
        self.receiver.recv().await
    }

    /// Receive a message if one is buffered, without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        if self.closed.is_cancelled() {
            self.receiver.close();
        }
        self.receiver.try_recv().ok()
    }

    /// Take every message currently buffered, without waiting.
    pub fn drain(&mut self) -> Vec<Message> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

impl fmt::Debug for Inbox<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbox")
            .field("closed", &self.closed.is_cancelled())
            .finish_non_exhaustive()
    }
}
