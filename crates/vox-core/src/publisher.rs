//! Publisher registry and fan-out for Vox.
//!
//! The publisher keeps a registry of subscribers and, on every publish,
//! dispatches an independent copy of the message to each subscriber whose
//! topic set contains the message topic.
//!
//! ## Ordering
//!
//! Each recipient is served by its own Tokio task. Deliveries for one
//! publish race each other, and two publishes reaching the same subscriber
//! are not guaranteed to arrive in publish order.

use crate::config::PublisherConfig;
use crate::error::DeliveryError;
use crate::id::SubscriberId;
use crate::message::Message;
use crate::metrics;
use crate::subscriber::Subscriber;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Delivery counters shared with in-flight tasks.
#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    dispatched: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// The subscriber registry and message fan-out.
///
/// The registry is guarded by a single read/write lock: publishes share it,
/// adding or removing subscribers takes it exclusively. The publisher does
/// not own its subscribers; removing one leaves it open.
pub struct Publisher {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    config: PublisherConfig,
    /// Fires on [`Publisher::shutdown`]; every delivery task watches it.
    cancel: CancellationToken,
    in_flight: Option<Arc<Semaphore>>,
    counters: Arc<Counters>,
}

impl Publisher {
    /// Create a publisher with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PublisherConfig::default())
    }

    /// Create a publisher with custom configuration.
    #[must_use]
    pub fn with_config(config: PublisherConfig) -> Self {
        info!("Creating publisher with config: {:?}", config);
        Self {
            subscribers: RwLock::new(HashMap::new()),
            in_flight: config
                .in_flight_limit()
                .map(|limit| Arc::new(Semaphore::new(limit))),
            config,
            cancel: CancellationToken::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Register a subscriber, replacing any entry with the same ID.
    ///
    /// Returns `true` if the subscriber was not registered before.
    pub fn add_subscriber(&self, subscriber: &Subscriber) -> bool {
        let id = subscriber.id();
        let added = self
            .subscribers
            .write()
            .insert(id, subscriber.clone())
            .is_none();

        if added {
            metrics::record_registered();
            debug!(subscriber = %id, "Added subscriber");
        }
        added
    }

    /// Unregister a subscriber. The subscriber itself is not closed.
    ///
    /// Returns `true` if the subscriber was registered.
    pub fn remove_subscriber(&self, subscriber: &Subscriber) -> bool {
        self.remove_by_id(subscriber.id())
    }

    /// Unregister a subscriber by ID.
    ///
    /// Returns `true` if the subscriber was registered.
    pub fn remove_by_id(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().remove(&id).is_some();
        if removed {
            metrics::record_removed();
            debug!(subscriber = %id, "Removed subscriber");
        }
        removed
    }

    /// Check if a subscriber is registered.
    #[must_use]
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// IDs of the registered subscribers.
    #[must_use]
    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        self.subscribers.read().keys().copied().collect()
    }

    /// Publish a message to every subscriber of its topic.
    ///
    /// Topic membership is checked while the registry is read-locked. A
    /// delivery task is spawned for each match and this returns as soon as
    /// all of them are launched; slow or blocked subscribers never hold up
    /// the caller. The returned [`Dispatch`] can be awaited for outcomes or
    /// dropped to leave the deliveries running in the background.
    ///
    /// After [`shutdown`](Self::shutdown), or when called outside a Tokio
    /// runtime, nothing is dispatched.
    pub fn publish(&self, message: Message) -> Dispatch {
        if self.cancel.is_cancelled() {
            warn!(topic = %message.topic(), "Publish after shutdown");
            return Dispatch::default();
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(topic = %message.topic(), "Publish outside a Tokio runtime");
            return Dispatch::default();
        };

        let deliveries: Vec<_> = {
            let subscribers = self.subscribers.read();
            subscribers
                .values()
                .filter(|s| s.is_subscribed(message.topic()))
                .map(|s| (s.id(), self.spawn_delivery(&runtime, s.clone(), message.fork())))
                .collect()
        };

        let recipients = deliveries.len();
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        self.counters
            .dispatched
            .fetch_add(recipients as u64, Ordering::Relaxed);
        metrics::record_publish(recipients);
        trace!(topic = %message.topic(), recipients, "Published message");

        Dispatch { deliveries }
    }

    fn spawn_delivery(
        &self,
        runtime: &Handle,
        subscriber: Subscriber,
        message: Message,
    ) -> JoinHandle<Result<(), DeliveryError>> {
        let cancel = self.cancel.clone();
        let timeout = self.config.delivery_timeout();
        let limiter = self.in_flight.clone();
        let counters = Arc::clone(&self.counters);

        runtime.spawn(async move {
            let id = subscriber.id();
            let result = match acquire(limiter, &cancel).await {
                Ok(_permit) => subscriber.deliver(message, &cancel, timeout).await,
                Err(()) => Err(DeliveryError::Cancelled(id)),
            };
            record_outcome(&counters, &result);
            result
        })
    }

    /// Cancel every in-flight delivery and stop dispatching new ones.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!("Shutting down publisher");
            self.cancel.cancel();
        }
    }

    /// Check if the publisher has been shut down.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Get publisher statistics.
    #[must_use]
    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            subscriber_count: self.subscriber_count(),
            published: self.counters.published.load(Ordering::Relaxed),
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        let remaining = self.subscribers.get_mut().len();
        if remaining > 0 {
            metrics::record_released(remaining);
        }
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Wait for an in-flight slot, unless the publisher shuts down first.
async fn acquire(
    limiter: Option<Arc<Semaphore>>,
    cancel: &CancellationToken,
) -> Result<Option<OwnedSemaphorePermit>, ()> {
    let Some(semaphore) = limiter else {
        return Ok(None);
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(()),
        permit = semaphore.acquire_owned() => permit.map(Some).map_err(|_| ()),
    }
}

fn record_outcome(counters: &Counters, result: &Result<(), DeliveryError>) {
    match result {
        Ok(()) => {
            counters.delivered.fetch_add(1, Ordering::Relaxed);
            metrics::record_delivery("delivered");
        }
        Err(err) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            metrics::record_delivery(err.kind());
            match err {
                DeliveryError::Cancelled(id) => {
                    debug!(subscriber = %id, "Delivery cancelled");
                }
                _ => warn!(subscriber = %err.subscriber(), error = %err, "Delivery failed"),
            }
        }
    }
}

/// Outcome of delivering one published message to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Recipient.
    pub subscriber: SubscriberId,
    /// Whether the mailbox accepted the message.
    pub result: Result<(), DeliveryError>,
}

/// The deliveries launched by one [`Publisher::publish`] call.
///
/// Dropping a `Dispatch` does not stop its deliveries.
#[derive(Debug, Default)]
pub struct Dispatch {
    deliveries: Vec<(SubscriberId, JoinHandle<Result<(), DeliveryError>>)>,
}

impl Dispatch {
    /// Number of recipients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    /// Whether no subscriber matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    /// IDs of the recipients.
    #[must_use]
    pub fn recipients(&self) -> Vec<SubscriberId> {
        self.deliveries.iter().map(|(id, _)| *id).collect()
    }

    /// Wait for every delivery and collect the outcomes.
    pub async fn outcomes(self) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(self.deliveries.len());
        for (subscriber, handle) in self.deliveries {
            // A task that never finished (runtime shutting down) counts as cancelled.
            let result = handle
                .await
                .unwrap_or(Err(DeliveryError::Cancelled(subscriber)));
            outcomes.push(DeliveryOutcome { subscriber, result });
        }
        outcomes
    }

    /// Wait for every delivery and return how many succeeded.
    pub async fn wait(self) -> usize {
        self.outcomes()
            .await
            .iter()
            .filter(|o| o.result.is_ok())
            .count()
    }
}

/// Publisher statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherStats {
    /// Number of registered subscribers.
    pub subscriber_count: usize,
    /// Number of publish calls.
    pub published: u64,
    /// Number of per-subscriber deliveries launched.
    pub dispatched: u64,
    /// Deliveries accepted by a mailbox.
    pub delivered: u64,
    /// Deliveries that ended in an error.
    pub failed: u64,
}
