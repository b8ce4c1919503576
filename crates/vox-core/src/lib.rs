//! # vox-core
//!
//! In-process publish/subscribe for the Vox messaging library.
//!
//! This crate provides the building blocks:
//!
//! - **Message** - Immutable topic-tagged value with a shared payload
//! - **Subscriber** - Topic-interest set plus a bounded mailbox
//! - **Publisher** - Subscriber registry and concurrent fan-out
//! - **Config** - Publisher and subscriber settings
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ publish ┌─────────────┐ deliver ┌─────────────┐
//! │   Caller    │────────▶│  Publisher  │────────▶│ Subscriber  │
//! └─────────────┘         └─────────────┘  (task) └─────────────┘
//!                                                        │
//!                                                        ▼
//!                                                 ┌─────────────┐
//!                                                 │ receive loop│
//!                                                 └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use serde_json::json;
//! use vox_core::{Message, Publisher, Subscriber};
//!
//! # async fn run() {
//! let publisher = Publisher::new();
//! let subscriber = Subscriber::new();
//! subscriber.subscribe("topic1");
//! publisher.add_subscriber(&subscriber);
//!
//! publisher.publish(Message::new("topic1", [("message", json!("Hello World!"))]));
//!
//! let mut inbox = subscriber.inbox().await;
//! let msg = inbox.recv().await;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod message;
pub mod metrics;
pub mod publisher;
pub mod subscriber;

pub use config::{Config, PublisherConfig, SubscriberConfig};
pub use error::{ConfigError, DeliveryError};
pub use id::SubscriberId;
pub use message::{Message, Payload};
pub use publisher::{DeliveryOutcome, Dispatch, Publisher, PublisherStats};
pub use subscriber::{Inbox, Subscriber};
