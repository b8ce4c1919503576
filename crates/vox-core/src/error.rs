//! Error types for Vox.

use crate::id::SubscriberId;
use std::time::Duration;
use thiserror::Error;

/// Why a message could not be handed to a subscriber.
///
/// Delivery errors are local to one recipient; they never affect delivery
/// to other subscribers or the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The subscriber's mailbox is closed.
    #[error("Subscriber {0} is closed")]
    ChannelClosed(SubscriberId),

    /// The mailbox stayed full for longer than the delivery timeout.
    #[error("Delivery to {subscriber} timed out after {after:?}")]
    Timeout {
        /// Target subscriber.
        subscriber: SubscriberId,
        /// Timeout that elapsed.
        after: Duration,
    },

    /// The delivery was cancelled before the mailbox accepted the message.
    #[error("Delivery to {0} was cancelled")]
    Cancelled(SubscriberId),
}

impl DeliveryError {
    /// Get the subscriber the delivery was aimed at.
    #[must_use]
    pub fn subscriber(&self) -> SubscriberId {
        match self {
            Self::ChannelClosed(id) | Self::Cancelled(id) => *id,
            Self::Timeout { subscriber, .. } => *subscriber,
        }
    }

    /// Short label used for logging and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChannelClosed(_) => "closed",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that was read.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Config contents are not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config parsed but holds an unusable value.
    #[error("Invalid config: {0}")]
    Invalid(&'static str),
}
