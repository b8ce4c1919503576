//! Subscriber identities.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide identity source. Starts at 1 so that 0 is never handed out.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a subscriber.
///
/// Identities are strictly increasing in creation order and never reused
/// within a process, regardless of how many threads create subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate the next identity.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_ids_increase() {
        let a = SubscriberId::next();
        let b = SubscriberId::next();
        assert!(b > a);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| (0..1000).map(|_| SubscriberId::next()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 8000);
    }

    #[test]
    fn test_display() {
        let id = SubscriberId(42);
        assert_eq!(id.to_string(), "sub-42");
    }
}
