//! Metrics instrumentation for Vox.
//!
//! Uses the `metrics` facade; nothing is recorded unless the host
//! application installs a recorder (for example the Prometheus exporter).

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const MESSAGES_PUBLISHED: &str = "vox_messages_published_total";
    pub const RECIPIENTS_TOTAL: &str = "vox_recipients_total";
    pub const DELIVERIES_TOTAL: &str = "vox_deliveries_total";
    pub const SUBSCRIBERS_REGISTERED: &str = "vox_subscribers_registered";
}

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(names::MESSAGES_PUBLISHED, "Total number of published messages");
    metrics::describe_counter!(
        names::RECIPIENTS_TOTAL,
        "Total number of per-subscriber deliveries dispatched"
    );
    metrics::describe_counter!(
        names::DELIVERIES_TOTAL,
        "Completed delivery attempts, labelled by outcome"
    );
    metrics::describe_gauge!(
        names::SUBSCRIBERS_REGISTERED,
        "Current number of subscribers registered on publishers"
    );
}

/// Record a publish call and how many recipients it matched.
pub fn record_publish(recipients: usize) {
    counter!(names::MESSAGES_PUBLISHED).increment(1);
    counter!(names::RECIPIENTS_TOTAL).increment(recipients as u64);
}

/// Record the outcome of one delivery attempt.
pub fn record_delivery(outcome: &'static str) {
    counter!(names::DELIVERIES_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a subscriber being registered.
pub fn record_registered() {
    gauge!(names::SUBSCRIBERS_REGISTERED).increment(1.0);
}

/// Record a subscriber being removed.
pub fn record_removed() {
    gauge!(names::SUBSCRIBERS_REGISTERED).decrement(1.0);
}

/// Record a dropped publisher releasing its remaining subscribers.
pub fn record_released(count: usize) {
    gauge!(names::SUBSCRIBERS_REGISTERED).decrement(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder() {
        // No recorder installed: all of these are no-ops.
        describe_metrics();
        record_publish(3);
        record_delivery("delivered");
        record_registered();
        record_removed();
        record_released(2);
    }
}
