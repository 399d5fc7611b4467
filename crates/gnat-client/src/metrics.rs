//! Client-side metrics.
//!
//! Recorded through the `metrics` facade; they are no-ops until the
//! application installs a recorder (see the `gnat` binary).

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const MESSAGES_TOTAL: &str = "gnat_messages_total";
    pub const MESSAGES_BYTES: &str = "gnat_messages_bytes";
    pub const DROPPED_MESSAGES_TOTAL: &str = "gnat_dropped_messages_total";
    pub const SUBSCRIPTIONS_ACTIVE: &str = "gnat_subscriptions_active";
    pub const FLUSH_TIMEOUTS_TOTAL: &str = "gnat_flush_timeouts_total";
    pub const SERVER_ERRORS_TOTAL: &str = "gnat_server_errors_total";
}

/// Describe all client metrics to the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(names::MESSAGES_TOTAL, "Messages published and received");
    metrics::describe_counter!(names::MESSAGES_BYTES, "Payload bytes published and received");
    metrics::describe_counter!(
        names::DROPPED_MESSAGES_TOTAL,
        "Messages received for unknown subscriptions"
    );
    metrics::describe_gauge!(names::SUBSCRIPTIONS_ACTIVE, "Live subscriptions");
    metrics::describe_counter!(
        names::FLUSH_TIMEOUTS_TOTAL,
        "Flushes that saw no PONG in time"
    );
    metrics::describe_counter!(names::SERVER_ERRORS_TOTAL, "-ERR lines from the server");
}

/// Record a message; `direction` is `"inbound"` or `"outbound"`.
pub fn record_message(bytes: usize, direction: &'static str) {
    counter!(names::MESSAGES_TOTAL, "direction" => direction).increment(1);
    counter!(names::MESSAGES_BYTES, "direction" => direction).increment(bytes as u64);
}

/// Record a message nobody was subscribed to.
pub fn record_dropped() {
    counter!(names::DROPPED_MESSAGES_TOTAL).increment(1);
}

/// Update the live subscription count.
pub fn set_active_subscriptions(count: usize) {
    gauge!(names::SUBSCRIPTIONS_ACTIVE).set(count as f64);
}

/// Record a flush timeout.
pub fn record_flush_timeout() {
    counter!(names::FLUSH_TIMEOUTS_TOTAL).increment(1);
}

/// Record a server error line.
pub fn record_server_error() {
    counter!(names::SERVER_ERRORS_TOTAL).increment(1);
}
