//! Metric helpers for `chatwire`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. Exporter
//! wiring is the embedder's concern.

use metrics::{counter, gauge};

/// Name of the counter tracking processed frames.
pub const FRAMES_PROCESSED: &str = "chatwire_frames_processed_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "chatwire_errors_total";
/// Name of the counter tracking reconnect attempts.
pub const RECONNECTS_TOTAL: &str = "chatwire_reconnects_total";
/// Name of the gauge tracking unresolved streamed messages.
pub const MESSAGES_IN_FLIGHT: &str = "chatwire_messages_in_flight";

/// Direction of frame processing.
#[derive(Clone, Copy)]
pub enum Direction {
    /// Inbound frames received from the backend.
    Inbound,
    /// Outbound frames sent to the backend.
    Outbound,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
}

/// Record an error occurrence.
pub fn inc_errors() { counter!(ERRORS_TOTAL).increment(1); }

/// Record a reconnect attempt.
pub fn inc_reconnects() { counter!(RECONNECTS_TOTAL).increment(1); }

/// Publish the current number of unresolved streamed messages.
pub fn set_messages_in_flight(count: usize) {
    #[expect(clippy::cast_precision_loss, reason = "gauge precision is cosmetic")]
    gauge!(MESSAGES_IN_FLIGHT).set(count as f64);
}
