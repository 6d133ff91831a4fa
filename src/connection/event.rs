//! Events delivered to the consumer.

use super::ConnectionState;
use crate::frame::MessageId;

/// The client's consumer-facing event surface.
///
/// Events arrive on the unbounded receiver returned from
/// [`ChatClient::spawn`](super::ChatClient::spawn). Delta frequency is
/// bounded by the batching interval, so the channel cannot grow without
/// bound under a fast backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// The connection state changed.
    StateChanged(ConnectionState),
    /// Batched incremental text for a streaming message.
    TextDelta {
        /// Message the delta belongs to.
        id: MessageId,
        /// Text accumulated since the previous delta for this message.
        delta: String,
    },
    /// A streamed message finished; `text` is the full concatenation.
    MessageComplete {
        /// Message that completed.
        id: MessageId,
        /// Complete response text in arrival order.
        text: String,
    },
    /// A streamed message failed.
    ///
    /// Reasons include backend-reported errors, `"stalled"` for responses
    /// that went quiet, and `"connection lost"` for transport drops.
    MessageFailed {
        /// Message that failed.
        id: MessageId,
        /// Human-readable failure reason.
        reason: String,
    },
}
