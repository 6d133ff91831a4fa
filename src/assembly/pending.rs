//! A single in-flight streamed response.

use std::time::Instant;

use crate::frame::MessageId;

/// Lifecycle state of a pending message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageState {
    /// Fragments are still arriving.
    Streaming,
    /// The backend signalled completion; awaiting final flush and eviction.
    Completed,
    /// The message failed; awaiting final flush and eviction.
    Failed,
}

/// A server-streamed response being assembled, or just resolved.
///
/// Owned exclusively by the [`ReassemblyBuffer`](super::ReassemblyBuffer);
/// created on send registration or first chunk and destroyed on eviction
/// after the final flush.
#[derive(Clone, Debug)]
pub struct PendingMessage {
    id: MessageId,
    text: String,
    state: MessageState,
    created_at: Instant,
    last_activity_at: Instant,
    failure_reason: Option<String>,
}

impl PendingMessage {
    pub(super) fn new(id: MessageId, now: Instant) -> Self {
        Self {
            id,
            text: String::new(),
            state: MessageState::Streaming,
            created_at: now,
            last_activity_at: now,
            failure_reason: None,
        }
    }

    pub(super) fn append(&mut self, content: &str, now: Instant) {
        self.text.push_str(content);
        self.last_activity_at = now;
    }

    pub(super) fn complete(&mut self) { self.state = MessageState::Completed; }

    pub(super) fn fail(&mut self, reason: impl Into<String>) {
        self.state = MessageState::Failed;
        self.failure_reason = Some(reason.into());
    }

    pub(super) fn is_stalled(&self, now: Instant, timeout: std::time::Duration) -> bool {
        matches!(self.state, MessageState::Streaming)
            && now.saturating_duration_since(self.last_activity_at) >= timeout
    }

    /// Identifier shared by all fragments of this message.
    #[must_use]
    pub fn id(&self) -> &MessageId { &self.id }

    /// Text accumulated so far, in arrival order.
    #[must_use]
    pub fn text(&self) -> &str { &self.text }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> MessageState { self.state }

    /// When the entry was created.
    #[must_use]
    pub const fn created_at(&self) -> Instant { self.created_at }

    /// Failure reason, present once the message has failed.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> { self.failure_reason.as_deref() }
}
