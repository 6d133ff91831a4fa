//! Stateful buffer stitching chunk frames back into complete messages.

use std::{
    collections::{HashMap, hash_map::Entry},
    time::{Duration, Instant},
};

use log::{debug, warn};

use super::{AssemblyError, MessageState, PendingMessage};
use crate::frame::MessageId;

/// Result of feeding one chunk into the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// The chunk was appended to a streaming message.
    Appended,
    /// The chunk opened a new streaming message.
    Opened,
    /// The chunk arrived for an already resolved message and was dropped.
    IgnoredResolved,
    /// The chunk would open a new message beyond the in-flight cap.
    RejectedAtCapacity,
}

/// Accumulates ordered text fragments per message identifier.
///
/// At most one [`PendingMessage`] exists per identifier, and the total
/// number of unresolved entries is bounded by the configured in-flight cap.
/// Resolution is two-phase: [`on_complete`](Self::on_complete) and
/// [`on_error`](Self::on_error) mark the entry resolved and leave it in
/// place so the caller can flush trailing deltas before calling
/// [`evict`](Self::evict).
#[derive(Debug)]
pub struct ReassemblyBuffer {
    pending: HashMap<MessageId, PendingMessage>,
    max_in_flight: usize,
    stall_timeout: Duration,
}

impl ReassemblyBuffer {
    /// Create a buffer bounded by `max_in_flight` unresolved messages,
    /// declaring a streaming message stalled after `stall_timeout` without
    /// chunk arrivals.
    #[must_use]
    pub fn new(max_in_flight: usize, stall_timeout: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            max_in_flight,
            stall_timeout,
        }
    }

    /// Register the identifier of a request about to be sent.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::InFlightLimit`] when the cap is reached and
    /// [`AssemblyError::DuplicateId`] when the identifier is already in
    /// flight.
    pub fn register(&mut self, id: MessageId) -> Result<(), AssemblyError> {
        self.register_at(id, Instant::now())
    }

    /// Register with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn register_at(&mut self, id: MessageId, now: Instant) -> Result<(), AssemblyError> {
        if self.pending.len() >= self.max_in_flight {
            return Err(AssemblyError::InFlightLimit {
                limit: self.max_in_flight,
            });
        }
        match self.pending.entry(id) {
            Entry::Occupied(occupied) => Err(AssemblyError::DuplicateId {
                id: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                let id = vacant.key().clone();
                vacant.insert(PendingMessage::new(id, now));
                Ok(())
            }
        }
    }

    /// Feed one chunk into the buffer using the current time.
    pub fn on_chunk(&mut self, id: &MessageId, content: &str) -> ChunkOutcome {
        self.on_chunk_at(id, content, Instant::now())
    }

    /// Feed one chunk with an explicit clock reading.
    ///
    /// A chunk for an unknown identifier opens a new streaming entry,
    /// subject to the in-flight cap; a chunk for a resolved entry is a
    /// protocol violation that is logged and dropped.
    pub fn on_chunk_at(&mut self, id: &MessageId, content: &str, now: Instant) -> ChunkOutcome {
        if let Some(pending) = self.pending.get_mut(id) {
            if pending.state() != MessageState::Streaming {
                warn!("chunk after resolution dropped: id={id}, state={:?}", pending.state());
                return ChunkOutcome::IgnoredResolved;
            }
            pending.append(content, now);
            return ChunkOutcome::Appended;
        }

        if self.pending.len() >= self.max_in_flight {
            warn!(
                "chunk for unknown message rejected at capacity: id={id}, limit={}",
                self.max_in_flight
            );
            return ChunkOutcome::RejectedAtCapacity;
        }

        let mut pending = PendingMessage::new(id.clone(), now);
        pending.append(content, now);
        self.pending.insert(id.clone(), pending);
        ChunkOutcome::Opened
    }

    /// Mark a streaming message completed and return its full text.
    ///
    /// The entry stays in the buffer until [`evict`](Self::evict) so the
    /// batching layer can flush trailing deltas first. Returns `None` for
    /// unknown or already resolved identifiers (logged, not fatal).
    pub fn on_complete(&mut self, id: &MessageId) -> Option<String> {
        match self.pending.get_mut(id) {
            Some(pending) if pending.state() == MessageState::Streaming => {
                pending.complete();
                Some(pending.text().to_owned())
            }
            Some(pending) => {
                warn!("completion after resolution ignored: id={id}, state={:?}", pending.state());
                None
            }
            None => {
                debug!("completion for unknown message ignored: id={id}");
                None
            }
        }
    }

    /// Mark a streaming message failed with `reason`.
    ///
    /// Returns `true` when a streaming entry transitioned; unknown or
    /// already resolved identifiers are logged and ignored.
    pub fn on_error(&mut self, id: &MessageId, reason: impl Into<String>) -> bool {
        match self.pending.get_mut(id) {
            Some(pending) if pending.state() == MessageState::Streaming => {
                pending.fail(reason);
                true
            }
            Some(pending) => {
                warn!("failure after resolution ignored: id={id}, state={:?}", pending.state());
                false
            }
            None => {
                debug!("failure for unknown message ignored: id={id}");
                false
            }
        }
    }

    /// Fail every streaming message, returning the affected identifiers.
    ///
    /// Used when the transport drops so in-flight messages are never left
    /// silently dangling.
    pub fn fail_all(&mut self, reason: &str) -> Vec<MessageId> {
        let mut failed: Vec<MessageId> = Vec::new();
        for (id, pending) in &mut self.pending {
            if pending.state() == MessageState::Streaming {
                pending.fail(reason);
                failed.push(id.clone());
            }
        }
        failed.sort();
        failed
    }

    /// Fail streaming messages that have gone quiet using the current time.
    pub fn sweep_stalled(&mut self) -> Vec<MessageId> { self.sweep_stalled_at(Instant::now()) }

    /// Fail streaming messages that have gone quiet, with an explicit clock
    /// reading.
    ///
    /// A message stalls when no chunk has arrived within the configured
    /// stall timeout. Stalled entries transition to failed with reason
    /// `"stalled"` and await eviction like any other failure.
    pub fn sweep_stalled_at(&mut self, now: Instant) -> Vec<MessageId> {
        let timeout = self.stall_timeout;
        let mut stalled: Vec<MessageId> = Vec::new();
        for (id, pending) in &mut self.pending {
            if pending.is_stalled(now, timeout) {
                pending.fail("stalled");
                stalled.push(id.clone());
            }
        }
        stalled.sort();
        stalled
    }

    /// Remove a resolved entry, completing the two-phase resolution.
    pub fn evict(&mut self, id: &MessageId) -> Option<PendingMessage> { self.pending.remove(id) }

    /// Look up the state of an identifier.
    #[must_use]
    pub fn state_of(&self, id: &MessageId) -> Option<MessageState> {
        self.pending.get(id).map(PendingMessage::state)
    }

    /// Number of entries currently held, resolved entries included.
    #[must_use]
    pub fn len(&self) -> usize { self.pending.len() }

    /// Whether the buffer holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.pending.is_empty() }
}
