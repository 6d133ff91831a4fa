//! Wire frames and the JSON codec for the chat protocol.
//!
//! The protocol is a small set of JSON text frames tagged by a `type` field.
//! Outbound and inbound frames are separate enums so write-only tags
//! (`text_message`, `ping`) can never be decoded and read-only tags
//! (`chunk`, `complete`, `error`, `pong`) can never be encoded. Both
//! directions are pure transforms with no side effects.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque identifier correlating a request with its streamed response.
///
/// Identifiers are caller-generated for outbound requests and echoed by the
/// backend on every inbound frame belonging to the same message. They must be
/// unique per in-flight request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an existing identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

    /// Generate a fresh random identifier.
    #[must_use]
    pub fn fresh() -> Self { Self(uuid::Uuid::new_v4().to_string()) }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    /// Return whether the identifier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self { Self(id.to_owned()) }
}

/// Frames written by this client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// A user text request expecting a streamed response.
    TextMessage { id: MessageId, content: String },
    /// Liveness probe sent by the health monitor.
    Ping,
}

/// Frames read from the backend.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// An incremental fragment of a streamed response.
    Chunk { id: MessageId, content: String },
    /// The response identified by `id` has finished streaming.
    Complete { id: MessageId },
    /// The backend failed the response identified by `id`.
    ///
    /// The `reason` field is not guaranteed by every backend; absence
    /// degrades to a generic failure reason at the consumer boundary.
    Error {
        id: MessageId,
        #[serde(default)]
        reason: Option<String>,
    },
    /// Reply to a liveness probe.
    Pong,
}

/// Errors raised while validating or serialising an outbound frame.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The message identifier was empty.
    #[error("message identifier must not be empty")]
    EmptyId,
    /// The message content was empty after trimming whitespace.
    #[error("message content must not be empty")]
    EmptyContent,
    /// The message content exceeded the configured ceiling.
    #[error("message content too long: {length} characters, limit {limit}")]
    ContentTooLong { length: usize, limit: usize },
    /// Serialisation failed.
    #[error("failed to serialise frame: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Error raised when an inbound payload cannot be decoded.
///
/// Carries the raw payload so callers can log it for diagnosis. Decoding
/// failures are protocol errors, not connection faults: the caller logs the
/// payload and drops the frame.
#[derive(Debug, Error)]
#[error("malformed or unrecognised frame: {source}")]
pub struct DecodeError {
    raw: String,
    source: serde_json::Error,
}

impl DecodeError {
    /// The raw payload that failed to decode.
    #[must_use]
    pub fn raw(&self) -> &str { &self.raw }
}

/// A validated outbound text request.
///
/// Validation happens on construction so invalid requests are rejected
/// before any encoding or network activity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundRequest {
    id: MessageId,
    content: String,
}

impl OutboundRequest {
    /// Validate and build a request.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::EmptyId`] when the identifier is empty,
    /// [`EncodeError::EmptyContent`] when the content is empty after
    /// trimming, and [`EncodeError::ContentTooLong`] when the content
    /// exceeds `max_len` characters.
    pub fn new(
        id: MessageId,
        content: impl Into<String>,
        max_len: usize,
    ) -> Result<Self, EncodeError> {
        let content = content.into();
        if id.is_empty() {
            return Err(EncodeError::EmptyId);
        }
        if content.trim().is_empty() {
            return Err(EncodeError::EmptyContent);
        }
        let length = content.chars().count();
        if length > max_len {
            return Err(EncodeError::ContentTooLong {
                length,
                limit: max_len,
            });
        }
        Ok(Self { id, content })
    }

    /// Identifier assigned to this request.
    #[must_use]
    pub fn id(&self) -> &MessageId { &self.id }

    /// The validated message content.
    #[must_use]
    pub fn content(&self) -> &str { &self.content }
}

impl From<OutboundRequest> for OutboundFrame {
    fn from(request: OutboundRequest) -> Self {
        Self::TextMessage {
            id: request.id,
            content: request.content,
        }
    }
}

/// Serialise an outbound frame to its JSON text representation.
///
/// # Errors
///
/// Returns [`EncodeError::Serialize`] if serialisation fails.
pub fn encode(frame: &OutboundFrame) -> Result<String, EncodeError> {
    Ok(serde_json::to_string(frame)?)
}

/// Parse an inbound payload into a typed frame.
///
/// Only the tags `chunk`, `complete`, `error`, and `pong` are recognised;
/// any other tag, or a structurally malformed payload, yields a
/// [`DecodeError`] carrying the raw text.
///
/// # Errors
///
/// Returns [`DecodeError`] when the payload is not one of the recognised
/// frame shapes.
pub fn decode(raw: &str) -> Result<InboundFrame, DecodeError> {
    serde_json::from_str(raw).map_err(|source| DecodeError {
        raw: raw.to_owned(),
        source,
    })
}
