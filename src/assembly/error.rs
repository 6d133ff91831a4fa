//! Errors raised by the reassembly buffer.

use thiserror::Error;

use crate::frame::MessageId;

/// Errors produced when registering a new in-flight message.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    /// The configured in-flight cap is already reached.
    #[error("in-flight message limit reached: {limit}")]
    InFlightLimit { limit: usize },
    /// An unresolved message with this identifier already exists.
    #[error("message identifier already in flight: {id}")]
    DuplicateId { id: MessageId },
}
