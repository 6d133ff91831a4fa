//! Reassembly of streamed response fragments into coherent messages.
//!
//! [`ReassemblyBuffer`] accumulates ordered text fragments keyed by
//! [`MessageId`](crate::frame::MessageId) until a completion or failure
//! signal arrives. Completion and failure are explicitly two-phase: the
//! entry is first marked resolved so the batching layer can flush any
//! trailing delta, then evicted by the caller. The buffer is transport
//! agnostic and uses explicit clock readings so tests stay deterministic.

mod buffer;
mod error;
mod pending;

pub use buffer::{ChunkOutcome, ReassemblyBuffer};
pub use error::AssemblyError;
pub use pending::{MessageState, PendingMessage};
