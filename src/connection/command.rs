//! Commands and caller-facing errors for the client handle.
//!
//! `send` and `connect` are round trips through the manager's command
//! channel: the serialized loop performs the authoritative capability
//! checks and replies through a oneshot. No request is ever queued while
//! the connection is down; the caller decides whether to retry.

use thiserror::Error;
use tokio::sync::oneshot;

use super::ConnectionState;
use crate::{
    assembly::AssemblyError,
    frame::{EncodeError, MessageId},
    transport::TransportError,
};

/// Work items processed on the manager's serialized loop.
#[derive(Debug)]
pub(super) enum Command {
    /// Send a text request, replying with the assigned identifier.
    Send {
        content: String,
        reply: oneshot::Sender<Result<MessageId, SendError>>,
    },
    /// Establish a connection from a resting state.
    Connect {
        reply: oneshot::Sender<Result<(), ConnectError>>,
    },
}

/// The requested operation is not available in the current state.
///
/// Returned synchronously; nothing is queued and no frame reaches the
/// wire.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// Sending requires an open connection.
    #[error("client is not connected: state={state}")]
    NotConnected {
        /// State at the time the command was processed.
        state: ConnectionState,
    },
    /// The outbound rate cap was exceeded.
    #[error("send rate limit exceeded")]
    RateLimited,
}

/// Errors returned from [`ChatClient::send`](super::ChatClient::send).
#[derive(Debug, Error)]
pub enum SendError {
    /// The client cannot accept the request right now.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    /// The in-flight cap or identifier invariants rejected the request.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    /// The request failed validation or serialisation.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// The write failed; the connection is being re-established.
    #[error("transport write failed: {0}")]
    Transport(#[from] TransportError),
    /// The client task stopped before replying.
    #[error("client stopped")]
    ClientClosed,
}

/// Errors returned from [`ChatClient::connect`](super::ChatClient::connect).
#[derive(Debug, Error)]
pub enum ConnectError {
    /// A connection attempt is already in progress or established.
    #[error("connection attempt already in progress: state={state}")]
    InProgress {
        /// State at the time the command was processed.
        state: ConnectionState,
    },
    /// The dial or handshake failed; automatic retries continue.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The client task stopped before replying.
    #[error("client stopped")]
    ClientClosed,
}
