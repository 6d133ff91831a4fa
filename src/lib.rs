#![doc(html_root_url = "https://docs.rs/chatwire/latest")]
//! Public API for the `chatwire` library.
//!
//! This crate provides a resilient streaming chat client: a persistent
//! WebSocket connection with automatic reconnection, ping/pong health
//! monitoring, streamed-fragment reassembly, and batched delta delivery to a
//! consumer such as a UI layer.

pub mod assembly;
pub mod backoff;
pub mod batch;
pub mod config;
pub mod connection;
pub mod frame;
pub mod health;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod transport;

pub use assembly::{AssemblyError, ChunkOutcome, MessageState, ReassemblyBuffer};
pub use backoff::RetrySchedule;
pub use batch::Batcher;
pub use config::{ClientConfig, SendRateLimit};
pub use connection::{
    CapabilityError,
    ChatClient,
    ClientEvent,
    ConnectError,
    ConnectionState,
    SendError,
};
pub use frame::{DecodeError, EncodeError, InboundFrame, MessageId, OutboundFrame, OutboundRequest};
pub use health::{HealthAction, HealthMonitor};
pub use transport::{Connector, Transport, TransportError, WsConnector, WsTransport};
