//! Connection lifecycle states.

use std::fmt;

/// Lifecycle state of the managed connection.
///
/// Exactly one instance exists per client, owned and mutated only by the
/// connection manager; consumers observe immutable snapshots through the
/// event surface and the state watch channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none being attempted.
    Disconnected,
    /// A handshake is in progress.
    Connecting,
    /// The connection is open and usable.
    Connected,
    /// The connection dropped; reconnect attempts are scheduled.
    Reconnecting,
    /// The reconnect attempt cap was exhausted; manual recovery required.
    Failed,
}

impl ConnectionState {
    /// Whether requests can be sent in this state.
    #[must_use]
    pub const fn is_connected(self) -> bool { matches!(self, Self::Connected) }

    /// Whether an explicit connect call is accepted in this state.
    #[must_use]
    pub const fn accepts_connect(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
