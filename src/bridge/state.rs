use std::fmt;

/// Whether the bridge currently holds a live broker connection.
///
/// Only session events move this value; the dispatcher reads it but never
/// sets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("DISCONNECTED"),
            ConnectionState::Connected => f.write_str("CONNECTED"),
        }
    }
}

/// Where `publish` sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Handed to the ready producer; the send completes in the background.
    Direct,
    /// Held in the pending buffer. `reconnect` tells whether this publish
    /// started a reconnect attempt (false when one was already in flight or
    /// the connection is up and only the producer is still warming up).
    Buffered { reconnect: bool },
}
