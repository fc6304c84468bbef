//! Socket event monitoring.
//!
//! Provides event streams for tracking connection lifecycle: establishment,
//! failures, losses and scheduled reconnects.

use std::fmt;
use std::time::Duration;

/// Connection lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A transport is being created for the address.
    Connecting(String),

    /// The transport for the address reached OPEN.
    Connected(String),

    /// The transport could not be constructed.
    ConnectFailed { address: String, reason: String },

    /// A registered address lost its transport unexpectedly.
    Disconnected(String),

    /// A new attempt for the address is scheduled after `delay`.
    Reconnecting {
        address: String,
        delay: Duration,
        attempt: u32,
    },

    /// The address was removed from the socket.
    Removed(String),
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting(address) => write!(f, "Connecting to {address}"),
            Self::Connected(address) => write!(f, "Connected to {address}"),
            Self::ConnectFailed { address, reason } => {
                write!(f, "Connect failed for {address}: {reason}")
            }
            Self::Disconnected(address) => write!(f, "Disconnected from {address}"),
            Self::Reconnecting {
                address,
                delay,
                attempt,
            } => write!(f, "Reconnecting to {address} in {delay:?} (attempt {attempt})"),
            Self::Removed(address) => write!(f, "Removed {address}"),
        }
    }
}

/// Handle for receiving socket events.
pub type SocketMonitor = flume::Receiver<SocketEvent>;

/// Internal sender for socket events.
pub type SocketEventSender = flume::Sender<SocketEvent>;

/// Creates a new monitoring channel pair.
#[must_use]
pub fn create_monitor() -> (SocketEventSender, SocketMonitor) {
    flume::unbounded()
}
