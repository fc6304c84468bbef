//! Duplex transport collaborator contract.
//!
//! A socket does not speak any wire protocol below the message level. It
//! asks a [`Transport`] to open message-oriented connections (a WebSocket
//! in the usual deployment) and consumes their lifecycle events from a
//! channel:
//!
//! ```text
//! Socket ──open()──▶ Transport ──▶ Box<dyn Connection>   (send / close / ready_state)
//!    ▲                                  │
//!    └──── flume::Receiver<TransportEvent> ◀── Open / Message / Error / Close
//! ```
//!
//! Implementations must report events through the channel, never by
//! calling back into the socket. A channel that disconnects without a
//! `Close` event is treated as a close.

use crate::error::TransportError;
use crate::payload::Payload;
use std::fmt;

/// Connection lifecycle, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ReadyState {
    /// Closing or closed: the connection will never carry data again.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Event emitted by a connection.
#[derive(Debug)]
pub enum TransportEvent {
    /// The connection reached `Open`
    Open,
    /// An inbound frame
    Message(Payload),
    /// A non-fatal transport error
    Error(TransportError),
    /// The connection closed; no more events follow
    Close,
}

/// Receiving side of a connection's event stream.
pub type TransportEvents = flume::Receiver<TransportEvent>;

/// Sending side, held by transport implementations.
pub type TransportEventSender = flume::Sender<TransportEvent>;

/// What a socket asks for when opening a connection.
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest<'a> {
    pub address: &'a str,
    /// WebSocket sub-protocol to negotiate
    pub subprotocol: &'static str,
    /// Whether binary frames should be surfaced as bytes
    pub binary: bool,
}

/// One open (or opening) duplex connection.
pub trait Connection {
    /// Send one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be handed to the transport.
    fn send(&self, frame: Payload) -> Result<(), TransportError>;

    /// Current lifecycle state.
    fn ready_state(&self) -> ReadyState;

    /// Begin closing. Completion is reported with a `Close` event.
    fn close(&self);
}

/// Factory for connections.
pub trait Transport {
    /// Create a connection to `request.address`.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the connection cannot even be constructed
    /// (bad address, refused). Asynchronous failures arrive as events.
    fn open(
        &self,
        request: &OpenRequest<'_>,
    ) -> Result<(Box<dyn Connection>, TransportEvents), TransportError>;
}

/// Create an event channel pair for a transport implementation.
#[must_use]
pub fn event_channel() -> (TransportEventSender, TransportEvents) {
    flume::unbounded()
}
