//! # nanows
//!
//! Client-side nanomsg scalability protocols (REQ, PAIR, SUB, BUS) over a
//! message-oriented duplex transport such as WebSocket.
//!
//! ## Architecture
//!
//! - **`nanows-core`**: framing, correlation, listener fan-out, registry and
//!   the transport contract; no scheduling of its own
//! - **`nanows`**: the [`Socket`] facade, driven by the compio runtime
//!   (this crate)
//!
//! ## Protocols
//!
//! | Protocol | send | reply | wire header |
//! |----------|------|-------|-------------|
//! | REQ      | yes  | `Reply` | 4-byte correlation seed |
//! | PAIR     | yes  | `Reply` | none |
//! | SUB      | no   | -     | none |
//! | BUS      | yes  | -     | none |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nanows::prelude::*;
//!
//! #[compio::main]
//! async fn main() -> nanows::Result<()> {
//!     let transport = MemTransport::new().auto_accept();
//!     let socket = Socket::new(SocketOptions::new(Protocol::Bus), transport);
//!
//!     socket.on_data(|payload| println!("bus: {}", payload.to_text_lossy()));
//!     socket.connect("wss://a.example").await?;
//!     socket.connect("wss://b.example").await?;
//!
//!     // Broadcast to both peers, answers arrive through the data listener.
//!     socket.send("hello")?;
//!     Ok(())
//! }
//! ```
//!
//! Connections that drop are re-established after
//! [`SocketOptions::reconnect_time`] for as long as their address stays
//! connected; [`Socket::disconnect`] is what stops that.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dev_tracing;
mod socket;

pub use socket::Socket;

// Re-export core types
pub use bytes::Bytes;
pub use nanows_core::codec::CorrelationSeed;
pub use nanows_core::correlator::Reply;
pub use nanows_core::dispatcher::{EventKind, Notification};
pub use nanows_core::error::{NanoError, Result, TransportError};
pub use nanows_core::monitor::{SocketEvent, SocketMonitor};
pub use nanows_core::options::{ReplyMatching, SocketOptions};
pub use nanows_core::payload::Payload;
pub use nanows_core::protocol::Protocol;

/// Transport contract and the in-memory transport.
pub mod transport {
    pub use nanows_core::mem::{MemPeer, MemTransport};
    pub use nanows_core::transport::{
        event_channel, Connection, OpenRequest, ReadyState, Transport, TransportEvent,
        TransportEventSender, TransportEvents,
    };
}

/// Convenient imports.
///
/// # Example
///
/// ```rust
/// use nanows::prelude::*;
///
/// // Now you have:
/// // - Socket, SocketOptions, Protocol, Payload
/// // - MemTransport / Transport for wiring a socket up
/// ```
pub mod prelude {
    pub use super::transport::{MemPeer, MemTransport, Transport};
    pub use super::{
        EventKind, NanoError, Notification, Payload, Protocol, Reply, Socket, SocketOptions,
    };
    pub use bytes::Bytes;
}
