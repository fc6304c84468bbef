//! nanows Core
//!
//! This crate contains the transport-agnostic building blocks:
//! - Protocol enumeration and capabilities (`protocol`)
//! - Text/binary payloads (`payload`)
//! - REQ correlation header codec (`codec`)
//! - Single-slot request correlation (`correlator`)
//! - Listener fan-out (`dispatcher`)
//! - Address registry with generation-tagged entries (`registry`)
//! - Fixed-delay reconnect policy (`reconnect`) and deadline timers (`timer`)
//! - Transport collaborator traits (`transport`) and an in-memory transport (`mem`)
//! - Lifecycle monitoring (`monitor`), options and error types

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::match_same_arms)]
pub mod codec;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod mem;
pub mod monitor;
pub mod options;
pub mod payload;
pub mod protocol;
pub mod reconnect;
pub mod registry;
pub mod timer;
pub mod transport;

// Optional: a small prelude to make downstream crates ergonomic.
// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::codec::{CorrelationSeed, FrameCodec};
    pub use crate::correlator::{Reply, RequestCorrelator};
    pub use crate::dispatcher::{EventDispatcher, EventKind, Listener, Notification};
    pub use crate::error::{NanoError, Result, TransportError};
    pub use crate::mem::{MemPeer, MemTransport};
    pub use crate::monitor::{SocketEvent, SocketMonitor};
    pub use crate::options::{ReplyMatching, SocketOptions};
    pub use crate::payload::Payload;
    pub use crate::protocol::Protocol;
    pub use crate::reconnect::ReconnectState;
    pub use crate::registry::{Generation, Registry};
    pub use crate::transport::{Connection, OpenRequest, ReadyState, Transport, TransportEvent};
}
