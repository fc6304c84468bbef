//! In-memory transport.
//!
//! Keeps both ends of every connection inside the process, with no network
//! and no handshake. The far end of each connection is a [`MemPeer`] that
//! tests drive by hand and inspect afterwards.
//!
//! # Usage
//!
//! ```rust
//! use nanows_core::mem::MemTransport;
//! use nanows_core::transport::{OpenRequest, ReadyState, Transport, TransportEvent};
//!
//! let transport = MemTransport::new();
//! let request = OpenRequest { address: "wss://a", subprotocol: "pair.sp.nanomsg.org", binary: false };
//! let (conn, events) = transport.open(&request).unwrap();
//!
//! let peer = transport.last_peer("wss://a").unwrap();
//! peer.accept();
//! assert_eq!(conn.ready_state(), ReadyState::Open);
//! assert!(matches!(events.try_recv(), Ok(TransportEvent::Open)));
//! ```

use crate::error::TransportError;
use crate::payload::Payload;
use crate::transport::{
    event_channel, Connection, OpenRequest, ReadyState, Transport, TransportEvent,
    TransportEventSender, TransportEvents,
};
use hashbrown::HashMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Default)]
struct MemState {
    peers: HashMap<String, Vec<MemPeer>>,
    refusals: HashMap<String, usize>,
    auto_accept: bool,
    opened: usize,
}

/// In-memory transport handle. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemTransport {
    state: Rc<RefCell<MemState>>,
}

impl MemTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make new connections open as soon as they are created.
    #[must_use]
    pub fn auto_accept(self) -> Self {
        self.state.borrow_mut().auto_accept = true;
        self
    }

    /// Make the next `count` opens of `address` fail synchronously.
    pub fn refuse_next(&self, address: &str, count: usize) {
        *self
            .state
            .borrow_mut()
            .refusals
            .entry(address.to_string())
            .or_insert(0) += count;
    }

    /// Every peer ever created for `address`, oldest first.
    pub fn peers(&self, address: &str) -> Vec<MemPeer> {
        self.state
            .borrow()
            .peers
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    /// Most recently created peer for `address`.
    pub fn last_peer(&self, address: &str) -> Option<MemPeer> {
        self.state
            .borrow()
            .peers
            .get(address)
            .and_then(|peers| peers.last().cloned())
    }

    /// Total number of successful `open` calls.
    pub fn open_count(&self) -> usize {
        self.state.borrow().opened
    }
}

impl Transport for MemTransport {
    fn open(
        &self,
        request: &OpenRequest<'_>,
    ) -> Result<(Box<dyn Connection>, TransportEvents), TransportError> {
        if request.address.is_empty() {
            return Err(TransportError::InvalidAddress(
                "address cannot be empty".to_string(),
            ));
        }

        let mut state = self.state.borrow_mut();
        if let Some(remaining) = state.refusals.get_mut(request.address) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::refused(request.address));
            }
        }

        let (tx, rx) = event_channel();
        let peer = MemPeer {
            inner: Rc::new(PeerInner {
                address: request.address.to_string(),
                subprotocol: request.subprotocol,
                binary: request.binary,
                state: Cell::new(ReadyState::Connecting),
                sent: RefCell::new(Vec::new()),
                events: tx,
            }),
        };

        state.opened += 1;
        state
            .peers
            .entry(request.address.to_string())
            .or_default()
            .push(peer.clone());
        let auto_accept = state.auto_accept;
        drop(state);

        if auto_accept {
            peer.accept();
        }

        Ok((Box::new(MemConnection { peer }), rx))
    }
}

struct PeerInner {
    address: String,
    subprotocol: &'static str,
    binary: bool,
    state: Cell<ReadyState>,
    sent: RefCell<Vec<Payload>>,
    events: TransportEventSender,
}

/// Far end of an in-memory connection.
#[derive(Clone)]
pub struct MemPeer {
    inner: Rc<PeerInner>,
}

impl MemPeer {
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Sub-protocol the socket asked for.
    pub fn subprotocol(&self) -> &'static str {
        self.inner.subprotocol
    }

    /// Whether the socket asked for binary receive mode.
    pub fn binary(&self) -> bool {
        self.inner.binary
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.state.get()
    }

    /// Complete the opening handshake.
    pub fn accept(&self) {
        if self.ready_state() == ReadyState::Connecting {
            self.inner.state.set(ReadyState::Open);
            self.emit(TransportEvent::Open);
        }
    }

    /// Push an inbound frame to the socket. Returns false unless open.
    pub fn deliver(&self, frame: impl Into<Payload>) -> bool {
        if self.ready_state() != ReadyState::Open {
            return false;
        }
        self.emit(TransportEvent::Message(frame.into()));
        true
    }

    /// Report a transport error without closing.
    pub fn fail(&self, reason: &str) {
        self.emit(TransportEvent::Error(TransportError::other(reason)));
    }

    /// Start closing from the far end without completing the close yet.
    pub fn begin_close(&self) {
        if !self.ready_state().is_terminal() {
            self.inner.state.set(ReadyState::Closing);
        }
    }

    /// Close the connection from the far end.
    pub fn drop_connection(&self) {
        if self.ready_state() != ReadyState::Closed {
            self.inner.state.set(ReadyState::Closed);
            self.emit(TransportEvent::Close);
        }
    }

    /// Frames the socket sent on this connection, in order.
    pub fn sent(&self) -> Vec<Payload> {
        self.inner.sent.borrow().clone()
    }

    fn emit(&self, event: TransportEvent) {
        // The socket may already be gone.
        let _ = self.inner.events.send(event);
    }
}

struct MemConnection {
    peer: MemPeer,
}

impl Connection for MemConnection {
    fn send(&self, frame: Payload) -> Result<(), TransportError> {
        if self.peer.ready_state() != ReadyState::Open {
            return Err(TransportError::Closed);
        }
        self.peer.inner.sent.borrow_mut().push(frame);
        Ok(())
    }

    fn ready_state(&self) -> ReadyState {
        self.peer.ready_state()
    }

    fn close(&self) {
        match self.peer.ready_state() {
            ReadyState::Connecting | ReadyState::Open => {
                self.peer.inner.state.set(ReadyState::Closing);
                self.peer.drop_connection();
            }
            ReadyState::Closing => self.peer.drop_connection(),
            ReadyState::Closed => {}
        }
    }
}
