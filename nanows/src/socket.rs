//! Client socket.
//!
//! A `Socket` multiplexes any number of named transport connections,
//! frames outbound payloads for its protocol, correlates one in-flight
//! request with the next inbound frame, and fans inbound traffic out to
//! listeners.
//!
//! # Architecture
//!
//! ```text
//! Socket (Rc<RefCell<Shared>>)
//!   ├─ Registry<Box<dyn Connection>>   address → transport, generation-tagged
//!   ├─ FrameCodec / RequestCorrelator / EventDispatcher
//!   └─ per connection: event pump task (Weak<Shared>)
//!         Open    → resolve connect()
//!         Message → unframe → pending reply → data listeners
//!         Error   → error listeners
//!         Close   → reconnect after `reconnect_time` if still registered → end listeners
//! ```
//!
//! Everything runs on the current compio runtime thread. Pumps and retry
//! timers only hold weak references, so dropping the last `Socket` handle
//! stops them and closes every live transport.

use nanows_core::codec::{CorrelationSeed, FrameCodec};
use nanows_core::correlator::{Reply, RequestCorrelator};
use nanows_core::dispatcher::{notify, EventDispatcher, EventKind, Listener, Notification};
use nanows_core::error::{NanoError, Result, TransportError};
use nanows_core::monitor::{create_monitor, SocketEvent, SocketEventSender, SocketMonitor};
use nanows_core::options::{ReplyMatching, SocketOptions};
use nanows_core::payload::Payload;
use nanows_core::protocol::Protocol;
use nanows_core::registry::{Generation, Link, Registry};
use nanows_core::timer;
use nanows_core::transport::{
    Connection, OpenRequest, ReadyState, Transport, TransportEvent, TransportEvents,
};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use tracing::{trace, warn};

/// Lifecycle logging: `debug` when the socket's debug option is on,
/// `trace` otherwise.
macro_rules! lifecycle {
    ($debug:expr, $($arg:tt)+) => {
        if $debug {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    };
}

struct Shared {
    options: SocketOptions,
    transport: Rc<dyn Transport>,
    codec: FrameCodec,
    registry: Registry<Box<dyn Connection>>,
    correlator: RequestCorrelator,
    dispatcher: EventDispatcher,
    monitor: Option<SocketEventSender>,
}

impl Shared {
    fn emit(&self, event: SocketEvent) {
        if let Some(monitor) = &self.monitor {
            let _ = monitor.send(event);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        for conn in self.registry.drain_live() {
            conn.close();
        }
    }
}

/// A nanomsg scalability-protocol client socket.
///
/// Cloning is cheap and yields another handle to the same socket, which is
/// how listeners get to call back into it.
///
/// # Example
///
/// ```rust,no_run
/// use nanows::prelude::*;
///
/// # async fn example(transport: MemTransport) -> nanows::Result<()> {
/// let socket = Socket::new(SocketOptions::new(Protocol::Req), transport);
/// socket.connect("wss://example.org/rpc").await?;
///
/// if let Some(reply) = socket.send("ping")? {
///     let pong = reply.await?;
///     println!("reply: {}", pong.to_text_lossy());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Socket {
    shared: Rc<RefCell<Shared>>,
}

impl Socket {
    /// Create a socket speaking `options.protocol` over `transport`.
    ///
    /// REQ sockets draw their correlation seed here, once.
    pub fn new(options: SocketOptions, transport: impl Transport + 'static) -> Self {
        let codec = FrameCodec::new(&options);
        Self::with_codec(options, Rc::new(transport), codec)
    }

    /// Create a socket with a caller-chosen correlation seed (REQ only).
    pub fn with_seed(
        options: SocketOptions,
        transport: impl Transport + 'static,
        seed: CorrelationSeed,
    ) -> Self {
        let codec = FrameCodec::with_seed(&options, Some(seed));
        Self::with_codec(options, Rc::new(transport), codec)
    }

    fn with_codec(options: SocketOptions, transport: Rc<dyn Transport>, codec: FrameCodec) -> Self {
        lifecycle!(
            options.debug,
            seed = ?codec.seed(),
            "[{}] socket created",
            options.protocol
        );

        let shared = Shared {
            registry: Registry::new(&options),
            correlator: RequestCorrelator::new(options.protocol.correlates_replies()),
            dispatcher: EventDispatcher::new(),
            monitor: None,
            codec,
            transport,
            options,
        };

        Self {
            shared: Rc::new(RefCell::new(shared)),
        }
    }

    /// Connect to `address`.
    ///
    /// The address is registered before this returns; the future completes
    /// when its transport first reaches OPEN, however many retries that
    /// takes. Connecting to an address that is already registered does
    /// nothing and completes immediately.
    ///
    /// Connection pumps and retry timers run on the current compio runtime,
    /// so this must be called from inside one.
    ///
    /// # Errors
    ///
    /// The future fails with:
    /// - `NanoError::ConnectAborted` if the address is disconnected before
    ///   it opens
    /// - `NanoError::Configuration` when called outside a compio runtime;
    ///   nothing is registered in that case
    pub fn connect(&self, address: impl Into<String>) -> impl Future<Output = Result<()>> + 'static {
        let address = address.into();

        let opened = if compio::runtime::Runtime::try_current().is_none() {
            Err(NanoError::configuration(format!(
                "cannot connect {address}: no compio runtime is running"
            )))
        } else {
            let reserved = self.shared.borrow_mut().registry.reserve(&address);
            match reserved {
                Some((generation, opened)) => {
                    establish(&self.shared, &address, generation);
                    Ok(Some(opened))
                }
                None => {
                    trace!(address = %address, "already registered");
                    Ok(None)
                }
            }
        };

        async move {
            match opened {
                Err(err) => Err(err),
                Ok(None) => Ok(()),
                Ok(Some(opened)) => opened.await.map_err(|_| NanoError::ConnectAborted(address)),
            }
        }
    }

    /// Stop wanting `address`: remove it and close its transport.
    ///
    /// Removal is immediate; the transport close completes asynchronously
    /// and does not trigger a reconnect. Unknown addresses are ignored.
    pub fn disconnect(&self, address: &str) {
        let removed = {
            let mut shared = self.shared.borrow_mut();
            let removed = shared.registry.remove(address);
            if removed.is_some() {
                lifecycle!(
                    shared.options.debug,
                    address,
                    "[{}] disconnect",
                    shared.options.protocol
                );
                shared.emit(SocketEvent::Removed(address.to_string()));
            }
            removed
        };

        if let Some(Link::Live(conn)) = removed {
            conn.close();
        }
    }

    /// Send `payload` to every open connection.
    ///
    /// Returns `Some(Reply)` on REQ and PAIR sockets, `None` on BUS. A new
    /// send abandons any reply still pending from an earlier one.
    /// Connections found closing or closed are deregistered on the way.
    ///
    /// # Errors
    ///
    /// - `NanoError::Role` on SUB sockets
    /// - `NanoError::NotConnected` when no connection is registered
    pub fn send(&self, payload: impl Into<Payload>) -> Result<Option<Reply>> {
        let mut guard = self.shared.borrow_mut();
        let shared = &mut *guard;
        let protocol = shared.options.protocol;
        let debug = shared.options.debug;

        if !protocol.can_send() {
            return Err(NanoError::Role(protocol, "send"));
        }
        if shared.registry.live_len() == 0 {
            return Err(NanoError::NotConnected);
        }

        let frame = shared.codec.encode(payload.into());
        lifecycle!(debug, frame = ?frame, "[{}] send", protocol);

        let mut closed = Vec::new();
        let mut failures = Vec::new();
        for (address, conn) in shared.registry.live() {
            match conn.ready_state() {
                ReadyState::Open => {
                    if let Err(err) = conn.send(frame.clone()) {
                        warn!(address, error = %err, "[{}] send failed", protocol);
                        failures.push(err);
                    }
                }
                state if state.is_terminal() => closed.push(address.to_string()),
                ReadyState::Connecting | ReadyState::Closing | ReadyState::Closed => {}
            }
        }

        for address in closed {
            lifecycle!(
                debug,
                address = %address,
                "[{}] could not send, connection closed",
                protocol
            );
            shared.registry.remove(&address);
            shared.emit(SocketEvent::Removed(address));
        }

        let replacing = shared.correlator.has_pending();
        let reply = shared.correlator.begin(shared.options.request_timeout);
        if replacing {
            lifecycle!(
                debug,
                abandoned = shared.correlator.abandoned(),
                "[{}] unanswered request abandoned",
                protocol
            );
        }
        let listeners = if failures.is_empty() {
            Vec::new()
        } else {
            shared.dispatcher.snapshot(EventKind::Error)
        };
        drop(guard);

        for err in &failures {
            notify(&listeners, &Notification::Error(err));
        }
        Ok(reply)
    }

    /// Send and wait for the reply.
    ///
    /// # Errors
    ///
    /// Fails like [`Socket::send`], with `NanoError::Role` on protocols that
    /// do not correlate replies, and with `RequestTimeout` if configured.
    pub async fn request(&self, payload: impl Into<Payload>) -> Result<Payload> {
        let protocol = self.protocol();
        if !protocol.correlates_replies() {
            return Err(NanoError::Role(protocol, "request"));
        }
        match self.send(payload)? {
            Some(reply) => reply.await,
            None => Err(NanoError::Role(protocol, "request")),
        }
    }

    /// Server-side binding is not supported; always fails.
    ///
    /// # Errors
    ///
    /// Always returns `NanoError::Configuration`.
    pub fn bind(&self, address: &str) -> Result<()> {
        Err(NanoError::configuration(format!(
            "cannot bind {address}: {} sockets only connect",
            self.protocol()
        )))
    }

    /// Register a listener for one event category.
    pub fn on(&self, kind: EventKind, listener: impl Fn(&Notification<'_>) + 'static) {
        let listener: Listener = Rc::new(listener);
        self.shared.borrow_mut().dispatcher.register(kind, listener);
    }

    /// Register a listener by category name (`"data"`, `"end"`, `"error"`).
    ///
    /// Unknown names are ignored.
    pub fn on_named(&self, name: &str, listener: impl Fn(&Notification<'_>) + 'static) {
        match EventKind::parse(name) {
            Some(kind) => self.on(kind, listener),
            None => trace!(name, "ignoring listener for unknown event"),
        }
    }

    /// Register a listener for inbound payloads.
    pub fn on_data(&self, listener: impl Fn(&Payload) + 'static) {
        self.on(EventKind::Data, move |notification| {
            if let Notification::Data(payload) = notification {
                listener(payload);
            }
        });
    }

    /// Start monitoring lifecycle events.
    ///
    /// Replaces any previous monitor.
    pub fn monitor(&self) -> SocketMonitor {
        let (tx, rx) = create_monitor();
        self.shared.borrow_mut().monitor = Some(tx);
        rx
    }

    /// Protocol this socket speaks.
    pub fn protocol(&self) -> Protocol {
        self.shared.borrow().options.protocol
    }

    /// Copy of the socket's options.
    pub fn options(&self) -> SocketOptions {
        self.shared.borrow().options.clone()
    }

    /// The REQ correlation seed, `None` on other protocols.
    pub fn correlation_seed(&self) -> Option<CorrelationSeed> {
        self.shared.borrow().codec.seed()
    }

    /// Whether `address` is registered (connected, connecting or retrying).
    pub fn is_registered(&self, address: &str) -> bool {
        self.shared.borrow().registry.contains(address)
    }

    /// Number of registered addresses that currently hold a transport.
    pub fn connection_count(&self) -> usize {
        self.shared.borrow().registry.live_len()
    }

    /// Registered addresses, in no particular order.
    pub fn addresses(&self) -> Vec<String> {
        self.shared.borrow().registry.addresses()
    }

    /// Whether a sent request is still waiting for its reply.
    pub fn has_pending_request(&self) -> bool {
        self.shared.borrow().correlator.has_pending()
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.borrow();
        f.debug_struct("Socket")
            .field("protocol", &shared.options.protocol)
            .field("addresses", &shared.registry.addresses())
            .field("dispatcher", &shared.dispatcher)
            .finish()
    }
}

/// Create the transport for the current generation of `address`.
///
/// A synchronous failure parks the entry and schedules a retry.
fn establish(shared: &Rc<RefCell<Shared>>, address: &str, generation: Generation) {
    let (transport, protocol, binary, debug) = {
        let shared = shared.borrow();
        shared.emit(SocketEvent::Connecting(address.to_string()));
        (
            shared.transport.clone(),
            shared.options.protocol,
            shared.options.receive_binary,
            shared.options.debug,
        )
    };

    lifecycle!(debug, address, generation = generation.get(), "[{}] connect", protocol);

    let request = OpenRequest {
        address,
        subprotocol: protocol.subprotocol(),
        binary,
    };

    match transport.open(&request) {
        Ok((conn, events)) => {
            let attached = shared.borrow_mut().registry.attach(address, generation, conn);
            match attached {
                Ok(()) => {
                    let pump = pump(Rc::downgrade(shared), address.to_string(), generation, events);
                    compio::runtime::spawn(pump).detach();
                }
                Err(conn) => conn.close(),
            }
        }
        Err(err) => {
            warn!(address, error = %err, "[{}] failed to create connection", protocol);
            shared.borrow().emit(SocketEvent::ConnectFailed {
                address: address.to_string(),
                reason: err.to_string(),
            });
            schedule_retry(shared, address, generation);
        }
    }
}

/// Park `address` and re-establish it after the reconnect delay, unless it
/// is disconnected (or replaced) in the meantime.
fn schedule_retry(shared: &Rc<RefCell<Shared>>, address: &str, generation: Generation) {
    let retry = {
        let mut shared = shared.borrow_mut();
        let retry = shared.registry.schedule_retry(address, generation);
        if let Some(retry) = retry {
            lifecycle!(
                shared.options.debug,
                address,
                delay = ?retry.delay,
                attempt = retry.attempt,
                "[{}] reconnect scheduled",
                shared.options.protocol
            );
            shared.emit(SocketEvent::Reconnecting {
                address: address.to_string(),
                delay: retry.delay,
                attempt: retry.attempt,
            });
        }
        retry
    };

    let Some(retry) = retry else {
        return;
    };

    let weak = Rc::downgrade(shared);
    let address = address.to_string();
    compio::runtime::spawn(async move {
        timer::sleep(retry.delay).await;

        let Some(shared) = weak.upgrade() else {
            return;
        };
        let wanted = shared.borrow().registry.awaiting_retry(&address, retry.generation);
        if wanted {
            establish(&shared, &address, retry.generation);
        } else {
            trace!(address = %address, "retry dropped, address no longer wanted");
        }
    })
    .detach();
}

/// Drive one connection's events until it closes.
async fn pump(
    weak: Weak<RefCell<Shared>>,
    address: String,
    generation: Generation,
    events: TransportEvents,
) {
    while let Ok(event) = events.recv_async().await {
        let Some(shared) = weak.upgrade() else {
            return;
        };

        match event {
            TransportEvent::Open => on_open(&shared, &address, generation),
            TransportEvent::Message(frame) => on_message(&shared, frame),
            TransportEvent::Error(err) => on_error(&shared, &address, err),
            TransportEvent::Close => {
                on_close(&shared, &address, generation);
                return;
            }
        }
    }

    // Event channel gone without a Close: the transport is dead all the same.
    if let Some(shared) = weak.upgrade() {
        on_close(&shared, &address, generation);
    }
}

fn on_open(shared: &Rc<RefCell<Shared>>, address: &str, generation: Generation) {
    let mut shared = shared.borrow_mut();
    if shared.registry.mark_open(address, generation) {
        lifecycle!(shared.options.debug, address, "[{}] connected", shared.options.protocol);
        shared.emit(SocketEvent::Connected(address.to_string()));
    } else {
        trace!(address, generation = generation.get(), "open from stale connection");
    }
}

fn on_message(shared: &Rc<RefCell<Shared>>, frame: Payload) {
    let (payload, listeners) = {
        let mut guard = shared.borrow_mut();
        let shared = &mut *guard;
        lifecycle!(shared.options.debug, frame = ?frame, "[{}] received", shared.options.protocol);

        let resolves = match shared.options.reply_matching {
            ReplyMatching::Any => true,
            ReplyMatching::Header => shared.codec.header_matches(&frame),
        };
        let payload = shared.codec.decode(frame);

        if resolves {
            shared.correlator.resolve(&payload);
        } else {
            lifecycle!(shared.options.debug, "[{}] reply header mismatch", shared.options.protocol);
        }

        (payload, shared.dispatcher.snapshot(EventKind::Data))
    };

    notify(&listeners, &Notification::Data(&payload));
}

fn on_error(shared: &Rc<RefCell<Shared>>, address: &str, err: TransportError) {
    let listeners = {
        let shared = shared.borrow();
        lifecycle!(shared.options.debug, address, error = %err, "[{}] transport error", shared.options.protocol);
        shared.dispatcher.snapshot(EventKind::Error)
    };

    notify(&listeners, &Notification::Error(&err));
}

fn on_close(shared: &Rc<RefCell<Shared>>, address: &str, generation: Generation) {
    let (current, listeners) = {
        let shared = shared.borrow();
        lifecycle!(shared.options.debug, address, "[{}] close", shared.options.protocol);
        let current = shared.registry.is_current(address, generation);
        if current {
            shared.emit(SocketEvent::Disconnected(address.to_string()));
        }
        (current, shared.dispatcher.snapshot(EventKind::End))
    };

    if current {
        schedule_retry(shared, address, generation);
    }

    notify(&listeners, &Notification::End(address));
}
